//! Page source — the boundary to the asynchronous data backend
//!
//! A source yields one page per call and never retries internally; retry
//! policy belongs to the consumer through `retry()`. Cancellation is
//! advisory: a source should check the token between suspension points,
//! but completing after cancellation is tolerated — the scheduler discards
//! the result either way.

mod fixture;

pub use fixture::FixtureSource;

use crate::feed::{FetchError, Page, PageToken, QueryIdentity};
use crate::scheduler::CancellationToken;
use async_trait::async_trait;

/// The contract page sources implement.
#[async_trait]
pub trait PageSource<I: QueryIdentity>: Send + Sync {
    /// Fetch one page of `identity`'s dataset.
    ///
    /// Must return a terminal page (`continuation == None`) once the
    /// dataset is exhausted.
    async fn fetch_page(
        &self,
        identity: &I,
        page: PageToken,
        token: &CancellationToken,
    ) -> Result<Page, FetchError>;
}
