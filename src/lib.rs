//! Pagefeed: cancellation-safe incremental loading engine
//!
//! Loads paginated data incrementally, resets when the query identity
//! changes, and supports cancellation and retry without ever corrupting
//! accumulated state.
//!
//! # Core Concepts
//!
//! - **Identity**: the parameter tuple naming the dataset being browsed
//! - **Load state machine**: explicit phases for initial load, load-more,
//!   and their error states; append-only page accumulation
//! - **Fetch scheduler**: at most one live fetch per identity; results of
//!   superseded fetches are discarded by token liveness, never by comparing
//!   parameter snapshots
//!
//! # Example
//!
//! ```no_run
//! use pagefeed::{FixtureSource, Loader, Query};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn demo() -> Result<(), pagefeed::LoaderError> {
//! let source = Arc::new(FixtureSource::new(Duration::from_millis(50)));
//! let loader = Loader::spawn(source);
//! loader.observe(Query::new("bill", "browser")).await?;
//! let state = loader.wait_for(|s| s.can_request_more()).await?;
//! loader.request_more().await?;
//! # let _ = state;
//! # Ok(())
//! # }
//! ```

mod feed;
mod loader;
pub mod scheduler;
pub mod source;

pub use feed::{
    FetchError, Item, LoadAction, LoadPhase, LoadState, Page, PageToken, ProtocolViolation,
    Query, QueryIdentity,
};
pub use loader::{Loader, LoaderError};
pub use scheduler::{CancellationToken, FetchPlan, FetchScheduler, Settlement};
pub use source::{FixtureSource, PageSource};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
