//! Common test utilities for loader integration tests
//!
//! `HarnessSource` is a page source the test controls by hand: every
//! `fetch_page` call surfaces as a `FetchRequest` on a channel, and the
//! fetch stays pending until the test responds. That makes interleavings
//! of identity changes and settlements fully deterministic.

use async_trait::async_trait;
use pagefeed::scheduler::CancellationToken;
use pagefeed::{FetchError, Item, Page, PageSource, PageToken, Query};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// One pending fetch, waiting for the test to respond.
pub struct FetchRequest {
    pub identity: Query,
    pub page: PageToken,
    pub token: CancellationToken,
    respond: oneshot::Sender<Result<Page, FetchError>>,
}

impl FetchRequest {
    /// Settle this fetch with the given outcome.
    pub fn respond(self, outcome: Result<Page, FetchError>) {
        let _ = self.respond.send(outcome);
    }
}

/// A page source driven entirely by the test.
pub struct HarnessSource {
    requests: mpsc::UnboundedSender<FetchRequest>,
}

#[async_trait]
impl PageSource<Query> for HarnessSource {
    async fn fetch_page(
        &self,
        identity: &Query,
        page: PageToken,
        token: &CancellationToken,
    ) -> Result<Page, FetchError> {
        let (respond, outcome) = oneshot::channel();
        self.requests
            .send(FetchRequest {
                identity: identity.clone(),
                page,
                token: token.clone(),
                respond,
            })
            .map_err(|_| FetchError::Unavailable("harness dropped".into()))?;
        // A dropped request counts as an abandoned fetch.
        outcome.await.unwrap_or(Err(FetchError::Cancelled))
    }
}

/// Build a harness source plus the request stream the test drains.
pub fn harness() -> (Arc<HarnessSource>, mpsc::UnboundedReceiver<FetchRequest>) {
    let (requests, rx) = mpsc::unbounded_channel();
    (Arc::new(HarnessSource { requests }), rx)
}

/// Receive the next fetch request, panicking if none arrives in time.
pub async fn next_request(rx: &mut mpsc::UnboundedReceiver<FetchRequest>) -> FetchRequest {
    tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a fetch request")
        .expect("harness request channel closed")
}

/// A page of sequentially numbered items.
pub fn page(ids: std::ops::Range<u32>, continuation: Option<u64>) -> Page {
    Page::new(
        ids.map(|i| Item::new(i.to_string(), format!("item {i}")))
            .collect(),
        continuation.map(PageToken::new),
    )
}

/// The item ids of a state's accumulated items.
pub fn item_ids(state: &pagefeed::LoadState) -> Vec<String> {
    state
        .items
        .as_ref()
        .map(|items| items.iter().map(|i| i.id.clone()).collect())
        .unwrap_or_default()
}
