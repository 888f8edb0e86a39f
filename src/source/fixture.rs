//! In-memory fixture backend for demos and tests
//!
//! Serves a small fixed dataset with an artificial delay, decorating each
//! payload with the identity it was fetched for. Requests for the "error"
//! category fail except every third attempt, which gives retry flows
//! something real to chew on.

use super::PageSource;
use crate::feed::{FetchError, Item, Page, PageToken, Query};
use crate::scheduler::CancellationToken;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::debug;

/// Category whose requests are served by the failure injector.
pub const ERROR_CATEGORY: &str = "error";

/// One stored page, before payload decoration.
#[derive(Debug, Clone, Deserialize)]
struct FixturePage {
    items: Vec<Item>,
    continuation: Option<PageToken>,
}

/// A canned page source over `Query` identities.
pub struct FixtureSource {
    pages: Vec<FixturePage>,
    delay: Duration,
    error_requests: AtomicU32,
}

impl FixtureSource {
    /// The standard three-page dataset: items 0..9, terminal on page 2.
    pub fn new(delay: Duration) -> Self {
        let pages = (0..3u64)
            .map(|page| FixturePage {
                items: (page * 3..page * 3 + 3)
                    .map(|i| Item::new(i.to_string(), format!("item {i}")))
                    .collect(),
                continuation: if page < 2 {
                    Some(PageToken::new(page + 1))
                } else {
                    None
                },
            })
            .collect();
        Self {
            pages,
            delay,
            error_requests: AtomicU32::new(0),
        }
    }

    /// Load pages from a JSON array of `{ "items": [...], "continuation": n|null }`.
    pub fn from_json(json: &str, delay: Duration) -> Result<Self, serde_json::Error> {
        let pages: Vec<FixturePage> = serde_json::from_str(json)?;
        Ok(Self {
            pages,
            delay,
            error_requests: AtomicU32::new(0),
        })
    }

    /// The undecorated dataset, for dumping.
    pub fn pages(&self) -> Vec<Page> {
        self.pages
            .iter()
            .map(|p| Page::new(p.items.clone(), p.continuation))
            .collect()
    }

    fn decorated(&self, identity: &Query, page: PageToken) -> Result<Page, FetchError> {
        let stored = self
            .pages
            .get(page.index() as usize)
            .ok_or_else(|| FetchError::Malformed(format!("no such page: {page}")))?;
        let items = stored
            .items
            .iter()
            .map(|item| {
                Item::new(
                    item.id.clone(),
                    format!("{} {} {}", identity.subject, identity.category, item.payload),
                )
            })
            .collect();
        Ok(Page::new(items, stored.continuation))
    }
}

#[async_trait]
impl PageSource<Query> for FixtureSource {
    async fn fetch_page(
        &self,
        identity: &Query,
        page: PageToken,
        token: &CancellationToken,
    ) -> Result<Page, FetchError> {
        tokio::time::sleep(self.delay).await;
        if token.is_cancelled() {
            debug!(%identity, %page, "fetch aborted before producing a page");
            return Err(FetchError::Cancelled);
        }

        if identity.category == ERROR_CATEGORY {
            // Every third attempt succeeds, the rest fail.
            let count = self.error_requests.fetch_add(1, Ordering::Relaxed) + 1;
            if count % 3 != 0 {
                debug!(%identity, %page, count, "injected failure");
                return Err(FetchError::Unavailable(format!(
                    "request failed (attempt {count})"
                )));
            }
        }

        self.decorated(identity, page)
    }
}
