//! Page and item types — the unit of data the engine accumulates

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque continuation marker: how to fetch the next page.
///
/// Internally a zero-based page index. Consumers treat it as opaque;
/// only a `Page` returned by the source can produce the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageToken(u64);

impl PageToken {
    /// The first page of any dataset.
    pub const FIRST: PageToken = PageToken(0);

    pub fn new(index: u64) -> Self {
        Self(index)
    }

    /// Zero-based index of the page this token addresses.
    pub fn index(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page {}", self.0)
    }
}

/// A single loaded entry.
///
/// `id` is unique within its page, not across the whole dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub payload: String,
}

impl Item {
    pub fn new(id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
        }
    }
}

/// One page of results from a source.
///
/// `continuation == None` means the dataset is exhausted (terminal page).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub items: Vec<Item>,
    pub continuation: Option<PageToken>,
}

impl Page {
    pub fn new(items: Vec<Item>, continuation: Option<PageToken>) -> Self {
        Self {
            items,
            continuation,
        }
    }

    /// A page with no further continuation.
    pub fn terminal(items: Vec<Item>) -> Self {
        Self {
            items,
            continuation: None,
        }
    }

    /// True if no further pages exist after this one.
    pub fn is_terminal(&self) -> bool {
        self.continuation.is_none()
    }
}
