//! Cooperative cancellation tokens, one per fetch attempt
//!
//! The scheduler cancels the token when the fetch is superseded or the
//! consumer detaches; the page source checks it between suspension points.
//! A token moves through at most one transition: live → cancelled, or
//! live → consumed (its settlement was applied). Neither reverts.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const LIVE: u8 = 0;
const CANCELLED: u8 = 1;
const CONSUMED: u8 = 2;

/// Handle to one fetch attempt's lifecycle.
///
/// Clones share state. Only the scheduler transitions a token; the page
/// source just observes `is_cancelled`.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    state: Arc<AtomicU8>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(LIVE)),
        }
    }

    /// True while this fetch's result may still be applied.
    pub fn is_live(&self) -> bool {
        self.state.load(Ordering::Acquire) == LIVE
    }

    /// True once the scheduler has requested abandonment.
    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    /// Request abandonment. Idempotent; a consumed token stays consumed.
    pub fn cancel(&self) {
        let _ = self
            .state
            .compare_exchange(LIVE, CANCELLED, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Claim the token's single allowed effect.
    ///
    /// Succeeds at most once, and never after `cancel`. The settlement path
    /// gates every dispatch on this, which is what makes stale results
    /// undeliverable and duplicate delivery impossible.
    pub fn try_consume(&self) -> bool {
        self.state
            .compare_exchange(LIVE, CONSUMED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// True if this handle and `other` refer to the same fetch attempt.
    pub fn same_fetch(&self, other: &CancellationToken) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
