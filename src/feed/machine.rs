//! The load state machine
//!
//! Owns the current phase, the accumulated items, the continuation marker,
//! and the last error. This is the only place load progress mutates, and it
//! mutates only through `LoadState::apply`. Any action not in the transition
//! table is a `ProtocolViolation` — the scheduler broke its own contract,
//! and the failure is loud rather than silently ignored.

use super::item::{Item, Page, PageToken};
use serde::Serialize;
use thiserror::Error;

/// Why a fetch failed, as recoverable state (never thrown past the scheduler).
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum FetchError {
    #[error("page source unavailable: {0}")]
    Unavailable(String),

    #[error("malformed page response: {0}")]
    Malformed(String),

    #[error("fetch cancelled")]
    Cancelled,
}

/// An action applied in a phase that does not permit it.
///
/// Always a caller or scheduler bug, never a normal runtime condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    #[error("{action} is not valid in phase {phase:?}")]
    InvalidAction {
        action: &'static str,
        phase: LoadPhase,
    },

    #[error("no continuation: dataset is exhausted")]
    NoContinuation,

    #[error("no identity observed yet")]
    NotObserved,
}

/// The discrete state of the machine. Exactly one phase is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadPhase {
    /// First page of the current identity is in flight; nothing to show.
    InitialLoading,
    /// At least one page applied; may or may not have a continuation.
    Ready,
    /// A further page is in flight; existing items remain visible.
    LoadingMore,
    /// The first page failed; nothing to show, retry available.
    InitialError,
    /// A further page failed; existing items retained, retry available.
    UpdateError,
}

/// Inputs to the machine. Dispatched only by the fetch scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadAction {
    StartInitial,
    RequestMore,
    PageArrived(Page),
    FetchFailed(FetchError),
}

impl LoadAction {
    fn name(&self) -> &'static str {
        match self {
            Self::StartInitial => "StartInitial",
            Self::RequestMore => "RequestMore",
            Self::PageArrived(_) => "PageArrived",
            Self::FetchFailed(_) => "FetchFailed",
        }
    }
}

/// Load progress for one identity.
///
/// Invariants:
/// - `items == None` iff phase is `InitialLoading` or `InitialError`
/// - `continuation == None` while `items == None`, or after a terminal page
/// - `error != None` only in `InitialError` / `UpdateError`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadState {
    pub phase: LoadPhase,
    pub items: Option<Vec<Item>>,
    pub continuation: Option<PageToken>,
    pub error: Option<FetchError>,
}

impl LoadState {
    /// The state immediately after `StartInitial`: nothing fetched yet.
    pub fn new() -> Self {
        Self {
            phase: LoadPhase::InitialLoading,
            items: None,
            continuation: None,
            error: None,
        }
    }

    /// Apply one action, following the transition table exactly.
    ///
    /// Pages are applied atomically: either the whole page lands (appended
    /// in arrival order) or the state is untouched. Stale-result filtering
    /// is the scheduler's job; by the time an action reaches here it is
    /// authoritative.
    pub fn apply(&mut self, action: LoadAction) -> Result<(), ProtocolViolation> {
        match (self.phase, action) {
            // Retry of a failed first page. The init-time StartInitial is
            // `LoadState::new()` itself; identity changes replace the state
            // wholesale instead of dispatching here.
            (LoadPhase::InitialError, LoadAction::StartInitial) => {
                *self = Self::new();
                Ok(())
            }
            (LoadPhase::InitialLoading, LoadAction::PageArrived(page)) => {
                self.phase = LoadPhase::Ready;
                self.items = Some(page.items);
                self.continuation = page.continuation;
                Ok(())
            }
            (LoadPhase::InitialLoading, LoadAction::FetchFailed(err)) => {
                self.phase = LoadPhase::InitialError;
                self.error = Some(err);
                Ok(())
            }
            (LoadPhase::Ready, LoadAction::RequestMore) => {
                if self.continuation.is_none() {
                    return Err(ProtocolViolation::NoContinuation);
                }
                self.phase = LoadPhase::LoadingMore;
                Ok(())
            }
            (LoadPhase::LoadingMore, LoadAction::PageArrived(page)) => {
                self.phase = LoadPhase::Ready;
                match self.items {
                    Some(ref mut items) => items.extend(page.items),
                    // LoadingMore is only reachable from Ready, which has items.
                    None => self.items = Some(page.items),
                }
                self.continuation = page.continuation;
                Ok(())
            }
            (LoadPhase::LoadingMore, LoadAction::FetchFailed(err)) => {
                self.phase = LoadPhase::UpdateError;
                self.error = Some(err);
                Ok(())
            }
            // Retry of a failed page re-issues the same continuation.
            (LoadPhase::UpdateError, LoadAction::RequestMore) => {
                self.phase = LoadPhase::LoadingMore;
                self.error = None;
                Ok(())
            }
            (phase, action) => Err(ProtocolViolation::InvalidAction {
                action: action.name(),
                phase,
            }),
        }
    }

    /// True when the consumer may ask for the next page.
    pub fn can_request_more(&self) -> bool {
        matches!(self.phase, LoadPhase::Ready | LoadPhase::UpdateError)
            && self.continuation.is_some()
    }

    /// True when the consumer may retry after a failure.
    pub fn can_retry(&self) -> bool {
        matches!(self.phase, LoadPhase::InitialError | LoadPhase::UpdateError)
    }

    /// Panic if the structural invariants do not hold. Test support.
    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        let bare = matches!(
            self.phase,
            LoadPhase::InitialLoading | LoadPhase::InitialError
        );
        assert_eq!(
            self.items.is_none(),
            bare,
            "items must be None exactly in InitialLoading/InitialError: {self:?}"
        );
        if self.items.is_none() {
            assert!(
                self.continuation.is_none(),
                "continuation without items: {self:?}"
            );
        }
        let errorful = matches!(self.phase, LoadPhase::InitialError | LoadPhase::UpdateError);
        assert_eq!(
            self.error.is_some(),
            errorful,
            "error must be Some exactly in the error phases: {self:?}"
        );
    }
}

impl Default for LoadState {
    fn default() -> Self {
        Self::new()
    }
}
