//! Fetch scheduler — turns identity and phase changes into at most one
//! live fetch, and filters settlements through token liveness
//!
//! The scheduler is deliberately synchronous: it decides *what* to fetch
//! and *whether* a settlement counts, and hands back a `FetchPlan` for the
//! caller to execute. Races between a superseding identity change and an
//! in-flight request are resolved entirely by token liveness, never by
//! comparing captured parameter snapshots.

use crate::feed::{
    FetchError, LoadAction, LoadState, Page, PageToken, ProtocolViolation, QueryIdentity,
};

use super::cancel::CancellationToken;
use tracing::debug;

/// Everything the executor needs to run one fetch attempt.
#[derive(Debug, Clone)]
pub struct FetchPlan<I> {
    pub identity: I,
    pub page: PageToken,
    pub token: CancellationToken,
}

/// What `settle` did with a fetch outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// The token was live; the outcome reached the state machine.
    Applied,
    /// The token was superseded or detached; the outcome went nowhere.
    Discarded,
}

/// Owns one identity's `LoadState` and its single live token.
///
/// Exactly one token is live at any instant; starting a new fetch always
/// cancels the previous one first, so out-of-order page arrivals are
/// impossible by construction.
pub struct FetchScheduler<I: QueryIdentity> {
    identity: Option<I>,
    state: LoadState,
    live: Option<CancellationToken>,
}

impl<I: QueryIdentity> FetchScheduler<I> {
    pub fn new() -> Self {
        Self {
            identity: None,
            state: LoadState::new(),
            live: None,
        }
    }

    /// The current state snapshot.
    pub fn state(&self) -> &LoadState {
        &self.state
    }

    /// The identity currently observed, if any.
    pub fn identity(&self) -> Option<&I> {
        self.identity.as_ref()
    }

    /// Point the scheduler at an identity.
    ///
    /// Equal identity: no-op (re-observation is free, so consumers may call
    /// this every render). New identity: the previous state is discarded
    /// wholesale, the live fetch is cancelled, and the returned plan fetches
    /// page zero of the new dataset.
    pub fn observe(&mut self, identity: I) -> Option<FetchPlan<I>> {
        if self.identity.as_ref() == Some(&identity) {
            return None;
        }
        debug!(?identity, "identity changed, restarting");
        self.cancel_live();
        self.identity = Some(identity.clone());
        self.state = LoadState::new();
        Some(self.plan(identity, PageToken::FIRST))
    }

    /// Ask for the next page. Valid only in `Ready`/`UpdateError` with a
    /// continuation; anything else is a caller bug and fails loudly.
    pub fn request_more(&mut self) -> Result<FetchPlan<I>, ProtocolViolation> {
        let identity = self
            .identity
            .clone()
            .ok_or(ProtocolViolation::NotObserved)?;
        let page = self
            .state
            .continuation
            .ok_or(ProtocolViolation::NoContinuation)?;
        self.state.apply(LoadAction::RequestMore)?;
        self.cancel_live();
        Ok(self.plan(identity, page))
    }

    /// Retry after a failure.
    ///
    /// `InitialError` restarts from page zero; `UpdateError` re-issues the
    /// page that failed. Valid in no other phase.
    pub fn retry(&mut self) -> Result<FetchPlan<I>, ProtocolViolation> {
        let identity = self
            .identity
            .clone()
            .ok_or(ProtocolViolation::NotObserved)?;
        if self.state.can_request_more() && self.state.can_retry() {
            // UpdateError: retry is the same request_more re-dispatch.
            return self.request_more();
        }
        self.state.apply(LoadAction::StartInitial)?;
        self.cancel_live();
        Ok(self.plan(identity, PageToken::FIRST))
    }

    /// Feed a fetch outcome back in.
    ///
    /// The token gates everything: a non-live token's result is discarded
    /// unconditionally, success or failure alike. A live token's result is
    /// dispatched and the token is consumed, so no second effect is possible.
    pub fn settle(
        &mut self,
        token: &CancellationToken,
        outcome: Result<Page, FetchError>,
    ) -> Result<Settlement, ProtocolViolation> {
        if !token.try_consume() {
            debug!("discarding settlement for superseded fetch");
            return Ok(Settlement::Discarded);
        }
        debug_assert!(
            self.live.as_ref().is_some_and(|t| t.same_fetch(token)),
            "consumed a token the scheduler does not consider live"
        );
        self.live = None;
        match outcome {
            Ok(page) => self.state.apply(LoadAction::PageArrived(page))?,
            Err(err) => self.state.apply(LoadAction::FetchFailed(err))?,
        }
        Ok(Settlement::Applied)
    }

    /// The consumer stopped observing. Cancels the live fetch; after this,
    /// no settlement can reach the state.
    pub fn detach(&mut self) {
        debug!("detaching, cancelling live fetch");
        self.cancel_live();
    }

    fn cancel_live(&mut self) {
        if let Some(token) = self.live.take() {
            token.cancel();
        }
    }

    fn plan(&mut self, identity: I, page: PageToken) -> FetchPlan<I> {
        let token = CancellationToken::new();
        self.live = Some(token.clone());
        FetchPlan {
            identity,
            page,
            token,
        }
    }
}

impl<I: QueryIdentity> Default for FetchScheduler<I> {
    fn default() -> Self {
        Self::new()
    }
}
