//! Async loader — runs a `FetchScheduler` on its own task
//!
//! One task owns the scheduler and its `LoadState`. Consumer commands
//! arrive on a command channel, fetch settlements on a settlement channel,
//! and both are handled in one loop, so reducer transitions are applied in
//! dispatch order and never concurrently. Fetches themselves run on spawned
//! tasks; they report back through the settlement channel carrying the
//! token they were planned with, and token liveness decides whether the
//! report counts.

use crate::feed::{FetchError, LoadState, Page, ProtocolViolation, QueryIdentity};
use crate::scheduler::{CancellationToken, FetchPlan, FetchScheduler};
use crate::source::PageSource;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error};

const COMMAND_BUFFER: usize = 16;

/// Errors surfaced to the loader's consumer.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// The command is not valid in the current phase. Consult
    /// `LoadState::can_request_more` / `can_retry` before issuing it.
    #[error(transparent)]
    Protocol(#[from] ProtocolViolation),

    /// The loader task is gone; no further commands can be served.
    #[error("loader is detached")]
    Detached,
}

enum Command<I> {
    Observe(I),
    RequestMore(oneshot::Sender<Result<(), ProtocolViolation>>),
    Retry(oneshot::Sender<Result<(), ProtocolViolation>>),
    Detach,
}

struct Settled {
    token: CancellationToken,
    outcome: Result<Page, FetchError>,
}

/// Handle to a loader task. Cloneable; dropping the last handle detaches.
#[derive(Clone)]
pub struct Loader<I: QueryIdentity> {
    commands: mpsc::Sender<Command<I>>,
    states: watch::Receiver<LoadState>,
}

impl<I: QueryIdentity> Loader<I> {
    /// Spawn a loader over `source`. No fetch starts until the first
    /// `observe` call.
    pub fn spawn(source: Arc<dyn PageSource<I>>) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (state_tx, state_rx) = watch::channel(LoadState::new());
        tokio::spawn(run(command_rx, state_tx, source));
        Self {
            commands: command_tx,
            states: state_rx,
        }
    }

    /// Point the loader at an identity. Equal identity is a no-op; a new
    /// identity discards the previous state and starts a page-zero fetch.
    pub async fn observe(&self, identity: I) -> Result<(), LoaderError> {
        self.commands
            .send(Command::Observe(identity))
            .await
            .map_err(|_| LoaderError::Detached)
    }

    /// Ask for the next page.
    pub async fn request_more(&self) -> Result<(), LoaderError> {
        self.command(Command::RequestMore).await
    }

    /// Retry after a failure.
    pub async fn retry(&self) -> Result<(), LoaderError> {
        self.command(Command::Retry).await
    }

    /// Stop observing. The live fetch is cancelled and the state is frozen.
    pub async fn detach(&self) {
        let _ = self.commands.send(Command::Detach).await;
    }

    /// The latest state snapshot.
    pub fn state(&self) -> LoadState {
        self.states.borrow().clone()
    }

    /// A watch receiver for state snapshots.
    pub fn subscribe(&self) -> watch::Receiver<LoadState> {
        self.states.clone()
    }

    /// Wait until the state satisfies `pred` and return that snapshot.
    pub async fn wait_for(
        &self,
        mut pred: impl FnMut(&LoadState) -> bool,
    ) -> Result<LoadState, LoaderError> {
        let mut states = self.states.clone();
        loop {
            let snapshot = states.borrow_and_update().clone();
            if pred(&snapshot) {
                return Ok(snapshot);
            }
            states.changed().await.map_err(|_| LoaderError::Detached)?;
        }
    }

    async fn command(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<(), ProtocolViolation>>) -> Command<I>,
    ) -> Result<(), LoaderError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(make(reply_tx))
            .await
            .map_err(|_| LoaderError::Detached)?;
        reply_rx.await.map_err(|_| LoaderError::Detached)??;
        Ok(())
    }
}

async fn run<I: QueryIdentity>(
    mut commands: mpsc::Receiver<Command<I>>,
    states: watch::Sender<LoadState>,
    source: Arc<dyn PageSource<I>>,
) {
    let mut scheduler = FetchScheduler::new();
    let (settle_tx, mut settlements) = mpsc::channel::<Settled>(COMMAND_BUFFER);

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else { break };
                match command {
                    Command::Observe(identity) => {
                        if let Some(plan) = scheduler.observe(identity) {
                            spawn_fetch(plan, source.clone(), settle_tx.clone());
                        }
                    }
                    Command::RequestMore(reply) => {
                        let result = scheduler
                            .request_more()
                            .map(|plan| spawn_fetch(plan, source.clone(), settle_tx.clone()));
                        let _ = reply.send(result);
                    }
                    Command::Retry(reply) => {
                        let result = scheduler
                            .retry()
                            .map(|plan| spawn_fetch(plan, source.clone(), settle_tx.clone()));
                        let _ = reply.send(result);
                    }
                    Command::Detach => break,
                }
            }
            Some(settled) = settlements.recv() => {
                match scheduler.settle(&settled.token, settled.outcome) {
                    Ok(_) => {}
                    Err(violation) => {
                        // A settlement the table cannot accept means the
                        // scheduler broke its own contract. Stop loudly.
                        error!(%violation, "scheduler contract violated, stopping loader");
                        break;
                    }
                }
            }
        }
        // Discarded settlements and rejected commands leave the state as it
        // was; don't wake subscribers for those.
        states.send_if_modified(|current| {
            if current == scheduler.state() {
                return false;
            }
            *current = scheduler.state().clone();
            true
        });
    }

    scheduler.detach();
}

fn spawn_fetch<I: QueryIdentity>(
    plan: FetchPlan<I>,
    source: Arc<dyn PageSource<I>>,
    settle_tx: mpsc::Sender<Settled>,
) {
    tokio::spawn(async move {
        debug!(identity = ?plan.identity, page = %plan.page, "fetch started");
        let outcome = source.fetch_page(&plan.identity, plan.page, &plan.token).await;
        debug!(
            identity = ?plan.identity,
            page = %plan.page,
            ok = outcome.is_ok(),
            "fetch settled"
        );
        // The loop may already be gone; its scheduler cancelled our token.
        let _ = settle_tx
            .send(Settled {
                token: plan.token,
                outcome,
            })
            .await;
    });
}
