//! Fetch scheduling: one live token, one live fetch, no stale effects

mod cancel;
mod fetch;

pub use cancel::CancellationToken;
pub use fetch::{FetchPlan, FetchScheduler, Settlement};
