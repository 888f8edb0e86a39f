//! Core data model and load state machine

mod identity;
mod item;
mod machine;


pub use identity::{Query, QueryIdentity};
pub use item::{Item, Page, PageToken};
pub use machine::{FetchError, LoadAction, LoadPhase, LoadState, ProtocolViolation};
