//! Live updates from the shared store.

mod backoff;
mod sync;

pub use backoff::{
    FailureOutcome, ReconnectPolicy, ReconnectState, RetryDecision, SyncNotice, SyncPhase,
};
pub use sync::{RealtimeSync, ReloadTarget, SyncHandle};
