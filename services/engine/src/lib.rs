//! Rota engine
//!
//! Keeps a shared hold-rotation roster consistent across concurrent viewers.
//!
//! ## Architecture
//!
//! ```text
//! user action ──▶ MutationCoordinator ──▶ RosterStore (optimistic)
//!                        │                     ▲
//!                        ▼                     │ reload
//!                  RosterBackend          RealtimeSync ◀── ChangeFeed
//! ```
//!
//! Reads flow from the remote store into [`RosterStore`]. Writes are applied
//! locally first and rolled back verbatim if the remote write fails.
//! [`RealtimeSync`] forces a reload whenever any client changes the shift.
//!
//! ## Modules
//!
//! - `backend`: remote store and change-feed contracts
//! - `memory`: in-memory backend for tests and development
//! - `store`: per-shift roster state with snapshot/restore
//! - `coordinator`: optimistic mutations with rollback
//! - `realtime`: live sync and reconnect backoff
//! - `notify`: user notifications with duplicate suppression
//! - `activity`: background audit log writes

pub mod activity;
pub mod backend;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod memory;
pub mod notify;
pub mod realtime;
pub mod store;

pub use backend::{BackendError, ChangeFeed, FeedSignal, RosterBackend, Subscription};
pub use coordinator::{
    AddMember, CompleteHold, Confirmed, HoldCompletion, MemberDetails, MutationCoordinator,
    ResetConfirmation,
};
pub use error::{MutationResult, RolledBack, RosterError};
pub use memory::InMemoryBackend;
pub use notify::{DedupNotifier, NoticeKind, Notifier, TracingNotifier};
pub use realtime::{RealtimeSync, ReconnectPolicy, SyncHandle, SyncPhase};
pub use store::{RosterSnapshot, RosterStore, ShiftRoster};
