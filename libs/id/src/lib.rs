//! # rota-id
//!
//! Stable ID types for the rota duty roster.
//!
//! Every record the roster engine touches (members, completed holds, activity
//! log rows) is addressed by a typed ID of the form `{prefix}_{ulid}`:
//!
//! - `mbr_01HV4Z2WQXKJNM8GPQY6VBKC3D` (member)
//! - `hold_01HV4Z3MXNKPQR9HSTZ7WCLD4E` (scheduled hold)
//! - `act_01HV4Z4NYPLTRS0JTUA8XDME5F` (activity log entry)
//!
//! IDs are typed so a hold ID can never be passed where a member ID is
//! expected, and ULIDs keep them time-sortable. Optimistic placeholders are
//! ordinary IDs minted locally; the remote store replaces them on insert.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;
