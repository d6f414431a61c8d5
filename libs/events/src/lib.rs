//! # rota-events
//!
//! Records and change notifications shared by the rota roster crates.
//!
//! ## Records
//!
//! - [`Member`]: a rotation participant, scoped to one [`Shift`]
//! - [`ScheduledHold`]: immutable history of a completed hold; carries the
//!   member's name so it outlives the member row
//! - [`ActivityLogEntry`]: append-only audit trail
//!
//! ## Change feed
//!
//! The remote store broadcasts a [`ChangeEnvelope`] per committed write on a
//! shift-keyed channel. Subscribers only use it as a "something changed"
//! signal and re-read the whole shift. Channel health is reported as a
//! [`ChannelStatus`].

mod envelope;
mod error;
mod types;

pub use envelope::*;
pub use error::EventError;
pub use types::*;
