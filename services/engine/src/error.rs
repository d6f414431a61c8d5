//! Engine error types.

use rota_events::Shift;
use thiserror::Error;

use crate::backend::BackendError;
use crate::store::RosterSnapshot;

/// A roster read failed.
#[derive(Debug, Error)]
pub enum RosterError {
    #[error("failed to load shift {shift}: {source}")]
    Load {
        shift: Shift,
        #[source]
        source: BackendError,
    },
}

/// A mutation's remote write failed and local state was put back.
///
/// `restored` is the snapshot taken when the mutation began; the store holds
/// exactly these rosters again.
#[derive(Debug, Error)]
#[error("{action} failed and was rolled back: {source}")]
pub struct RolledBack {
    pub action: &'static str,
    #[source]
    pub source: BackendError,
    pub restored: RosterSnapshot,
}

/// Result of a roster mutation.
pub type MutationResult<T> = Result<T, RolledBack>;
