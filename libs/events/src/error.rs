//! Error types for record parsing.

use thiserror::Error;

/// Errors that can occur when parsing roster records or labels.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    /// The shift label is not one of A, B, C.
    #[error("unknown shift: {0}")]
    UnknownShift(String),

    /// The activity kind label is unknown.
    #[error("unknown activity kind: {0}")]
    UnknownActivityKind(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EventError {
    fn from(err: serde_json::Error) -> Self {
        EventError::Serialization(err.to_string())
    }
}
