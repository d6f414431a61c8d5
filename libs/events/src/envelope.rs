//! Change-feed envelope and channel status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Shift;

/// Table a change was committed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Members,
    ScheduledHolds,
    ActivityLog,
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Table::Members => "members",
            Table::ScheduledHolds => "scheduled_holds",
            Table::ActivityLog => "activity_log",
        };
        f.write_str(s)
    }
}

/// Kind of row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Broadcast for every committed write.
///
/// Receivers treat it as an invalidation and re-read the shift; the row
/// details are informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEnvelope {
    pub table: Table,
    pub kind: ChangeKind,

    /// Shift the change belongs to. `None` for system-wide writes, which
    /// every shift channel receives.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shift: Option<Shift>,

    /// Affected rows, if known.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub record_ids: Vec<String>,

    pub occurred_at: DateTime<Utc>,
}

impl ChangeEnvelope {
    pub fn new(table: Table, kind: ChangeKind, shift: Option<Shift>) -> Self {
        Self {
            table,
            kind,
            shift,
            record_ids: Vec::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_records<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.record_ids = ids.into_iter().map(|id| id.to_string()).collect();
        self
    }

    /// Whether a channel scoped to `shift` should see this change.
    pub fn concerns(&self, shift: Shift) -> bool {
        self.shift.is_none_or(|s| s == shift)
    }
}

/// Channel status as reported by the broadcast transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    Subscribed,
    Error,
    TimedOut,
    Closed,
}

impl ChannelStatus {
    /// Error and timeout. `Closed` is ambiguous on its own: only the
    /// subscriber knows whether it asked for it.
    pub fn is_failure(&self) -> bool {
        matches!(self, ChannelStatus::Error | ChannelStatus::TimedOut)
    }
}

impl std::fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChannelStatus::Subscribed => "SUBSCRIBED",
            ChannelStatus::Error => "CHANNEL_ERROR",
            ChannelStatus::TimedOut => "TIMED_OUT",
            ChannelStatus::Closed => "CLOSED",
        };
        f.write_str(s)
    }
}
