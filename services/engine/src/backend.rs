//! Remote store contract.
//!
//! The roster's durable state lives in a remote table service. The engine only
//! needs row-level reads and writes on three tables plus a shift-keyed
//! broadcast channel:
//!
//! - [`RosterBackend`]: select / insert / update / delete / delete-by-filter
//! - [`ChangeFeed`]: subscribe to a shift's change notifications and channel
//!   status
//!
//! [`crate::memory::InMemoryBackend`] implements both for tests and the
//! development binary.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rota_events::{
    ActivityKind, ActivityLogEntry, ChangeEnvelope, ChannelStatus, HoldStatus, Member,
    MemberAttributes, ScheduledHold, Shift, Table,
};
use rota_id::MemberId;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors reported by the remote store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The store could not be reached or did not answer.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The addressed row does not exist.
    #[error("{table} row not found: {id}")]
    NotFound { table: Table, id: String },

    /// The store refused the write.
    #[error("write rejected: {0}")]
    Rejected(String),
}

impl BackendError {
    pub fn member_not_found(id: MemberId) -> Self {
        BackendError::NotFound {
            table: Table::Members,
            id: id.to_string(),
        }
    }
}

// =============================================================================
// Rows
// =============================================================================

/// Insert payload for a member. The store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewMember {
    pub name: String,
    pub shift: Shift,
    #[serde(default)]
    pub position: u32,
    #[serde(default = "default_available")]
    pub is_available: bool,
    #[serde(default)]
    pub last_hold_date: Option<NaiveDate>,
    #[serde(flatten)]
    pub attributes: MemberAttributes,
}

fn default_available() -> bool {
    true
}

/// Partial member update. `None` leaves a column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberPatch {
    pub name: Option<String>,
    pub shift: Option<Shift>,
    pub is_active: Option<bool>,
    pub is_available: Option<bool>,
    pub position: Option<u32>,
    /// `Some(None)` clears the column.
    pub last_hold_date: Option<Option<NaiveDate>>,
    pub attributes: Option<MemberAttributes>,
}

impl MemberPatch {
    pub fn position(position: u32) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the patch to a row.
    pub fn apply_to(&self, member: &mut Member) {
        if let Some(name) = &self.name {
            member.name = name.clone();
        }
        if let Some(shift) = self.shift {
            member.shift = shift;
        }
        if let Some(active) = self.is_active {
            member.is_active = active;
        }
        if let Some(available) = self.is_available {
            member.is_available = available;
        }
        if let Some(position) = self.position {
            member.position = position;
        }
        if let Some(date) = self.last_hold_date {
            member.last_hold_date = date;
        }
        if let Some(attributes) = &self.attributes {
            member.attributes = attributes.clone();
        }
    }
}

/// Insert payload for a hold record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHold {
    pub member_id: Option<MemberId>,
    pub member_name: String,
    pub shift: Shift,
    pub hold_date: NaiveDate,
    pub station: Option<String>,
    pub status: HoldStatus,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Insert payload for an audit entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActivity {
    pub member_name: String,
    pub action: ActivityKind,
    pub details: String,
    pub shift: Option<Shift>,
}

/// Row filter for bulk deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFilter {
    Shift(Shift),
    All,
}

impl RowFilter {
    pub fn matches(&self, shift: Option<Shift>) -> bool {
        match self {
            RowFilter::All => true,
            RowFilter::Shift(s) => shift == Some(*s),
        }
    }
}

// =============================================================================
// Traits
// =============================================================================

/// Row-level access to the remote roster tables.
#[async_trait]
pub trait RosterBackend: Send + Sync {
    /// All members of a shift (active or not), ordered by position.
    async fn select_members(&self, shift: Shift) -> Result<Vec<Member>, BackendError>;

    /// Insert a member; returns the stored row with its server-assigned id.
    async fn insert_member(&self, row: NewMember) -> Result<Member, BackendError>;

    async fn update_member(&self, id: MemberId, patch: MemberPatch) -> Result<(), BackendError>;

    /// Apply several member updates as one all-or-nothing write.
    async fn update_members(
        &self,
        updates: Vec<(MemberId, MemberPatch)>,
    ) -> Result<(), BackendError>;

    async fn delete_member(&self, id: MemberId) -> Result<(), BackendError>;

    /// Delete every row of `table` matching `filter`. Returns the row count.
    async fn delete_where(&self, table: Table, filter: RowFilter) -> Result<u64, BackendError>;

    async fn insert_hold(&self, row: NewHold) -> Result<ScheduledHold, BackendError>;

    async fn insert_activity(&self, row: NewActivity) -> Result<ActivityLogEntry, BackendError>;
}

/// Signal delivered on a change-feed subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSignal {
    Status(ChannelStatus),
    Change(ChangeEnvelope),
}

/// A live subscription to one shift's channel.
///
/// Dropping the subscription releases the channel as well; `unsubscribe`
/// just makes it explicit.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<FeedSignal>,
}

impl Subscription {
    pub fn new(rx: mpsc::UnboundedReceiver<FeedSignal>) -> Self {
        Self { rx }
    }

    /// Next status change or broadcast. `None` once the transport has
    /// dropped the channel.
    pub async fn next(&mut self) -> Option<FeedSignal> {
        self.rx.recv().await
    }

    pub fn unsubscribe(mut self) {
        self.rx.close();
    }
}

/// Shift-keyed broadcast channel.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Open a channel for `shift`. The first signal reports whether the
    /// subscription took.
    async fn subscribe(&self, shift: Shift) -> Result<Subscription, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rota_id::MemberId;

    fn member() -> Member {
        Member {
            id: MemberId::new(),
            name: "Carol".to_string(),
            shift: Shift::A,
            is_active: true,
            is_available: true,
            position: 2,
            last_hold_date: NaiveDate::from_ymd_opt(2025, 10, 1),
            attributes: MemberAttributes::default(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_patch_clears_nullable_column() {
        let mut m = member();
        let patch = MemberPatch {
            shift: Some(Shift::B),
            position: Some(5),
            last_hold_date: Some(None),
            ..MemberPatch::default()
        };
        patch.apply_to(&mut m);
        assert_eq!(m.shift, Shift::B);
        assert_eq!(m.position, 5);
        assert!(m.last_hold_date.is_none());
        assert_eq!(m.name, "Carol");
    }

    #[test]
    fn test_empty_patch_is_noop() {
        let mut m = member();
        let before = m.clone();
        assert!(MemberPatch::default().is_empty());
        MemberPatch::default().apply_to(&mut m);
        assert_eq!(m, before);
    }

    #[test]
    fn test_row_filter() {
        assert!(RowFilter::All.matches(None));
        assert!(RowFilter::Shift(Shift::C).matches(Some(Shift::C)));
        assert!(!RowFilter::Shift(Shift::C).matches(Some(Shift::A)));
        assert!(!RowFilter::Shift(Shift::C).matches(None));
    }

    #[test]
    fn test_new_member_seed_defaults() {
        let row: NewMember = serde_json::from_value(serde_json::json!({
            "name": "Dana",
            "shift": "C",
            "station": "Station 2"
        }))
        .unwrap();
        assert!(row.is_available);
        assert_eq!(row.position, 0);
        assert_eq!(row.attributes.station.as_deref(), Some("Station 2"));
    }
}
