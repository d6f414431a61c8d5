//! Roster record definitions.
//!
//! These mirror the rows of the remote store's `members`, `scheduled_holds`
//! and `activity_log` tables.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rota_id::{ActivityId, HoldId, MemberId};
use serde::{Deserialize, Serialize};

use crate::EventError;

// =============================================================================
// Shift
// =============================================================================

/// One of the three fixed duty-rotation groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Shift {
    A,
    B,
    C,
}

impl Shift {
    /// All shifts, in display order.
    pub const ALL: [Shift; 3] = [Shift::A, Shift::B, Shift::C];

    pub fn as_str(&self) -> &'static str {
        match self {
            Shift::A => "A",
            Shift::B => "B",
            Shift::C => "C",
        }
    }
}

impl std::fmt::Display for Shift {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Shift {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(Shift::A),
            "B" | "b" => Ok(Shift::B),
            "C" | "c" => Ok(Shift::C),
            other => Err(EventError::UnknownShift(other.to_string())),
        }
    }
}

// =============================================================================
// Member
// =============================================================================

/// Station, certification and equipment attributes.
///
/// Carried through every roster operation untouched; the rotation logic never
/// reads them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberAttributes {
    #[serde(default)]
    pub station: Option<String>,
    #[serde(default)]
    pub certifications: Vec<String>,
    #[serde(default)]
    pub equipment: Vec<String>,
}

/// A rotation participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    pub shift: Shift,

    /// Soft-delete flag. Inactive members are excluded from the queue and
    /// their `position` is stale.
    pub is_active: bool,

    /// Unavailable members keep their queue slot but are skipped when picking
    /// who is next up.
    pub is_available: bool,

    /// Zero-based queue position within the shift.
    pub position: u32,

    #[serde(default)]
    pub last_hold_date: Option<NaiveDate>,

    #[serde(flatten)]
    pub attributes: MemberAttributes,

    pub created_at: DateTime<Utc>,
}

impl Member {
    /// Whether this member takes part in hold rotation right now.
    pub fn is_eligible(&self) -> bool {
        self.is_active && self.is_available
    }
}

// =============================================================================
// Scheduled Hold
// =============================================================================

/// Hold record status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldStatus {
    Scheduled,
    Completed,
}

/// History of a hold assignment.
///
/// `member_name` is denormalized so the record still reads correctly after
/// the member row is hard-deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledHold {
    pub id: HoldId,
    pub member_id: Option<MemberId>,
    pub member_name: String,
    pub shift: Shift,
    pub hold_date: NaiveDate,
    #[serde(default)]
    pub station: Option<String>,
    pub status: HoldStatus,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Activity Log
// =============================================================================

/// What happened, for the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    MemberAdded,
    HoldCompleted,
    MemberDeleted,
    MemberDeactivated,
    MemberReactivated,
    MemberTransferred,
    QueueReordered,
    AvailabilityChanged,
    MemberUpdated,
    ShiftReset,
    SystemReset,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::MemberAdded => "member_added",
            ActivityKind::HoldCompleted => "hold_completed",
            ActivityKind::MemberDeleted => "member_deleted",
            ActivityKind::MemberDeactivated => "member_deactivated",
            ActivityKind::MemberReactivated => "member_reactivated",
            ActivityKind::MemberTransferred => "member_transferred",
            ActivityKind::QueueReordered => "queue_reordered",
            ActivityKind::AvailabilityChanged => "availability_changed",
            ActivityKind::MemberUpdated => "member_updated",
            ActivityKind::ShiftReset => "shift_reset",
            ActivityKind::SystemReset => "system_reset",
        }
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityKind {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| EventError::UnknownActivityKind(s.to_string()))
    }
}

/// Append-only audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub id: ActivityId,
    pub member_name: String,
    pub action: ActivityKind,
    pub details: String,
    #[serde(default)]
    pub shift: Option<Shift>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_parse() {
        assert_eq!("A".parse::<Shift>().unwrap(), Shift::A);
        assert_eq!(" c ".parse::<Shift>().unwrap(), Shift::C);
        assert_eq!(
            "D".parse::<Shift>().unwrap_err(),
            EventError::UnknownShift("D".to_string())
        );
    }

    #[test]
    fn test_activity_kind_labels_match_serde() {
        let kinds = [
            ActivityKind::MemberAdded,
            ActivityKind::HoldCompleted,
            ActivityKind::MemberTransferred,
            ActivityKind::SystemReset,
        ];
        for kind in kinds {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
            assert_eq!(kind.as_str().parse::<ActivityKind>().unwrap(), kind);
        }
        assert!("member_exploded".parse::<ActivityKind>().is_err());
    }

    #[test]
    fn test_member_attributes_flatten() {
        let json = serde_json::json!({
            "id": MemberId::new().to_string(),
            "name": "Alice",
            "shift": "A",
            "is_active": true,
            "is_available": false,
            "position": 2,
            "station": "Station 4",
            "certifications": ["EMT"],
            "created_at": "2025-10-01T08:00:00Z"
        });

        let member: Member = serde_json::from_value(json).unwrap();
        assert_eq!(member.attributes.station.as_deref(), Some("Station 4"));
        assert_eq!(member.attributes.certifications, vec!["EMT".to_string()]);
        assert!(member.attributes.equipment.is_empty());
        assert!(member.last_hold_date.is_none());
        assert!(!member.is_eligible());
    }

    #[test]
    fn test_hold_status_serialization() {
        assert_eq!(
            serde_json::to_string(&HoldStatus::Completed).unwrap(),
            "\"completed\""
        );
    }
}
