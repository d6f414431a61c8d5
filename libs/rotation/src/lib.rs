//! Rotation queue primitives.
//!
//! A shift's roster is an ordered list of [`Member`]s. Completing a hold sends
//! the member to the back of the line; every other roster change has to keep
//! the queue dense.
//!
//! # Invariants
//!
//! - Active members of a shift hold positions exactly `0..N`, no gaps, no
//!   duplicates. Inactive members are ignored (their position is stale).
//! - All functions are pure and deterministic; none of them perform I/O.
//! - Moving and renumbering are separate steps so callers can stamp other
//!   fields in between and commit once.

use rota_events::Member;
use rota_id::MemberId;
use thiserror::Error;

/// Contiguity violations reported by [`check_contiguous`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RotationError {
    /// Two active members share a position.
    #[error("duplicate position {position}: {first} and {second}")]
    Duplicate {
        position: u32,
        first: MemberId,
        second: MemberId,
    },

    /// Positions skip a value.
    #[error("gap in positions: expected {expected}, found {found}")]
    Gap { expected: u32, found: u32 },
}

/// Sort by stored position and renumber `0..N` in that order.
///
/// The sort is stable: members with equal stored positions (possible while
/// concurrent edits are in flight) keep their current relative order.
pub fn normalize_positions(members: &mut [Member]) {
    members.sort_by_key(|m| m.position);
    assign_positions(members);
}

/// Move `id` to the end of the list, after the current last position.
///
/// Does not renumber. Returns false (and leaves the list untouched) when the
/// id is not present.
pub fn move_to_bottom(members: &mut Vec<Member>, id: MemberId) -> bool {
    let Some(index) = members.iter().position(|m| m.id == id) else {
        return false;
    };

    let mut member = members.remove(index);
    member.position = members
        .iter()
        .map(|m| m.position)
        .max()
        .map_or(0, |max| max + 1);
    members.push(member);
    true
}

/// Stamp positions from list order.
pub fn assign_positions(members: &mut [Member]) {
    for (index, member) in members.iter_mut().enumerate() {
        member.position = index as u32;
    }
}

/// Position a newly added member gets: one past the highest active position,
/// or 0 for an empty shift.
pub fn next_position(members: &[Member]) -> u32 {
    members
        .iter()
        .filter(|m| m.is_active)
        .map(|m| m.position)
        .max()
        .map_or(0, |max| max + 1)
}

/// The member whose turn it is: the lowest-positioned active member that is
/// also available.
pub fn next_up(members: &[Member]) -> Option<&Member> {
    members
        .iter()
        .filter(|m| m.is_eligible())
        .min_by_key(|m| m.position)
}

/// Verify that active positions are exactly `0..N`.
pub fn check_contiguous(members: &[Member]) -> Result<(), RotationError> {
    let mut active: Vec<&Member> = members.iter().filter(|m| m.is_active).collect();
    active.sort_by_key(|m| m.position);

    for pair in active.windows(2) {
        if pair[0].position == pair[1].position {
            return Err(RotationError::Duplicate {
                position: pair[0].position,
                first: pair[0].id,
                second: pair[1].id,
            });
        }
    }

    for (expected, member) in active.iter().enumerate() {
        if member.position != expected as u32 {
            return Err(RotationError::Gap {
                expected: expected as u32,
                found: member.position,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use rota_events::{MemberAttributes, Shift};

    fn member(name: &str, position: u32) -> Member {
        Member {
            id: MemberId::new(),
            name: name.to_string(),
            shift: Shift::A,
            is_active: true,
            is_available: true,
            position,
            last_hold_date: None,
            attributes: MemberAttributes::default(),
            created_at: Utc::now(),
        }
    }

    fn names(members: &[Member]) -> Vec<&str> {
        members.iter().map(|m| m.name.as_str()).collect()
    }

    fn positions(members: &[Member]) -> Vec<u32> {
        members.iter().map(|m| m.position).collect()
    }

    #[test]
    fn test_normalize_closes_gaps() {
        let mut members = vec![member("carol", 7), member("alice", 0), member("bob", 3)];
        normalize_positions(&mut members);
        assert_eq!(names(&members), ["alice", "bob", "carol"]);
        assert_eq!(positions(&members), [0, 1, 2]);
    }

    #[test]
    fn test_normalize_ties_keep_array_order() {
        let mut members = vec![member("zed", 1), member("amy", 1), member("first", 0)];
        normalize_positions(&mut members);
        assert_eq!(names(&members), ["first", "zed", "amy"]);
    }

    #[test]
    fn test_empty_shift_is_noop() {
        let mut members: Vec<Member> = Vec::new();
        normalize_positions(&mut members);
        assign_positions(&mut members);
        assert!(!move_to_bottom(&mut members, MemberId::new()));
        assert!(members.is_empty());
        assert_eq!(next_position(&members), 0);
        assert!(next_up(&members).is_none());
        assert!(check_contiguous(&members).is_ok());
    }

    #[test]
    fn test_move_to_bottom_does_not_renumber() {
        let mut members = vec![member("alice", 0), member("bob", 1), member("carol", 2)];
        let alice = members[0].id;

        assert!(move_to_bottom(&mut members, alice));
        assert_eq!(names(&members), ["bob", "carol", "alice"]);
        assert_eq!(positions(&members), [1, 2, 3]);

        normalize_positions(&mut members);
        assert_eq!(positions(&members), [0, 1, 2]);
    }

    #[test]
    fn test_move_unknown_id_is_noop() {
        let mut members = vec![member("alice", 0), member("bob", 1)];
        let before = members.clone();
        assert!(!move_to_bottom(&mut members, MemberId::new()));
        assert_eq!(members, before);
    }

    #[test]
    fn test_next_position_ignores_inactive() {
        let mut members = vec![member("alice", 0), member("bob", 1), member("gone", 9)];
        members[2].is_active = false;
        assert_eq!(next_position(&members), 2);
    }

    #[test]
    fn test_next_up_skips_unavailable() {
        let mut members = vec![member("alice", 0), member("bob", 1), member("carol", 2)];
        members[0].is_available = false;
        assert_eq!(next_up(&members).map(|m| m.name.as_str()), Some("bob"));
        // Unavailable members keep their slot.
        assert!(check_contiguous(&members).is_ok());
    }

    #[test]
    fn test_check_contiguous_reports_violations() {
        let members = vec![member("alice", 0), member("bob", 2)];
        assert_eq!(
            check_contiguous(&members),
            Err(RotationError::Gap {
                expected: 1,
                found: 2
            })
        );

        let members = vec![member("alice", 0), member("bob", 0)];
        assert!(matches!(
            check_contiguous(&members),
            Err(RotationError::Duplicate { position: 0, .. })
        ));
    }

    fn roster(len: usize) -> impl Strategy<Value = Vec<Member>> {
        proptest::collection::vec(0u32..50, len).prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, pos)| member(&format!("m{i}"), pos))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_normalize_is_contiguous(mut members in (0usize..20).prop_flat_map(roster)) {
            normalize_positions(&mut members);
            prop_assert!(check_contiguous(&members).is_ok());
        }

        #[test]
        fn prop_move_then_normalize_preserves_others(
            (mut members, pick) in (1usize..20)
                .prop_flat_map(|n| (roster(n), 0..n))
        ) {
            normalize_positions(&mut members);
            let moved = members[pick].id;
            let others_before: Vec<MemberId> =
                members.iter().map(|m| m.id).filter(|id| *id != moved).collect();

            prop_assert!(move_to_bottom(&mut members, moved));
            normalize_positions(&mut members);

            let others_after: Vec<MemberId> =
                members.iter().map(|m| m.id).filter(|id| *id != moved).collect();
            prop_assert_eq!(others_before, others_after);
            prop_assert_eq!(members.last().map(|m| m.id), Some(moved));
            prop_assert!(check_contiguous(&members).is_ok());
        }
    }
}
