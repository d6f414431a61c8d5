//! Per-shift roster state.
//!
//! [`RosterStore`] is the single owner of what the interface shows: for each
//! shift, the ordered active queue and the deactivated members. Lists are
//! held behind `Arc` so a snapshot is a pair of pointer copies and a rollback
//! restores the exact values the mutation started from.

use std::collections::HashMap;
use std::sync::Arc;

use rota_events::{Member, Shift};
use rota_id::MemberId;
use rota_rotation::normalize_positions;
use tokio::sync::{watch, RwLock};
use tracing::debug;

/// One shift's visible roster.
#[derive(Debug, Clone, Default)]
pub struct ShiftRoster {
    /// Active members in queue order; positions are `0..N`.
    pub active: Arc<Vec<Member>>,

    /// Deactivated members, kept for reactivation and history. Their
    /// positions are meaningless.
    pub inactive: Arc<Vec<Member>>,
}

impl ShiftRoster {
    /// Build from store rows: partition by the active flag and normalize the
    /// active queue.
    pub fn from_rows(rows: Vec<Member>) -> Self {
        let (mut active, mut inactive): (Vec<Member>, Vec<Member>) =
            rows.into_iter().partition(|m| m.is_active);
        normalize_positions(&mut active);
        inactive.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            active: Arc::new(active),
            inactive: Arc::new(inactive),
        }
    }

    pub fn find_active(&self, id: MemberId) -> Option<&Member> {
        self.active.iter().find(|m| m.id == id)
    }

    pub fn find_inactive(&self, id: MemberId) -> Option<&Member> {
        self.inactive.iter().find(|m| m.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.inactive.is_empty()
    }

    /// True when both lists are the very same allocations as `other`'s.
    pub fn ptr_eq(&self, other: &ShiftRoster) -> bool {
        Arc::ptr_eq(&self.active, &other.active) && Arc::ptr_eq(&self.inactive, &other.inactive)
    }
}

/// Rosters captured at the start of a mutation.
#[derive(Debug, Clone, Default)]
pub struct RosterSnapshot {
    rosters: Vec<(Shift, ShiftRoster)>,
}

impl RosterSnapshot {
    pub fn get(&self, shift: Shift) -> Option<&ShiftRoster> {
        self.rosters
            .iter()
            .find(|(s, _)| *s == shift)
            .map(|(_, roster)| roster)
    }

    pub fn shifts(&self) -> impl Iterator<Item = Shift> + '_ {
        self.rosters.iter().map(|(s, _)| *s)
    }
}

/// Owned roster state for all shifts.
///
/// Every change bumps a version counter; [`RosterStore::subscribe`] hands out
/// a receiver for it so views can re-render.
pub struct RosterStore {
    shifts: RwLock<HashMap<Shift, ShiftRoster>>,
    version: watch::Sender<u64>,
}

impl Default for RosterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RosterStore {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            shifts: RwLock::new(HashMap::new()),
            version,
        }
    }

    /// Current roster for `shift` (empty if never loaded).
    pub async fn roster(&self, shift: Shift) -> ShiftRoster {
        self.shifts
            .read()
            .await
            .get(&shift)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn active(&self, shift: Shift) -> Arc<Vec<Member>> {
        self.roster(shift).await.active
    }

    /// Replace a shift's roster wholesale (used by reloads).
    pub async fn replace(&self, shift: Shift, roster: ShiftRoster) {
        self.shifts.write().await.insert(shift, roster);
        self.bump();
    }

    /// Mutate a shift's roster in place and publish the change.
    ///
    /// Use `Arc::make_mut` on the lists inside `f`: lists shared with a
    /// snapshot are copied on write, so the snapshot stays intact.
    pub async fn update<F, R>(&self, shift: Shift, f: F) -> R
    where
        F: FnOnce(&mut ShiftRoster) -> R,
    {
        let result = {
            let mut shifts = self.shifts.write().await;
            f(shifts.entry(shift).or_default())
        };
        self.bump();
        result
    }

    /// Like [`RosterStore::update`], but only for a shift that has been
    /// loaded or cleared. Returns `None` and publishes nothing otherwise.
    pub async fn update_loaded<F, R>(&self, shift: Shift, f: F) -> Option<R>
    where
        F: FnOnce(&mut ShiftRoster) -> R,
    {
        let result = {
            let mut shifts = self.shifts.write().await;
            shifts.get_mut(&shift).map(f)
        };
        if result.is_some() {
            self.bump();
        }
        result
    }

    pub async fn snapshot(&self, shifts: &[Shift]) -> RosterSnapshot {
        let guard = self.shifts.read().await;
        RosterSnapshot {
            rosters: shifts
                .iter()
                .map(|s| (*s, guard.get(s).cloned().unwrap_or_default()))
                .collect(),
        }
    }

    /// Put back every roster captured in `snapshot`, verbatim.
    pub async fn restore(&self, snapshot: &RosterSnapshot) {
        {
            let mut shifts = self.shifts.write().await;
            for (shift, roster) in &snapshot.rosters {
                shifts.insert(*shift, roster.clone());
            }
        }
        debug!(shifts = ?snapshot.shifts().collect::<Vec<_>>(), "Roster snapshot restored");
        self.bump();
    }

    pub async fn clear(&self, shifts: &[Shift]) {
        {
            let mut guard = self.shifts.write().await;
            for shift in shifts {
                guard.insert(*shift, ShiftRoster::default());
            }
        }
        self.bump();
    }

    /// Receiver that observes a new value after every roster change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rota_events::MemberAttributes;

    fn member(name: &str, position: u32, active: bool) -> Member {
        Member {
            id: MemberId::new(),
            name: name.to_string(),
            shift: Shift::A,
            is_active: active,
            is_available: true,
            position,
            last_hold_date: None,
            attributes: MemberAttributes::default(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_from_rows_partitions_and_normalizes() {
        let roster = ShiftRoster::from_rows(vec![
            member("carol", 5, true),
            member("zoe", 1, false),
            member("alice", 2, true),
            member("bob", 1, false),
        ]);

        let active: Vec<(&str, u32)> = roster
            .active
            .iter()
            .map(|m| (m.name.as_str(), m.position))
            .collect();
        assert_eq!(active, [("alice", 0), ("carol", 1)]);

        let inactive: Vec<&str> = roster.inactive.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(inactive, ["bob", "zoe"]);
    }

    #[tokio::test]
    async fn test_restore_is_reference_equal() {
        let store = RosterStore::new();
        store
            .replace(
                Shift::A,
                ShiftRoster::from_rows(vec![member("alice", 0, true), member("bob", 1, true)]),
            )
            .await;

        let snapshot = store.snapshot(&[Shift::A]).await;
        store
            .update(Shift::A, |roster| {
                Arc::make_mut(&mut roster.active).remove(0);
            })
            .await;
        assert_eq!(store.active(Shift::A).await.len(), 1);
        // Copy-on-write left the snapshot untouched.
        assert_eq!(snapshot.get(Shift::A).unwrap().active.len(), 2);

        store.restore(&snapshot).await;
        let restored = store.roster(Shift::A).await;
        assert!(restored.ptr_eq(snapshot.get(Shift::A).unwrap()));
    }

    #[tokio::test]
    async fn test_update_loaded_skips_unknown_shift() {
        let store = RosterStore::new();
        let version = store.version();

        let skipped = store
            .update_loaded(Shift::C, |roster| {
                Arc::make_mut(&mut roster.active).push(member("zoe", 0, true));
            })
            .await;
        assert!(skipped.is_none());
        assert_eq!(store.version(), version);

        store.replace(Shift::C, ShiftRoster::default()).await;
        let applied = store
            .update_loaded(Shift::C, |roster| {
                Arc::make_mut(&mut roster.active).push(member("zoe", 0, true));
                roster.active.len()
            })
            .await;
        assert_eq!(applied, Some(1));
        assert_eq!(store.active(Shift::C).await.len(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_sees_changes() {
        let store = RosterStore::new();
        let mut rx = store.subscribe();
        let before = *rx.borrow_and_update();

        store.clear(&[Shift::B]).await;
        rx.changed().await.unwrap();
        assert!(*rx.borrow() > before);
        assert!(store.roster(Shift::B).await.is_empty());
    }
}
