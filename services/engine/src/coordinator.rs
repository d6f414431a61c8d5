//! Optimistic roster mutations with rollback.
//!
//! Every user action follows the same protocol:
//!
//! 1. Snapshot the affected shift rosters.
//! 2. Apply the change to [`RosterStore`] immediately.
//! 3. Issue the matching remote write(s).
//! 4. On success, reconcile with what the store returned, notify, and queue
//!    an activity entry.
//! 5. On failure, put the snapshot back verbatim, notify, and return
//!    [`RolledBack`] instead of the new state.
//!
//! Validation misses (unknown member, hold for an unavailable member, a
//! no-op transfer) return `Ok(None)` without touching anything.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rota_events::{
    ActivityKind, HoldStatus, Member, MemberAttributes, ScheduledHold, Shift, Table,
};
use rota_id::MemberId;
use rota_rotation::{
    assign_positions, move_to_bottom, next_position, next_up, normalize_positions,
};
use tracing::{debug, info, warn};

use crate::activity::ActivityRecorder;
use crate::backend::{BackendError, MemberPatch, NewHold, NewMember, RosterBackend, RowFilter};
use crate::error::{MutationResult, RolledBack, RosterError};
use crate::notify::{NoticeKind, Notifier};
use crate::store::{RosterSnapshot, RosterStore, ShiftRoster};

// =============================================================================
// Requests
// =============================================================================

/// Proof that the user answered a destructive-action prompt.
///
/// The engine never prompts; callers obtain this from their own UI and hand
/// it in with the request.
#[derive(Debug, Clone, Copy)]
pub struct Confirmed(());

impl Confirmed {
    pub fn by_user() -> Self {
        Confirmed(())
    }
}

/// Confirmations for bulk deletes. A full reset needs two.
#[derive(Debug, Clone, Copy)]
pub enum ResetConfirmation {
    Shift { shift: Shift, confirmed: Confirmed },
    System { first: Confirmed, second: Confirmed },
}

impl ResetConfirmation {
    fn shifts(&self) -> Vec<Shift> {
        match self {
            ResetConfirmation::Shift { shift, .. } => vec![*shift],
            ResetConfirmation::System { .. } => Shift::ALL.to_vec(),
        }
    }

    fn filter(&self) -> RowFilter {
        match self {
            ResetConfirmation::Shift { shift, .. } => RowFilter::Shift(*shift),
            ResetConfirmation::System { .. } => RowFilter::All,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AddMember {
    pub name: String,
    pub is_available: bool,
    pub attributes: MemberAttributes,
}

impl AddMember {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_available: true,
            attributes: MemberAttributes::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompleteHold {
    pub member_id: MemberId,
    pub hold_date: NaiveDate,
    /// Station the hold was worked at; defaults to the member's own station.
    pub station: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HoldCompletion {
    pub member: Member,
    /// 1-indexed queue position after the rotation.
    pub queue_position: u32,
    /// `None` when the history write failed; the rotation itself stands.
    pub hold: Option<ScheduledHold>,
}

/// Editable member fields. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct MemberDetails {
    pub name: Option<String>,
    pub attributes: Option<MemberAttributes>,
}

struct Transaction {
    action: &'static str,
    snapshot: RosterSnapshot,
}

// =============================================================================
// Coordinator
// =============================================================================

/// Applies roster mutations optimistically and reconciles with the store.
pub struct MutationCoordinator {
    store: Arc<RosterStore>,
    backend: Arc<dyn RosterBackend>,
    notifier: Arc<dyn Notifier>,
    activity: ActivityRecorder,
}

impl MutationCoordinator {
    pub fn new(
        store: Arc<RosterStore>,
        backend: Arc<dyn RosterBackend>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let activity = ActivityRecorder::new(Arc::clone(&backend));
        Self {
            store,
            backend,
            notifier,
            activity,
        }
    }

    pub fn store(&self) -> &Arc<RosterStore> {
        &self.store
    }

    pub fn activity(&self) -> &ActivityRecorder {
        &self.activity
    }

    /// Fetch a shift from the store and replace the local roster with it.
    pub async fn load(&self, shift: Shift) -> Result<ShiftRoster, RosterError> {
        let rows = self
            .backend
            .select_members(shift)
            .await
            .map_err(|source| RosterError::Load { shift, source })?;

        let roster = ShiftRoster::from_rows(rows);
        self.store.replace(shift, roster.clone()).await;

        debug!(
            shift = %shift,
            active = roster.active.len(),
            inactive = roster.inactive.len(),
            "Roster loaded"
        );
        Ok(roster)
    }

    /// Who is next up for a hold in `shift`.
    pub async fn next_up(&self, shift: Shift) -> Option<Member> {
        next_up(&self.store.active(shift).await).cloned()
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Add a member at the back of the queue.
    pub async fn add_member(&self, shift: Shift, request: AddMember) -> MutationResult<Member> {
        let tx = self.begin("add member", &[shift]).await;
        let placeholder_id = MemberId::new();

        let placeholder = self
            .store
            .update(shift, |roster| {
                let member = Member {
                    id: placeholder_id,
                    name: request.name.clone(),
                    shift,
                    is_active: true,
                    is_available: request.is_available,
                    position: next_position(&roster.active),
                    last_hold_date: None,
                    attributes: request.attributes.clone(),
                    created_at: Utc::now(),
                };
                Arc::make_mut(&mut roster.active).push(member.clone());
                member
            })
            .await;

        let row = NewMember {
            name: placeholder.name.clone(),
            shift,
            position: placeholder.position,
            is_available: placeholder.is_available,
            last_hold_date: None,
            attributes: placeholder.attributes.clone(),
        };
        let member = match self.backend.insert_member(row).await {
            Ok(member) => member,
            Err(e) => return Err(self.rollback(tx, e).await),
        };

        // Swap the placeholder for the stored row, if it is still on screen.
        self.store
            .update(shift, |roster| {
                let active = Arc::make_mut(&mut roster.active);
                if let Some(slot) = active.iter_mut().find(|m| m.id == placeholder_id) {
                    *slot = member.clone();
                }
            })
            .await;

        let position = member.position + 1;
        info!(member_id = %member.id, shift = %shift, position, "Member added");
        self.notifier.notify(
            &format!("{} added to Shift {} at position {}", member.name, shift, position),
            NoticeKind::Success,
        );
        self.activity.record(
            ActivityKind::MemberAdded,
            &member.name,
            format!("Added to Shift {shift} at position {position}"),
            Some(shift),
        );

        Ok(member)
    }

    /// Rotate a member to the back of the queue and record the hold.
    ///
    /// No-op for unknown or unavailable members.
    pub async fn complete_hold(
        &self,
        shift: Shift,
        request: CompleteHold,
    ) -> MutationResult<Option<HoldCompletion>> {
        let tx = self.begin("complete hold", &[shift]).await;
        let Some(member) = find_active(&tx.snapshot, shift, request.member_id) else {
            debug!(member_id = %request.member_id, "Hold completion for unknown member ignored");
            return Ok(None);
        };
        if !member.is_available {
            debug!(member_id = %member.id, "Hold completion for unavailable member ignored");
            return Ok(None);
        }

        let staged = self
            .store
            .update(shift, |roster| {
                let active = Arc::make_mut(&mut roster.active);
                move_to_bottom(active, member.id);
                if let Some(moved) = active.iter_mut().find(|m| m.id == member.id) {
                    moved.last_hold_date = Some(request.hold_date);
                }
                normalize_positions(active);
                active.clone()
            })
            .await;

        let before = tx.snapshot.get(shift).map(|r| r.active.clone()).unwrap_or_default();
        let mut updates = position_updates(&before, &staged);
        upsert_patch(&mut updates, member.id, |patch| {
            patch.last_hold_date = Some(Some(request.hold_date));
        });

        if let Err(e) = self.backend.update_members(updates).await {
            return Err(self.rollback(tx, e).await);
        }

        let moved = staged
            .iter()
            .find(|m| m.id == member.id)
            .cloned()
            .unwrap_or_else(|| member.clone());

        // The rotation is committed; a failed history write does not undo it.
        let hold = match self
            .backend
            .insert_hold(NewHold {
                member_id: Some(moved.id),
                member_name: moved.name.clone(),
                shift,
                hold_date: request.hold_date,
                station: request
                    .station
                    .clone()
                    .or_else(|| moved.attributes.station.clone()),
                status: HoldStatus::Completed,
                completed_at: Some(Utc::now()),
            })
            .await
        {
            Ok(hold) => Some(hold),
            Err(e) => {
                warn!(
                    member_id = %moved.id,
                    hold_date = %request.hold_date,
                    error = %e,
                    "Queue rotated but hold record write failed"
                );
                None
            }
        };

        let queue_position = moved.position + 1;
        info!(
            member_id = %moved.id,
            shift = %shift,
            hold_date = %request.hold_date,
            queue_position,
            "Hold completed"
        );
        self.notifier.notify(
            &format!(
                "{} completed hold on {}; now #{} of {} in Shift {}",
                moved.name,
                request.hold_date,
                queue_position,
                staged.len(),
                shift
            ),
            NoticeKind::Success,
        );
        self.activity.record(
            ActivityKind::HoldCompleted,
            &moved.name,
            format!(
                "Hold on {}; moved to position {}",
                request.hold_date, queue_position
            ),
            Some(shift),
        );

        Ok(Some(HoldCompletion {
            member: moved,
            queue_position,
            hold,
        }))
    }

    /// Hard-delete a member. Hold history keeps the member's name.
    ///
    /// The row delete is the commit point: only its failure rolls back.
    pub async fn delete_member(
        &self,
        shift: Shift,
        id: MemberId,
        _confirmed: Confirmed,
    ) -> MutationResult<Option<Member>> {
        let tx = self.begin("delete member", &[shift]).await;
        let before = tx.snapshot.get(shift).cloned().unwrap_or_default();
        let (member, was_active) = match (before.find_active(id), before.find_inactive(id)) {
            (Some(m), _) => (m.clone(), true),
            (None, Some(m)) => (m.clone(), false),
            (None, None) => return Ok(None),
        };

        let remaining = self
            .store
            .update(shift, |roster| {
                if was_active {
                    let active = Arc::make_mut(&mut roster.active);
                    active.retain(|m| m.id != id);
                    normalize_positions(active);
                    active.clone()
                } else {
                    Arc::make_mut(&mut roster.inactive).retain(|m| m.id != id);
                    Vec::new()
                }
            })
            .await;

        if let Err(e) = self.backend.delete_member(id).await {
            return Err(self.rollback(tx, e).await);
        }

        // The row is gone; renumbering failures no longer undo the delete.
        // Stored positions keep a gap until the next load normalizes them.
        let updates = position_updates(&before.active, &remaining);
        if !updates.is_empty() {
            if let Err(e) = self.backend.update_members(updates).await {
                warn!(
                    member_id = %id,
                    shift = %shift,
                    error = %e,
                    "Member deleted but queue renumbering write failed"
                );
            }
        }

        info!(member_id = %id, shift = %shift, "Member deleted");
        self.notifier.notify(
            &format!("{} removed from Shift {}", member.name, shift),
            NoticeKind::Success,
        );
        self.activity.record(
            ActivityKind::MemberDeleted,
            &member.name,
            format!("Deleted from Shift {shift}"),
            Some(shift),
        );

        Ok(Some(member))
    }

    /// Soft-remove a member from the queue.
    pub async fn deactivate(&self, shift: Shift, id: MemberId) -> MutationResult<Option<Member>> {
        let tx = self.begin("deactivate member", &[shift]).await;
        let before = tx.snapshot.get(shift).map(|r| r.active.clone()).unwrap_or_default();
        if !before.iter().any(|m| m.id == id) {
            return Ok(None);
        }

        let staged = self
            .store
            .update(shift, |roster| {
                let active = Arc::make_mut(&mut roster.active);
                let index = active.iter().position(|m| m.id == id)?;
                let mut member = active.remove(index);
                member.is_active = false;
                normalize_positions(active);
                let remaining = active.clone();

                let inactive = Arc::make_mut(&mut roster.inactive);
                inactive.push(member.clone());
                inactive.sort_by(|a, b| a.name.cmp(&b.name));
                Some((member, remaining))
            })
            .await;
        let Some((member, remaining)) = staged else {
            return Ok(None);
        };

        let mut updates = position_updates(&before, &remaining);
        upsert_patch(&mut updates, id, |patch| patch.is_active = Some(false));

        if let Err(e) = self.backend.update_members(updates).await {
            return Err(self.rollback(tx, e).await);
        }

        info!(member_id = %id, shift = %shift, "Member deactivated");
        self.notifier.notify(
            &format!("{} deactivated", member.name),
            NoticeKind::Success,
        );
        self.activity.record(
            ActivityKind::MemberDeactivated,
            &member.name,
            format!("Deactivated in Shift {shift}"),
            Some(shift),
        );

        Ok(Some(member))
    }

    /// Bring a deactivated member back at the top of the queue.
    ///
    /// `position_hint` is accepted for API compatibility and ignored.
    pub async fn reactivate(
        &self,
        shift: Shift,
        id: MemberId,
        position_hint: Option<u32>,
    ) -> MutationResult<Option<Member>> {
        let tx = self.begin("reactivate member", &[shift]).await;
        let before = tx.snapshot.get(shift).cloned().unwrap_or_default();
        if before.find_inactive(id).is_none() {
            return Ok(None);
        }
        if let Some(hint) = position_hint {
            debug!(member_id = %id, hint, "Reactivation position hint ignored");
        }

        let staged = self
            .store
            .update(shift, |roster| {
                let inactive = Arc::make_mut(&mut roster.inactive);
                let index = inactive.iter().position(|m| m.id == id)?;
                let mut member = inactive.remove(index);
                member.is_active = true;

                let active = Arc::make_mut(&mut roster.active);
                active.insert(0, member);
                assign_positions(active);
                Some(active.clone())
            })
            .await;
        let Some(active) = staged else {
            return Ok(None);
        };

        let mut updates = position_updates(&before.active, &active);
        upsert_patch(&mut updates, id, |patch| patch.is_active = Some(true));

        if let Err(e) = self.backend.update_members(updates).await {
            return Err(self.rollback(tx, e).await);
        }

        let member = active[0].clone();
        info!(member_id = %id, shift = %shift, "Member reactivated");
        self.notifier.notify(
            &format!("{} reactivated at the top of Shift {}", member.name, shift),
            NoticeKind::Success,
        );
        self.activity.record(
            ActivityKind::MemberReactivated,
            &member.name,
            format!("Reactivated in Shift {shift} at position 1"),
            Some(shift),
        );

        Ok(Some(member))
    }

    /// Move a member to the back of another shift's queue.
    ///
    /// Hold history is shift-scoped, so the last-hold date is cleared. If the
    /// destination shift is loaded locally, the member is appended there too.
    pub async fn transfer(
        &self,
        shift: Shift,
        id: MemberId,
        to: Shift,
    ) -> MutationResult<Option<Member>> {
        if shift == to {
            return Ok(None);
        }

        let tx = self.begin("transfer member", &[shift]).await;
        let before = tx.snapshot.get(shift).map(|r| r.active.clone()).unwrap_or_default();
        if !before.iter().any(|m| m.id == id) {
            return Ok(None);
        }

        let staged = self
            .store
            .update(shift, |roster| {
                let active = Arc::make_mut(&mut roster.active);
                let index = active.iter().position(|m| m.id == id)?;
                let member = active.remove(index);
                normalize_positions(active);
                Some((member, active.clone()))
            })
            .await;
        let Some((mut member, remaining)) = staged else {
            return Ok(None);
        };

        // Read-then-write: another client may append to `to` in between. The
        // next reload of `to` renormalizes.
        let destination = match self.backend.select_members(to).await {
            Ok(rows) => rows,
            Err(e) => return Err(self.rollback(tx, e).await),
        };
        let destination: Vec<Member> = destination.into_iter().filter(|m| m.id != id).collect();
        let new_position = next_position(&destination);

        let mut updates = position_updates(&before, &remaining);
        updates.push((
            id,
            MemberPatch {
                shift: Some(to),
                position: Some(new_position),
                last_hold_date: Some(None),
                ..MemberPatch::default()
            },
        ));

        if let Err(e) = self.backend.update_members(updates).await {
            return Err(self.rollback(tx, e).await);
        }

        member.shift = to;
        member.position = new_position;
        member.last_hold_date = None;

        // Show the arrival if this client has the destination shift open.
        let arrived = member.clone();
        self.store
            .update_loaded(to, |roster| {
                let active = Arc::make_mut(&mut roster.active);
                active.retain(|m| m.id != id);
                active.push(arrived);
                normalize_positions(active);
            })
            .await;

        info!(member_id = %id, from = %shift, to = %to, position = new_position, "Member transferred");
        self.notifier.notify(
            &format!(
                "{} transferred to Shift {} at position {}",
                member.name,
                to,
                new_position + 1
            ),
            NoticeKind::Success,
        );
        self.activity.record(
            ActivityKind::MemberTransferred,
            &member.name,
            format!("Transferred from Shift {shift} to Shift {to}"),
            Some(to),
        );

        Ok(Some(member))
    }

    /// Persist a manual ordering of the active queue.
    ///
    /// Unknown ids are skipped; active members missing from `ordering` follow
    /// the listed ones in their current order.
    pub async fn reorder(&self, shift: Shift, ordering: &[MemberId]) -> MutationResult<Vec<Member>> {
        let tx = self.begin("reorder queue", &[shift]).await;
        let before = tx.snapshot.get(shift).map(|r| r.active.clone()).unwrap_or_default();

        let staged = self
            .store
            .update(shift, |roster| {
                let mut rest: Vec<Member> = roster.active.as_ref().clone();
                let mut ordered = Vec::with_capacity(rest.len());
                for id in ordering {
                    if let Some(index) = rest.iter().position(|m| m.id == *id) {
                        ordered.push(rest.remove(index));
                    }
                }
                ordered.extend(rest);
                assign_positions(&mut ordered);
                roster.active = Arc::new(ordered.clone());
                ordered
            })
            .await;

        let updates = position_updates(&before, &staged);
        if updates.is_empty() {
            return Ok(staged);
        }

        if let Err(e) = self.backend.update_members(updates).await {
            return Err(self.rollback(tx, e).await);
        }

        info!(shift = %shift, members = staged.len(), "Queue reordered");
        self.notifier.notify(
            &format!("Queue order updated for Shift {shift}"),
            NoticeKind::Success,
        );
        let order: Vec<&str> = staged.iter().map(|m| m.name.as_str()).collect();
        self.activity.record(
            ActivityKind::QueueReordered,
            format!("Shift {shift}"),
            order.join(", "),
            Some(shift),
        );

        Ok(staged)
    }

    /// Mark a member available or unavailable. Queue position is unchanged.
    pub async fn set_availability(
        &self,
        shift: Shift,
        id: MemberId,
        available: bool,
    ) -> MutationResult<Option<Member>> {
        let tx = self.begin("update availability", &[shift]).await;
        match find_active(&tx.snapshot, shift, id) {
            Some(m) if m.is_available != available => {}
            _ => return Ok(None),
        }

        let staged = self
            .store
            .update(shift, |roster| {
                let active = Arc::make_mut(&mut roster.active);
                let member = active.iter_mut().find(|m| m.id == id)?;
                member.is_available = available;
                Some(member.clone())
            })
            .await;
        let Some(member) = staged else {
            return Ok(None);
        };

        let patch = MemberPatch {
            is_available: Some(available),
            ..MemberPatch::default()
        };
        if let Err(e) = self.backend.update_member(id, patch).await {
            return Err(self.rollback(tx, e).await);
        }

        let label = if available { "available" } else { "unavailable" };
        info!(member_id = %id, shift = %shift, available, "Availability changed");
        self.notifier.notify(
            &format!("{} marked {}", member.name, label),
            NoticeKind::Success,
        );
        self.activity.record(
            ActivityKind::AvailabilityChanged,
            &member.name,
            format!("Marked {label}"),
            Some(shift),
        );

        Ok(Some(member))
    }

    /// Edit a member's name or attributes, active or not.
    pub async fn update_details(
        &self,
        shift: Shift,
        id: MemberId,
        details: MemberDetails,
    ) -> MutationResult<Option<Member>> {
        let patch = MemberPatch {
            name: details.name,
            attributes: details.attributes,
            ..MemberPatch::default()
        };
        if patch.is_empty() {
            return Ok(None);
        }

        let tx = self.begin("update member", &[shift]).await;
        let staged = self
            .store
            .update(shift, |roster| {
                for list in [&mut roster.active, &mut roster.inactive] {
                    if list.iter().any(|m| m.id == id) {
                        let member = Arc::make_mut(list).iter_mut().find(|m| m.id == id)?;
                        patch.apply_to(member);
                        return Some(member.clone());
                    }
                }
                None
            })
            .await;
        let Some(member) = staged else {
            return Ok(None);
        };

        if let Err(e) = self.backend.update_member(id, patch).await {
            return Err(self.rollback(tx, e).await);
        }

        info!(member_id = %id, shift = %shift, "Member updated");
        self.notifier
            .notify(&format!("{} updated", member.name), NoticeKind::Success);
        self.activity.record(
            ActivityKind::MemberUpdated,
            &member.name,
            "Details updated",
            Some(shift),
        );

        Ok(Some(member))
    }

    /// Delete every member of a shift, or wipe all roster data.
    ///
    /// Nothing is cleared locally until the store confirms the member delete,
    /// which is the commit point. A full reset then also clears hold history
    /// and the activity log; a failure there is reported but not rolled back.
    /// Returns the number of member rows deleted.
    pub async fn reset(&self, confirmation: ResetConfirmation) -> MutationResult<u64> {
        let shifts = confirmation.shifts();
        let filter = confirmation.filter();
        let system = matches!(confirmation, ResetConfirmation::System { .. });
        let action = if system { "reset all data" } else { "reset shift" };

        let tx = self.begin(action, &shifts).await;

        let removed = match self.backend.delete_where(Table::Members, filter).await {
            Ok(n) => n,
            Err(e) => return Err(self.rollback(tx, e).await),
        };
        self.store.clear(&shifts).await;

        // Members are gone at this point; history that will not clear is
        // reported on its own and does not bring them back.
        if system {
            for table in [Table::ScheduledHolds, Table::ActivityLog] {
                if let Err(e) = self.backend.delete_where(table, RowFilter::All).await {
                    warn!(table = %table, error = %e, "Members reset but history clear failed");
                    self.notifier.notify(
                        &format!("Members were removed, but {table} could not be cleared"),
                        NoticeKind::Error,
                    );
                }
            }
        }

        warn!(shifts = ?shifts, removed, system, "Roster reset");
        let (kind, scope, shift) = match confirmation {
            ResetConfirmation::Shift { shift, .. } => {
                (ActivityKind::ShiftReset, format!("Shift {shift}"), Some(shift))
            }
            ResetConfirmation::System { .. } => {
                (ActivityKind::SystemReset, "all shifts".to_string(), None)
            }
        };
        self.notifier.notify(
            &format!("Reset {scope}: {removed} members removed"),
            NoticeKind::Success,
        );
        self.activity.record(
            kind,
            "System",
            format!("Removed {removed} members from {scope}"),
            shift,
        );

        Ok(removed)
    }

    // -------------------------------------------------------------------------
    // Transactions
    // -------------------------------------------------------------------------

    async fn begin(&self, action: &'static str, shifts: &[Shift]) -> Transaction {
        Transaction {
            action,
            snapshot: self.store.snapshot(shifts).await,
        }
    }

    async fn rollback(&self, tx: Transaction, source: BackendError) -> RolledBack {
        self.store.restore(&tx.snapshot).await;

        warn!(action = tx.action, error = %source, "Remote write failed; local changes rolled back");
        self.notifier.notify(
            &format!("Could not {}. Changes were reverted.", tx.action),
            NoticeKind::Error,
        );

        RolledBack {
            action: tx.action,
            source,
            restored: tx.snapshot,
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn find_active(snapshot: &RosterSnapshot, shift: Shift, id: MemberId) -> Option<Member> {
    snapshot
        .get(shift)
        .and_then(|roster| roster.find_active(id))
        .cloned()
}

/// Position writes for members whose position differs from `before`
/// (including members that were not in `before` at all).
fn position_updates(before: &[Member], after: &[Member]) -> Vec<(MemberId, MemberPatch)> {
    after
        .iter()
        .filter(|m| {
            before
                .iter()
                .find(|b| b.id == m.id)
                .is_none_or(|b| b.position != m.position)
        })
        .map(|m| (m.id, MemberPatch::position(m.position)))
        .collect()
}

/// Extend the patch for `id`, adding one if the batch has none yet.
fn upsert_patch(
    updates: &mut Vec<(MemberId, MemberPatch)>,
    id: MemberId,
    f: impl FnOnce(&mut MemberPatch),
) {
    match updates.iter_mut().find(|(uid, _)| *uid == id) {
        Some((_, patch)) => f(patch),
        None => {
            let mut patch = MemberPatch::default();
            f(&mut patch);
            updates.push((id, patch));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rota_events::MemberAttributes;

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

    #[test]
    fn test_position_updates_only_changed_rows() {
        let before = vec![member("alice", 0), member("bob", 1), member("carol", 2)];
        let mut after = vec![before[0].clone(), before[2].clone()];
        assign_positions(&mut after);

        let updates = position_updates(&before, &after);
        assert_eq!(updates, vec![(before[2].id, MemberPatch::position(1))]);
    }

    #[test]
    fn test_position_updates_include_new_rows() {
        let before = vec![member("alice", 0)];
        let newcomer = member("bob", 0);
        let mut after = vec![newcomer.clone(), before[0].clone()];
        assign_positions(&mut after);

        let updates = position_updates(&before, &after);
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].0, newcomer.id);
    }

    #[test]
    fn test_upsert_patch_merges() {
        let id = MemberId::new();
        let mut updates = vec![(id, MemberPatch::position(3))];
        upsert_patch(&mut updates, id, |p| p.is_active = Some(false));
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].1.position, Some(3));
        assert_eq!(updates[0].1.is_active, Some(false));

        let other = MemberId::new();
        upsert_patch(&mut updates, other, |p| p.is_active = Some(true));
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[1].1.position, None);
    }

    #[test]
    fn test_reset_confirmation_scope() {
        let shift = ResetConfirmation::Shift {
            shift: Shift::B,
            confirmed: Confirmed::by_user(),
        };
        assert_eq!(shift.shifts(), vec![Shift::B]);
        assert_eq!(shift.filter(), RowFilter::Shift(Shift::B));

        let system = ResetConfirmation::System {
            first: Confirmed::by_user(),
            second: Confirmed::by_user(),
        };
        assert_eq!(system.shifts(), Shift::ALL.to_vec());
        assert_eq!(system.filter(), RowFilter::All);
    }
}
