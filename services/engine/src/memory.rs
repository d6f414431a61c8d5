//! In-memory remote store for tests and development.
//!
//! Behaves like the remote table service: assigns ids and timestamps on
//! insert, applies batched updates all-or-nothing, and broadcasts a
//! [`ChangeEnvelope`] to the shift's subscribers after every committed write.
//! Faults can be injected to exercise rollback and reconnect paths.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use rota_events::{
    ActivityLogEntry, ChangeEnvelope, ChangeKind, ChannelStatus, Member, ScheduledHold, Shift,
    Table,
};
use rota_id::{ActivityId, HoldId, MemberId};
use tokio::sync::mpsc;
use tracing::debug;

use crate::backend::{
    BackendError, ChangeFeed, FeedSignal, MemberPatch, NewActivity, NewHold, NewMember,
    RosterBackend, RowFilter, Subscription,
};

#[derive(Default)]
struct Tables {
    members: Vec<Member>,
    holds: Vec<ScheduledHold>,
    activity: Vec<ActivityLogEntry>,
}

#[derive(Default)]
struct Faults {
    /// Fail this many upcoming member-table writes.
    member_writes: u32,
    /// Fail this many upcoming member updates; inserts and deletes still land.
    member_updates: u32,
    /// Tables whose writes always fail.
    broken_tables: HashSet<Table>,
    /// Fail this many upcoming subscriptions with `ChannelStatus::Error`.
    subscriptions: u32,
    reads: bool,
}

/// In-memory [`RosterBackend`] and [`ChangeFeed`].
#[derive(Default)]
pub struct InMemoryBackend {
    tables: Mutex<Tables>,
    faults: Mutex<Faults>,
    subscribers: Mutex<Vec<(Shift, mpsc::UnboundedSender<FeedSignal>)>>,
    member_writes: AtomicU64,
    subscribe_calls: AtomicU64,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Fault injection
    // -------------------------------------------------------------------------

    /// Fail the next `n` writes to the members table.
    pub fn fail_next_member_writes(&self, n: u32) {
        self.faults().member_writes = n;
    }

    /// Fail the next `n` member updates, single or batched.
    pub fn fail_next_member_updates(&self, n: u32) {
        self.faults().member_updates = n;
    }

    /// Make every write to `table` fail until cleared.
    pub fn break_table(&self, table: Table, broken: bool) {
        let mut faults = self.faults();
        if broken {
            faults.broken_tables.insert(table);
        } else {
            faults.broken_tables.remove(&table);
        }
    }

    /// Fail the next `n` subscriptions.
    pub fn fail_next_subscriptions(&self, n: u32) {
        self.faults().subscriptions = n;
    }

    pub fn fail_reads(&self, fail: bool) {
        self.faults().reads = fail;
    }

    /// Push `status` to every live subscriber of `shift` and drop them, as a
    /// transport failure would.
    pub fn interrupt(&self, shift: Shift, status: ChannelStatus) {
        let mut subscribers = self.subscribers();
        subscribers.retain(|(s, tx)| {
            if *s != shift {
                return true;
            }
            let _ = tx.send(FeedSignal::Status(status));
            false
        });
        debug!(shift = %shift, status = %status, "[MEMORY] Channel interrupted");
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    /// Members of a shift ordered by position, active ones first.
    pub fn members(&self, shift: Shift) -> Vec<Member> {
        let mut rows: Vec<Member> = self
            .tables()
            .members
            .iter()
            .filter(|m| m.shift == shift)
            .cloned()
            .collect();
        rows.sort_by_key(|m| (!m.is_active, m.position));
        rows
    }

    pub fn member(&self, id: MemberId) -> Option<Member> {
        self.tables().members.iter().find(|m| m.id == id).cloned()
    }

    pub fn holds(&self) -> Vec<ScheduledHold> {
        self.tables().holds.clone()
    }

    pub fn activity(&self) -> Vec<ActivityLogEntry> {
        self.tables().activity.clone()
    }

    /// Successful member-table write calls so far.
    pub fn member_write_count(&self) -> u64 {
        self.member_writes.load(Ordering::SeqCst)
    }

    pub fn subscribe_calls(&self) -> u64 {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    /// Subscribers of `shift` whose receiving end is still open.
    pub fn live_subscribers(&self, shift: Shift) -> usize {
        self.subscribers()
            .iter()
            .filter(|(s, tx)| *s == shift && !tx.is_closed())
            .count()
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn subscribers(&self) -> std::sync::MutexGuard<'_, Vec<(Shift, mpsc::UnboundedSender<FeedSignal>)>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_write(&self, table: Table) -> Result<(), BackendError> {
        let mut faults = self.faults();
        if faults.broken_tables.contains(&table) {
            return Err(BackendError::Unavailable(format!("{table} is unavailable")));
        }
        if table == Table::Members && faults.member_writes > 0 {
            faults.member_writes -= 1;
            return Err(BackendError::Unavailable("injected write failure".to_string()));
        }
        Ok(())
    }

    fn committed(&self, table: Table) {
        if table == Table::Members {
            self.member_writes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn publish(&self, change: ChangeEnvelope) {
        let mut subscribers = self.subscribers();
        subscribers.retain(|(shift, tx)| {
            if !change.concerns(*shift) {
                return !tx.is_closed();
            }
            tx.send(FeedSignal::Change(change.clone())).is_ok()
        });
    }
}

#[async_trait]
impl RosterBackend for InMemoryBackend {
    async fn select_members(&self, shift: Shift) -> Result<Vec<Member>, BackendError> {
        if self.faults().reads {
            return Err(BackendError::Unavailable("injected read failure".to_string()));
        }
        let mut rows: Vec<Member> = self
            .tables()
            .members
            .iter()
            .filter(|m| m.shift == shift)
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.position);
        Ok(rows)
    }

    async fn insert_member(&self, row: NewMember) -> Result<Member, BackendError> {
        self.check_write(Table::Members)?;

        let member = Member {
            id: MemberId::new(),
            name: row.name,
            shift: row.shift,
            is_active: true,
            is_available: row.is_available,
            position: row.position,
            last_hold_date: row.last_hold_date,
            attributes: row.attributes,
            created_at: Utc::now(),
        };
        self.tables().members.push(member.clone());
        self.committed(Table::Members);

        debug!(member_id = %member.id, shift = %member.shift, "[MEMORY] Member inserted");
        self.publish(
            ChangeEnvelope::new(Table::Members, ChangeKind::Insert, Some(member.shift))
                .with_records([member.id]),
        );
        Ok(member)
    }

    async fn update_member(&self, id: MemberId, patch: MemberPatch) -> Result<(), BackendError> {
        self.update_members(vec![(id, patch)]).await
    }

    async fn update_members(
        &self,
        updates: Vec<(MemberId, MemberPatch)>,
    ) -> Result<(), BackendError> {
        if updates.is_empty() {
            return Ok(());
        }
        self.check_write(Table::Members)?;
        {
            let mut faults = self.faults();
            if faults.member_updates > 0 {
                faults.member_updates -= 1;
                return Err(BackendError::Unavailable("injected update failure".to_string()));
            }
        }

        let mut touched: Vec<Shift> = Vec::new();
        {
            let mut tables = self.tables();

            // Validate everything first so the batch is all-or-nothing.
            for (id, _) in &updates {
                if !tables.members.iter().any(|m| m.id == *id) {
                    return Err(BackendError::member_not_found(*id));
                }
            }

            for (id, patch) in &updates {
                if let Some(member) = tables.members.iter_mut().find(|m| m.id == *id) {
                    touched.push(member.shift);
                    patch.apply_to(member);
                    touched.push(member.shift);
                }
            }
        }
        self.committed(Table::Members);

        touched.sort();
        touched.dedup();
        let ids: Vec<MemberId> = updates.iter().map(|(id, _)| *id).collect();
        for shift in touched {
            self.publish(
                ChangeEnvelope::new(Table::Members, ChangeKind::Update, Some(shift))
                    .with_records(ids.iter()),
            );
        }
        Ok(())
    }

    async fn delete_member(&self, id: MemberId) -> Result<(), BackendError> {
        self.check_write(Table::Members)?;

        let removed = {
            let mut tables = self.tables();
            let index = tables
                .members
                .iter()
                .position(|m| m.id == id)
                .ok_or_else(|| BackendError::member_not_found(id))?;
            tables.members.remove(index)
        };
        self.committed(Table::Members);

        self.publish(
            ChangeEnvelope::new(Table::Members, ChangeKind::Delete, Some(removed.shift))
                .with_records([id]),
        );
        Ok(())
    }

    async fn delete_where(&self, table: Table, filter: RowFilter) -> Result<u64, BackendError> {
        self.check_write(table)?;

        let removed = {
            let mut tables = self.tables();
            match table {
                Table::Members => {
                    let before = tables.members.len();
                    tables.members.retain(|m| !filter.matches(Some(m.shift)));
                    before - tables.members.len()
                }
                Table::ScheduledHolds => {
                    let before = tables.holds.len();
                    tables.holds.retain(|h| !filter.matches(Some(h.shift)));
                    before - tables.holds.len()
                }
                Table::ActivityLog => {
                    let before = tables.activity.len();
                    tables.activity.retain(|a| !filter.matches(a.shift));
                    before - tables.activity.len()
                }
            }
        };
        self.committed(table);

        let shift = match filter {
            RowFilter::Shift(shift) => Some(shift),
            RowFilter::All => None,
        };
        self.publish(ChangeEnvelope::new(table, ChangeKind::Delete, shift));
        Ok(removed as u64)
    }

    async fn insert_hold(&self, row: NewHold) -> Result<ScheduledHold, BackendError> {
        self.check_write(Table::ScheduledHolds)?;

        let hold = ScheduledHold {
            id: HoldId::new(),
            member_id: row.member_id,
            member_name: row.member_name,
            shift: row.shift,
            hold_date: row.hold_date,
            station: row.station,
            status: row.status,
            completed_at: row.completed_at,
            created_at: Utc::now(),
        };
        self.tables().holds.push(hold.clone());

        self.publish(
            ChangeEnvelope::new(Table::ScheduledHolds, ChangeKind::Insert, Some(hold.shift))
                .with_records([hold.id]),
        );
        Ok(hold)
    }

    async fn insert_activity(&self, row: NewActivity) -> Result<ActivityLogEntry, BackendError> {
        self.check_write(Table::ActivityLog)?;

        let entry = ActivityLogEntry {
            id: ActivityId::new(),
            member_name: row.member_name,
            action: row.action,
            details: row.details,
            shift: row.shift,
            created_at: Utc::now(),
        };
        self.tables().activity.push(entry.clone());
        Ok(entry)
    }
}

#[async_trait]
impl ChangeFeed for InMemoryBackend {
    async fn subscribe(&self, shift: Shift) -> Result<Subscription, BackendError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();

        let fail = {
            let mut faults = self.faults();
            if faults.subscriptions > 0 {
                faults.subscriptions -= 1;
                true
            } else {
                false
            }
        };

        if fail {
            let _ = tx.send(FeedSignal::Status(ChannelStatus::Error));
            debug!(shift = %shift, "[MEMORY] Subscription failed (injected)");
            return Ok(Subscription::new(rx));
        }

        let _ = tx.send(FeedSignal::Status(ChannelStatus::Subscribed));
        self.subscribers().push((shift, tx));
        debug!(shift = %shift, "[MEMORY] Subscribed");
        Ok(Subscription::new(rx))
    }
}
