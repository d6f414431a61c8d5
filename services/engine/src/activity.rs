//! Best-effort audit trail.
//!
//! Every committed roster mutation appends an activity entry. The write runs
//! in the background: its outcome never affects the mutation that triggered
//! it, and failures are only logged.

use std::sync::{Arc, Mutex};

use rota_events::{ActivityKind, Shift};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::backend::{NewActivity, RosterBackend};

/// Fire-and-forget writer for the activity log.
pub struct ActivityRecorder {
    backend: Arc<dyn RosterBackend>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl ActivityRecorder {
    pub fn new(backend: Arc<dyn RosterBackend>) -> Self {
        Self {
            backend,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Queue an activity entry. Returns immediately.
    pub fn record(
        &self,
        action: ActivityKind,
        member_name: impl Into<String>,
        details: impl Into<String>,
        shift: Option<Shift>,
    ) {
        let row = NewActivity {
            member_name: member_name.into(),
            action,
            details: details.into(),
            shift,
        };
        let backend = Arc::clone(&self.backend);

        let handle = tokio::spawn(async move {
            match backend.insert_activity(row).await {
                Ok(entry) => debug!(activity_id = %entry.id, action = %entry.action, "Activity recorded"),
                Err(e) => warn!(action = %action, error = %e, "Failed to record activity"),
            }
        });

        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// Wait for every queued write to finish.
    pub async fn flush(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.drain(..).collect()
        };
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Activity write task failed");
            }
        }
    }
}
