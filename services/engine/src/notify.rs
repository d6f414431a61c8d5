//! User-facing notifications.
//!
//! The engine reports outcomes through a [`Notifier`]: fire-and-forget, no
//! result consumed. [`DedupNotifier`] wraps any notifier and drops a message
//! whose exact text was shown within the debounce window, so a flapping
//! channel cannot flood the user with identical toasts.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default window for suppressing repeated messages.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(10);

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
    Info,
}

/// Sink for short-lived user messages.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, kind: NoticeKind);
}

/// Writes notifications to the log. Used by the headless binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str, kind: NoticeKind) {
        match kind {
            NoticeKind::Error => warn!(notice = %message, "Notification"),
            NoticeKind::Success | NoticeKind::Info => {
                info!(notice = %message, kind = ?kind, "Notification")
            }
        }
    }
}

/// Suppresses identical message text repeated within `window`.
pub struct DedupNotifier<N> {
    inner: N,
    window: Duration,
    last_shown: Mutex<HashMap<String, Instant>>,
}

impl<N: Notifier> DedupNotifier<N> {
    pub fn new(inner: N) -> Self {
        Self::with_window(inner, DEFAULT_DEBOUNCE)
    }

    pub fn with_window(inner: N, window: Duration) -> Self {
        Self {
            inner,
            window,
            last_shown: Mutex::new(HashMap::new()),
        }
    }
}

impl<N: Notifier> Notifier for DedupNotifier<N> {
    fn notify(&self, message: &str, kind: NoticeKind) {
        let now = Instant::now();
        {
            let mut last_shown = self.last_shown.lock().unwrap_or_else(|e| e.into_inner());
            last_shown.retain(|_, shown| now.duration_since(*shown) < self.window);

            if last_shown.contains_key(message) {
                debug!(notice = %message, "Suppressed duplicate notification");
                return;
            }
            last_shown.insert(message.to_string(), now);
        }
        self.inner.notify(message, kind);
    }
}
