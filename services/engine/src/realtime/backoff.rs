//! Reconnect policy and the per-channel connection state machine.
//!
//! Pure state, no I/O: [`ReconnectState`] is fed subscription outcomes and
//! answers with the notice to show and whether (and when) to retry.
//!
//! # Invariants
//!
//! - The retry counter resets to zero on every successful subscribe.
//! - `Unavailable` is reported at most once per failure episode.
//! - `Reconnected` is reported only after an episode that reported
//!   `Unavailable`, and only once.
//! - No retry is scheduled once `max_attempts` retries have been spent.

use std::time::Duration;

/// Exponential reconnect schedule: `min(base * 2^attempt, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub max: Duration,
    /// Retries allowed before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(1000),
            max: Duration::from_millis(30_000),
            max_attempts: 10,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (starting at 0).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}

/// Where a channel is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Connecting,
    Subscribed,
    /// Waiting to retry; `attempt` is the retry about to be made.
    Backoff { attempt: u32 },
    /// Retry ceiling reached. Only a manual restart recovers.
    Exhausted,
    /// Torn down on purpose.
    Stopped,
}

impl SyncPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncPhase::Exhausted | SyncPhase::Stopped)
    }
}

/// User-facing messages about live sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncNotice {
    Reconnected,
    Unavailable,
    Exhausted,
}

impl SyncNotice {
    pub fn message(&self) -> &'static str {
        match self {
            SyncNotice::Reconnected => "Live updates reconnected",
            SyncNotice::Unavailable => "Live updates unavailable. Retrying in the background.",
            SyncNotice::Exhausted => {
                "Live updates stopped after repeated failures. Please refresh manually."
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { attempt: u32, delay: Duration },
    GiveUp,
}

/// Result of reporting a channel failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
    pub notice: Option<SyncNotice>,
    pub decision: RetryDecision,
}

/// Connection bookkeeping for one channel.
#[derive(Debug, Clone)]
pub struct ReconnectState {
    policy: ReconnectPolicy,
    phase: SyncPhase,
    attempt: u32,
    /// Set once `Unavailable` was shown for the current episode.
    unavailable_shown: bool,
}

impl ReconnectState {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            phase: SyncPhase::Idle,
            attempt: 0,
            unavailable_shown: false,
        }
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn on_connecting(&mut self) {
        if !self.phase.is_terminal() {
            self.phase = SyncPhase::Connecting;
        }
    }

    /// The channel is live. Returns `Reconnected` if this ends a failure
    /// episode.
    pub fn on_subscribed(&mut self) -> Option<SyncNotice> {
        if self.phase.is_terminal() {
            return None;
        }
        self.phase = SyncPhase::Subscribed;
        self.attempt = 0;

        if std::mem::take(&mut self.unavailable_shown) {
            Some(SyncNotice::Reconnected)
        } else {
            None
        }
    }

    /// The channel errored, timed out, or closed unexpectedly.
    pub fn on_failure(&mut self) -> FailureOutcome {
        if self.phase.is_terminal() {
            return FailureOutcome {
                notice: None,
                decision: RetryDecision::GiveUp,
            };
        }

        if self.attempt >= self.policy.max_attempts {
            self.phase = SyncPhase::Exhausted;
            return FailureOutcome {
                notice: Some(SyncNotice::Exhausted),
                decision: RetryDecision::GiveUp,
            };
        }

        let notice = if self.unavailable_shown {
            None
        } else {
            self.unavailable_shown = true;
            Some(SyncNotice::Unavailable)
        };

        let attempt = self.attempt;
        self.attempt += 1;
        self.phase = SyncPhase::Backoff { attempt };

        FailureOutcome {
            notice,
            decision: RetryDecision::Retry {
                attempt,
                delay: self.policy.delay(attempt),
            },
        }
    }

    /// Intentional teardown. Later failures are ignored.
    pub fn on_teardown(&mut self) {
        self.phase = SyncPhase::Stopped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delays(state: &mut ReconnectState, n: usize) -> Vec<u128> {
        (0..n)
            .map(|_| match state.on_failure().decision {
                RetryDecision::Retry { delay, .. } => delay.as_millis(),
                RetryDecision::GiveUp => 0,
            })
            .collect()
    }

    #[test]
    fn test_delay_schedule() {
        let policy = ReconnectPolicy::default();
        let schedule: Vec<u128> = (0..8).map(|a| policy.delay(a).as_millis()).collect();
        assert_eq!(
            schedule,
            [1000, 2000, 4000, 8000, 16000, 30000, 30000, 30000]
        );
    }

    #[test]
    fn test_delay_does_not_overflow() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay(31), Duration::from_secs(30));
        assert_eq!(policy.delay(64), Duration::from_secs(30));
    }

    #[test]
    fn test_gives_up_after_ceiling() {
        let mut state = ReconnectState::new(ReconnectPolicy {
            max_attempts: 3,
            ..ReconnectPolicy::default()
        });

        assert_eq!(delays(&mut state, 3), [1000, 2000, 4000]);

        let outcome = state.on_failure();
        assert_eq!(outcome.decision, RetryDecision::GiveUp);
        assert_eq!(outcome.notice, Some(SyncNotice::Exhausted));
        assert_eq!(state.phase(), SyncPhase::Exhausted);

        // Terminal: nothing further is reported.
        assert_eq!(state.on_failure().notice, None);
        assert_eq!(state.on_subscribed(), None);
    }

    #[test]
    fn test_unavailable_latches_per_episode() {
        let mut state = ReconnectState::new(ReconnectPolicy::default());
        state.on_connecting();
        assert_eq!(state.on_subscribed(), None);

        assert_eq!(state.on_failure().notice, Some(SyncNotice::Unavailable));
        assert_eq!(state.on_failure().notice, None);
        assert_eq!(state.on_failure().notice, None);

        assert_eq!(state.on_subscribed(), Some(SyncNotice::Reconnected));
        assert_eq!(state.attempt(), 0);
        assert_eq!(state.on_subscribed(), None);

        // A new episode notifies again and restarts the schedule.
        let outcome = state.on_failure();
        assert_eq!(outcome.notice, Some(SyncNotice::Unavailable));
        assert_eq!(
            outcome.decision,
            RetryDecision::Retry {
                attempt: 0,
                delay: Duration::from_millis(1000)
            }
        );
    }

    #[test]
    fn test_teardown_suppresses_failures() {
        let mut state = ReconnectState::new(ReconnectPolicy::default());
        state.on_subscribed();
        state.on_teardown();

        let outcome = state.on_failure();
        assert_eq!(outcome.notice, None);
        assert_eq!(outcome.decision, RetryDecision::GiveUp);
        assert_eq!(state.phase(), SyncPhase::Stopped);
    }
}
