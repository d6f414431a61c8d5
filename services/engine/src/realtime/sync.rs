//! Live roster sync for one shift.
//!
//! A background task holds a [`Subscription`] to the shift's change channel.
//! Any broadcast triggers a full reload of the shift (no delta merging).
//! Channel failures go through [`ReconnectState`]: the user is told once per
//! episode, retries back off exponentially, and the task stops for good at
//! the retry ceiling.
//!
//! Teardown is explicit: [`SyncHandle::teardown`] flips the shutdown flag,
//! which cancels a pending retry timer and makes a subsequent `Closed` status
//! count as intentional.

use std::sync::Arc;

use async_trait::async_trait;
use rota_events::{ChannelStatus, Shift};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::backoff::{FailureOutcome, ReconnectPolicy, ReconnectState, RetryDecision, SyncNotice, SyncPhase};
use crate::backend::{ChangeFeed, FeedSignal, Subscription};
use crate::coordinator::MutationCoordinator;
use crate::error::RosterError;
use crate::notify::{NoticeKind, Notifier};

/// Something that can re-read a shift from the remote store.
#[async_trait]
pub trait ReloadTarget: Send + Sync {
    async fn reload(&self, shift: Shift) -> Result<(), RosterError>;
}

#[async_trait]
impl ReloadTarget for MutationCoordinator {
    async fn reload(&self, shift: Shift) -> Result<(), RosterError> {
        self.load(shift).await.map(|_| ())
    }
}

/// How a subscription ended.
enum Ended {
    Shutdown,
    Failed(String),
}

/// Configured live-sync task for one shift. Call [`RealtimeSync::spawn`] to
/// start it.
pub struct RealtimeSync {
    shift: Shift,
    feed: Arc<dyn ChangeFeed>,
    target: Arc<dyn ReloadTarget>,
    notifier: Arc<dyn Notifier>,
    policy: ReconnectPolicy,
}

impl RealtimeSync {
    pub fn new(
        shift: Shift,
        feed: Arc<dyn ChangeFeed>,
        target: Arc<dyn ReloadTarget>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            shift,
            feed,
            target,
            notifier,
            policy: ReconnectPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Open the channel and run until teardown or the retry ceiling.
    pub fn spawn(self) -> SyncHandle {
        let shift = self.shift;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (phase_tx, phase_rx) = watch::channel(SyncPhase::Idle);

        let task = tokio::spawn(self.run(shutdown_rx, phase_tx));

        SyncHandle {
            shift,
            shutdown: shutdown_tx,
            phase: phase_rx,
            task,
        }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>, phase: watch::Sender<SyncPhase>) {
        let mut state = ReconnectState::new(self.policy);
        info!(shift = %self.shift, "Live sync started");

        let stopped = loop {
            if *shutdown.borrow() {
                break true;
            }

            state.on_connecting();
            phase.send_replace(state.phase());

            let subscribed = tokio::select! {
                _ = shutdown.changed() => break true,
                result = self.feed.subscribe(self.shift) => result,
            };

            let reason = match subscribed {
                Ok(mut subscription) => {
                    let ended = self
                        .pump(&mut subscription, &mut state, &phase, &mut shutdown)
                        .await;
                    subscription.unsubscribe();
                    match ended {
                        Ended::Shutdown => break true,
                        Ended::Failed(reason) => reason,
                    }
                }
                Err(e) => e.to_string(),
            };

            let FailureOutcome { notice, decision } = state.on_failure();
            phase.send_replace(state.phase());
            if let Some(notice) = notice {
                self.show(notice);
            }

            match decision {
                RetryDecision::Retry { attempt, delay } => {
                    info!(
                        shift = %self.shift,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        reason = %reason,
                        "Live channel lost; retrying"
                    );
                    tokio::select! {
                        _ = shutdown.changed() => break true,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                RetryDecision::GiveUp => {
                    warn!(
                        shift = %self.shift,
                        reason = %reason,
                        "Live channel retry limit reached; giving up"
                    );
                    break false;
                }
            }
        };

        if stopped {
            state.on_teardown();
            phase.send_replace(state.phase());
            info!(shift = %self.shift, "Live sync stopped");
        }
    }

    /// Drive one subscription until it fails or shutdown is requested.
    async fn pump(
        &self,
        subscription: &mut Subscription,
        state: &mut ReconnectState,
        phase: &watch::Sender<SyncPhase>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Ended {
        loop {
            let signal = tokio::select! {
                _ = shutdown.changed() => return Ended::Shutdown,
                signal = subscription.next() => signal,
            };

            match signal {
                Some(FeedSignal::Status(ChannelStatus::Subscribed)) => {
                    let notice = state.on_subscribed();
                    phase.send_replace(state.phase());
                    info!(shift = %self.shift, "Live channel subscribed");

                    if let Some(notice) = notice {
                        self.show(notice);
                        // Changes made while disconnected were never broadcast to us.
                        self.reload("reconnected").await;
                    }
                }
                Some(FeedSignal::Status(status)) if status.is_failure() => {
                    return Ended::Failed(status.to_string());
                }
                Some(FeedSignal::Status(status)) => {
                    // Closed: ours if teardown was requested, otherwise a failure.
                    if *shutdown.borrow() {
                        return Ended::Shutdown;
                    }
                    return Ended::Failed(format!("{status} without teardown"));
                }
                Some(FeedSignal::Change(change)) => {
                    if change.concerns(self.shift) {
                        debug!(
                            shift = %self.shift,
                            table = %change.table,
                            records = change.record_ids.len(),
                            "Remote change received"
                        );
                        self.reload("remote change").await;
                    }
                }
                None => return Ended::Failed("channel dropped".to_string()),
            }
        }
    }

    async fn reload(&self, reason: &'static str) {
        match self.target.reload(self.shift).await {
            Ok(()) => debug!(shift = %self.shift, reason, "Roster reloaded"),
            Err(e) => warn!(shift = %self.shift, reason, error = %e, "Roster reload failed"),
        }
    }

    fn show(&self, notice: SyncNotice) {
        let kind = match notice {
            SyncNotice::Reconnected => NoticeKind::Success,
            SyncNotice::Unavailable | SyncNotice::Exhausted => NoticeKind::Error,
        };
        self.notifier.notify(notice.message(), kind);
    }
}

/// Handle to a running live-sync task.
///
/// Dropping the handle without calling [`SyncHandle::teardown`] also stops
/// the task, since the shutdown sender goes away.
pub struct SyncHandle {
    shift: Shift,
    shutdown: watch::Sender<bool>,
    phase: watch::Receiver<SyncPhase>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    pub fn shift(&self) -> Shift {
        self.shift
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    /// Receiver for phase transitions.
    pub fn phases(&self) -> watch::Receiver<SyncPhase> {
        self.phase.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop syncing: cancel any pending retry, release the channel, and wait
    /// for the task to exit.
    pub async fn teardown(self) {
        // Fails only when the task already exited.
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(shift = %self.shift, error = %e, "Live sync task failed");
        }
    }
}
