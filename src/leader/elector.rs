//! Leader election loop.
//!
//! Drives a [`LeaseLock`] through the [`LeaderStateMachine`] and executes the
//! effects it asks for: spawning and tearing down episodes, releasing the
//! lock and firing callbacks.

use arc_swap::ArcSwapOption;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::coordination::{AcquireOutcome, LeaseLock};
use crate::leader::callbacks::LeaderCallbacks;
use crate::leader::state::{Effect, InvalidTransition, LeaderEvent, LeaderState, LeaderStateMachine};
use crate::leader::timing::LeaderTiming;
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum ElectionError {
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

/// Shared, read-only view of the elector's progress.
#[derive(Debug, Default)]
pub struct LeaderStatus {
    leading: AtomicBool,
    episodes: AtomicU64,
    holder: ArcSwapOption<String>,
}

impl LeaderStatus {
    pub fn is_leading(&self) -> bool {
        self.leading.load(Ordering::SeqCst)
    }

    /// Number of episodes started so far.
    pub fn episodes(&self) -> u64 {
        self.episodes.load(Ordering::SeqCst)
    }

    /// Last lock holder observed in the store.
    pub fn holder(&self) -> Option<String> {
        self.holder.load_full().map(|h| h.as_ref().clone())
    }
}

/// One leadership episode in flight.
struct Episode {
    id: Uuid,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Episode {
    /// Cancel the episode and wait for its body to return.
    async fn stop(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::error!(episode = %self.id, error = %e, "Leadership episode panicked");
            }
        }
    }
}

enum LeadingOutcome {
    Renewed(Instant),
    Lost,
    Cancelled,
    Finished(Result<(), tokio::task::JoinError>),
}

pub struct LeaderElector {
    lock: LeaseLock,
    timing: LeaderTiming,
    callbacks: Arc<dyn LeaderCallbacks>,
    machine: LeaderStateMachine,
    status: Arc<LeaderStatus>,
    /// Start of the last write that won or renewed the lease.
    last_renewal: Instant,
    /// Wait one retry period before the next acquisition attempt.
    backoff: bool,
}

impl LeaderElector {
    pub fn new(
        lock: LeaseLock,
        timing: LeaderTiming,
        release_on_cancel: bool,
        callbacks: Arc<dyn LeaderCallbacks>,
    ) -> Self {
        Self {
            lock,
            timing,
            callbacks,
            machine: LeaderStateMachine::new(release_on_cancel),
            status: Arc::new(LeaderStatus::default()),
            last_renewal: Instant::now(),
            backoff: false,
        }
    }

    pub fn status(&self) -> Arc<LeaderStatus> {
        self.status.clone()
    }

    pub fn identity(&self) -> &str {
        self.lock.identity()
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// Any episode in flight is cancelled and awaited before this returns.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<(), ElectionError> {
        tracing::info!(
            identity = %self.identity(),
            lock = %self.lock.key(),
            store = self.lock.store_kind(),
            lease_duration = ?self.timing.lease_duration(),
            renew_deadline = ?self.timing.renew_deadline(),
            retry_period = ?self.timing.retry_period(),
            "Starting leader election"
        );

        let mut episode: Option<Episode> = None;

        loop {
            let event = match self.machine.state() {
                LeaderState::Candidate => self.acquire(&shutdown).await,
                LeaderState::Leading => match episode.as_mut() {
                    Some(ep) => self.lead(ep, &shutdown).await,
                    None => LeaderEvent::EpisodeFinished,
                },
                LeaderState::Lost | LeaderState::Released => LeaderEvent::StoppedNotified,
                LeaderState::Stopped => break,
            };

            let effects = match self.machine.handle(event) {
                Ok(effects) => effects,
                Err(e) => {
                    if let Some(ep) = episode.take() {
                        ep.stop().await;
                    }
                    return Err(e.into());
                }
            };

            for effect in effects {
                match effect {
                    Effect::StartEpisode => episode = Some(self.start_episode(&shutdown)),
                    Effect::CancelEpisode => {
                        if let Some(ep) = episode.take() {
                            ep.stop().await;
                        }
                    }
                    Effect::ReleaseLock => self.release().await,
                    Effect::NotifyStopped => self.notify_stopped(event),
                    Effect::Exit => {
                        tracing::info!(identity = %self.identity(), "Leader election stopped");
                    }
                }
            }
        }

        Ok(())
    }

    /// Poll for the lease until granted or cancelled.
    ///
    /// Every store call is raced against `shutdown` and bounded by the renew
    /// deadline, so a hung store cannot keep the process from exiting.
    async fn acquire(&mut self, shutdown: &CancellationToken) -> LeaderEvent {
        if std::mem::take(&mut self.backoff) {
            let delay = self.timing.jittered_retry();
            tracing::debug!(identity = %self.identity(), ?delay, "Waiting before competing for the lease again");
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return LeaderEvent::Cancelled,
                _ = sleep(delay) => {}
            }
        }

        loop {
            if shutdown.is_cancelled() {
                return LeaderEvent::Cancelled;
            }

            let attempt_started = Instant::now();
            let attempt = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return LeaderEvent::Cancelled,
                attempt = timeout(self.timing.renew_deadline(), self.lock.try_acquire_or_renew()) => attempt,
            };
            match attempt {
                Ok(Ok(outcome)) => {
                    self.observe(&outcome);
                    if outcome.granted {
                        metrics::record_acquire_attempt("granted");
                        self.last_renewal = attempt_started;
                        tracing::info!(identity = %self.identity(), "Successfully acquired lease");
                        return LeaderEvent::Acquired;
                    }
                    metrics::record_acquire_attempt("held");
                    tracing::debug!(
                        identity = %self.identity(),
                        holder = outcome.holder().unwrap_or("<none>"),
                        "Lease is held by another candidate"
                    );
                }
                Ok(Err(e)) => {
                    metrics::record_acquire_attempt(e.reason());
                    tracing::warn!(
                        identity = %self.identity(),
                        error = %e,
                        "Failed to acquire lease"
                    );
                }
                Err(_) => {
                    metrics::record_acquire_attempt("timeout");
                    tracing::warn!(
                        identity = %self.identity(),
                        timeout = ?self.timing.renew_deadline(),
                        "Lease acquisition attempt timed out"
                    );
                }
            }

            let delay = self.timing.jittered_retry();
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return LeaderEvent::Cancelled,
                _ = sleep(delay) => {}
            }
        }
    }

    /// Run one renewal cycle, racing it against cancellation and the
    /// episode body returning.
    async fn lead(&mut self, episode: &mut Episode, shutdown: &CancellationToken) -> LeaderEvent {
        let Some(handle) = episode.handle.as_mut() else {
            return LeaderEvent::EpisodeFinished;
        };

        let outcome = tokio::select! {
            biased;
            _ = shutdown.cancelled() => LeadingOutcome::Cancelled,
            result = handle => LeadingOutcome::Finished(result),
            renewed = self.renew_cycle() => match renewed {
                Some(started) => LeadingOutcome::Renewed(started),
                None => LeadingOutcome::Lost,
            },
        };

        match outcome {
            LeadingOutcome::Renewed(started) => {
                self.last_renewal = started;
                LeaderEvent::Renewed
            }
            LeadingOutcome::Lost => LeaderEvent::RenewFailed,
            LeadingOutcome::Cancelled => {
                tracing::info!(identity = %self.identity(), "Shutdown requested while leading");
                LeaderEvent::Cancelled
            }
            LeadingOutcome::Finished(result) => {
                episode.handle = None;
                if let Err(e) = result {
                    tracing::error!(episode = %episode.id, error = %e, "Leadership episode panicked");
                }
                tracing::info!(
                    identity = %self.identity(),
                    "Leadership episode returned, relinquishing leadership"
                );
                LeaderEvent::EpisodeFinished
            }
        }
    }

    /// Wait one retry period, then renew. Returns the start of the write
    /// that landed, or `None` once the renewal misses its deadline or
    /// another holder shows up.
    ///
    /// The deadline is measured from the start of the last successful write,
    /// so leader-only work stops before observers consider the lease expired.
    async fn renew_cycle(&self) -> Option<Instant> {
        let deadline = self.last_renewal + self.timing.renew_deadline();
        sleep(self.timing.retry_period()).await;

        match timeout_at(deadline, self.renew()).await {
            Ok(renewed) => renewed,
            Err(_) => {
                metrics::record_renew_failure();
                tracing::warn!(
                    identity = %self.identity(),
                    deadline = ?self.timing.renew_deadline(),
                    "Failed to renew lease before the renew deadline"
                );
                None
            }
        }
    }

    /// Retry renewal until it lands. `None` means someone else holds the lock.
    async fn renew(&self) -> Option<Instant> {
        loop {
            let started = Instant::now();
            match self.lock.try_acquire_or_renew().await {
                Ok(outcome) => {
                    self.observe(&outcome);
                    if outcome.granted {
                        return Some(started);
                    }
                    metrics::record_renew_failure();
                    tracing::warn!(
                        identity = %self.identity(),
                        holder = outcome.holder().unwrap_or("<none>"),
                        "Lease was taken over by another holder"
                    );
                    return None;
                }
                Err(e) => {
                    tracing::warn!(identity = %self.identity(), error = %e, "Failed to renew lease, retrying");
                }
            }
            sleep(self.timing.retry_period()).await;
        }
    }

    fn start_episode(&self, shutdown: &CancellationToken) -> Episode {
        let id = Uuid::new_v4();
        let token = shutdown.child_token();

        self.status.leading.store(true, Ordering::SeqCst);
        let count = self.status.episodes.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::record_leader_status(self.identity(), true);
        metrics::record_leader_transition();

        tracing::info!(identity = %self.identity(), episode = %id, count, "Started leading");

        let callbacks = self.callbacks.clone();
        let episode_token = token.clone();
        let span = tracing::info_span!("episode", episode = %id, identity = %self.identity());
        let handle = tokio::spawn(
            async move { callbacks.on_started_leading(episode_token).await }.instrument(span),
        );

        Episode {
            id,
            token,
            handle: Some(handle),
        }
    }

    /// Best effort, bounded by one retry period.
    async fn release(&self) {
        match timeout(self.timing.retry_period(), self.lock.release()).await {
            Ok(Ok(true)) => tracing::info!(identity = %self.identity(), "Released lease"),
            Ok(Ok(false)) => tracing::debug!(identity = %self.identity(), "Lease no longer ours, nothing to release"),
            Ok(Err(e)) => tracing::warn!(identity = %self.identity(), error = %e, "Failed to release lease"),
            Err(_) => tracing::warn!(identity = %self.identity(), "Timed out releasing lease"),
        }
    }

    fn notify_stopped(&mut self, cause: LeaderEvent) {
        // an episode that ended on its own must not turn into a hot retry loop
        self.backoff = cause != LeaderEvent::Cancelled;
        self.status.leading.store(false, Ordering::SeqCst);
        metrics::record_leader_status(self.identity(), false);
        metrics::record_episode(match cause {
            LeaderEvent::RenewFailed => "lost",
            LeaderEvent::Cancelled => "cancelled",
            _ => "finished",
        });
        self.callbacks.on_stopped_leading();
    }

    fn observe(&self, outcome: &AcquireOutcome) {
        let Some(holder) = outcome.holder() else {
            return;
        };
        let changed = self
            .status
            .holder
            .load_full()
            .map_or(true, |previous| previous.as_str() != holder);
        if changed {
            self.status.holder.store(Some(Arc::new(holder.to_string())));
            self.callbacks.on_new_leader(holder);
        }
    }
}
