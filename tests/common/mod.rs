//! Shared fakes for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use operator_manager::controller::{ControlLoop, ControlLoopError};
use operator_manager::coordination::{
    CoordinationStore, InMemoryStore, LeaseLock, LockKey, LockRecord, StoreError, StoreResult, Version, Versioned,
};
use operator_manager::defaults::{Defaults, DefaultsError, DefaultsPopulator};
use operator_manager::leader::{LeaderCallbacks, LeaderElector, LeaderTiming};
use operator_manager::sequencer::SubsystemSequencer;
use operator_manager::status::{CompletionSignal, StatusReporter};

/// Short timings for tests: lease 9s, renew 6s, retry 2s.
pub fn fast_timing() -> LeaderTiming {
    LeaderTiming::from_secs(9, 6, 2).unwrap()
}

pub fn lock_key() -> LockKey {
    LockKey::new("test", "operator-manager-lock")
}

/// Ordered record of what the fakes observed.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }
}

/// Reporter that logs start, cancellation and completion.
pub struct RecordingReporter {
    log: EventLog,
}

impl RecordingReporter {
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }
}

impl StatusReporter for RecordingReporter {
    fn start_reporting(&self, token: CancellationToken) -> CompletionSignal {
        let (notifier, signal) = CompletionSignal::channel();
        let log = self.log.clone();
        log.push("reporter:started");
        tokio::spawn(async move {
            token.cancelled().await;
            log.push("reporter:cancelled");
            // final publish
            tokio::time::sleep(Duration::from_millis(50)).await;
            log.push("reporter:completed");
            notifier.complete();
        });
        signal
    }
}

/// Control loop that runs until cancelled.
pub struct RecordingControlLoop {
    log: EventLog,
    fail_registration: bool,
    pub registrations: AtomicUsize,
}

impl RecordingControlLoop {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            fail_registration: false,
            registrations: AtomicUsize::new(0),
        }
    }

    pub fn failing_registration(log: EventLog) -> Self {
        Self {
            fail_registration: true,
            ..Self::new(log)
        }
    }
}

#[async_trait]
impl ControlLoop for RecordingControlLoop {
    fn register(&self, _defaults: Arc<Defaults>) -> Result<(), ControlLoopError> {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        if self.fail_registration {
            return Err(ControlLoopError::Registration("refused".into()));
        }
        self.log.push("control_loop:registered");
        Ok(())
    }

    async fn start(&self, token: CancellationToken) -> Result<(), ControlLoopError> {
        self.log.push("control_loop:started");
        token.cancelled().await;
        self.log.push("control_loop:returned");
        Ok(())
    }
}

pub struct StaticDefaults;

impl DefaultsPopulator for StaticDefaults {
    fn populate(&self) -> Result<Defaults, DefaultsError> {
        Ok(Defaults::default())
    }
}

pub fn recording_sequencer(log: &EventLog) -> SubsystemSequencer {
    SubsystemSequencer::new(
        Arc::new(RecordingReporter::new(log.clone())),
        Arc::new(StaticDefaults),
        Arc::new(RecordingControlLoop::new(log.clone())),
    )
}

/// One elector's view of a shared store that can be cut off, or made to
/// stop answering altogether.
#[derive(Clone)]
pub struct PartitionableStore {
    inner: InMemoryStore,
    partitioned: Arc<AtomicBool>,
    stalled: Arc<AtomicBool>,
}

impl PartitionableStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            partitioned: Arc::new(AtomicBool::new(false)),
            stalled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn partition(&self) {
        self.partitioned.store(true, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.partitioned.store(false, Ordering::SeqCst);
    }

    /// Every later call hangs forever.
    pub fn stall(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }

    async fn check(&self) -> StoreResult<()> {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.partitioned.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("partitioned".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CoordinationStore for PartitionableStore {
    fn kind(&self) -> &'static str {
        "partitionable"
    }

    async fn get(&self, key: &LockKey) -> StoreResult<Option<Versioned<LockRecord>>> {
        self.check().await?;
        self.inner.get(key).await
    }

    async fn create(&self, key: &LockKey, record: &LockRecord) -> StoreResult<Version> {
        self.check().await?;
        self.inner.create(key, record).await
    }

    async fn update(&self, key: &LockKey, record: &LockRecord, expected: Version) -> StoreResult<Version> {
        self.check().await?;
        self.inner.update(key, record, expected).await
    }
}

/// Leadership accounting shared by every elector in a test.
#[derive(Default)]
pub struct Leadership {
    active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl Leadership {
    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn max(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

/// Counts callbacks. Runs a sequencer per episode when given one,
/// otherwise waits for the episode token.
#[derive(Default)]
pub struct CountingCallbacks {
    pub started: AtomicUsize,
    pub stopped: AtomicUsize,
    pub cancelled_seen: AtomicUsize,
    pub leaders: Mutex<Vec<String>>,
    sequencer: Option<SubsystemSequencer>,
    leadership: Option<Arc<Leadership>>,
    return_at_once: bool,
}

impl CountingCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sequencer(sequencer: SubsystemSequencer) -> Self {
        Self {
            sequencer: Some(sequencer),
            ..Self::default()
        }
    }

    pub fn with_leadership(leadership: Arc<Leadership>) -> Self {
        Self {
            leadership: Some(leadership),
            ..Self::default()
        }
    }

    /// Episode bodies that give leadership up as soon as they get it.
    pub fn returning_at_once() -> Self {
        Self {
            return_at_once: true,
            ..Self::default()
        }
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LeaderCallbacks for CountingCallbacks {
    async fn on_started_leading(&self, token: CancellationToken) {
        self.started.fetch_add(1, Ordering::SeqCst);
        if let Some(leadership) = &self.leadership {
            leadership.enter();
        }

        match &self.sequencer {
            Some(sequencer) => {
                sequencer.run_episode(token.clone()).await.unwrap();
            }
            None if self.return_at_once => {}
            None => token.cancelled().await,
        }
        if token.is_cancelled() {
            self.cancelled_seen.fetch_add(1, Ordering::SeqCst);
        }

        if let Some(leadership) = &self.leadership {
            leadership.leave();
        }
    }

    fn on_stopped_leading(&self) {
        self.stopped.fetch_add(1, Ordering::SeqCst);
    }

    fn on_new_leader(&self, identity: &str) {
        self.leaders.lock().unwrap().push(identity.to_string());
    }
}

/// Build an elector for `identity` over `store` with fast timings.
pub fn elector(
    identity: &str,
    store: Arc<dyn CoordinationStore>,
    callbacks: Arc<CountingCallbacks>,
) -> LeaderElector {
    let timing = fast_timing();
    let lock = LeaseLock::new(store, lock_key(), identity, timing.lease_duration());
    LeaderElector::new(lock, timing, true, callbacks)
}
