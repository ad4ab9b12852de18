//! Lease lock: the acquire / renew / release protocol for one identity.

use arc_swap::ArcSwapOption;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::coordination::record::{unix_millis, LockKey, LockRecord, Versioned};
use crate::coordination::store::{CoordinationStore, StoreResult};

/// Lease written on release so the next candidate does not have to wait.
const RELEASED_LEASE: Duration = Duration::from_secs(1);

/// Result of one acquire-or-renew attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquireOutcome {
    /// Whether this identity holds the lock after the attempt.
    pub granted: bool,

    /// The record as last seen in the store, if any.
    pub record: Option<LockRecord>,
}

impl AcquireOutcome {
    fn granted(record: LockRecord) -> Self {
        Self {
            granted: true,
            record: Some(record),
        }
    }

    fn denied(record: Option<LockRecord>) -> Self {
        Self {
            granted: false,
            record,
        }
    }

    /// Holder named by the observed record.
    pub fn holder(&self) -> Option<&str> {
        self.record
            .as_ref()
            .filter(|r| r.is_held())
            .map(|r| r.holder_identity.as_str())
    }
}

/// Local view of the record: what we saw and when we first saw it.
#[derive(Debug)]
struct Observation {
    record: Versioned<LockRecord>,
    observed_at: Instant,
}

/// Client for one named lock record on behalf of one identity.
pub struct LeaseLock {
    store: Arc<dyn CoordinationStore>,
    key: LockKey,
    identity: String,
    lease_duration: Duration,
    observed: ArcSwapOption<Observation>,
}

impl LeaseLock {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        key: LockKey,
        identity: impl Into<String>,
        lease_duration: Duration,
    ) -> Self {
        Self {
            store,
            key,
            identity: identity.into(),
            lease_duration,
            observed: ArcSwapOption::empty(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn key(&self) -> &LockKey {
        &self.key
    }

    pub fn store_kind(&self) -> &'static str {
        self.store.kind()
    }

    /// Take the lock if it is free or expired, or renew it if we hold it.
    ///
    /// A record held by someone else whose lease has not run out, or a lost
    /// conditional write, yields `granted == false`. Store failures are
    /// returned as errors.
    pub async fn try_acquire_or_renew(&self) -> StoreResult<AcquireOutcome> {
        let now_ms = unix_millis();
        let mut desired = LockRecord {
            holder_identity: self.identity.clone(),
            lease_duration_ms: self.lease_duration.as_millis() as u64,
            acquire_time_ms: now_ms,
            renew_time_ms: now_ms,
            leader_transitions: 0,
        };

        let current = match self.store.get(&self.key).await? {
            Some(current) => current,
            None => {
                return match self.store.create(&self.key, &desired).await {
                    Ok(version) => {
                        self.record_observation(Versioned {
                            version,
                            value: desired.clone(),
                        });
                        Ok(AcquireOutcome::granted(desired))
                    }
                    // Another candidate created it first.
                    Err(e) if e.is_conflict() => Ok(AcquireOutcome::denied(None)),
                    Err(e) => Err(e),
                };
            }
        };

        self.observe_if_changed(&current);

        let held_by_other =
            current.value.is_held() && !current.value.is_held_by(&self.identity);
        if held_by_other && !self.observed_lease_expired() {
            return Ok(AcquireOutcome::denied(Some(current.value)));
        }

        if current.value.is_held_by(&self.identity) {
            desired.acquire_time_ms = current.value.acquire_time_ms;
            desired.leader_transitions = current.value.leader_transitions;
        } else {
            desired.leader_transitions = current.value.leader_transitions.saturating_add(1);
        }

        match self.store.update(&self.key, &desired, current.version).await {
            Ok(version) => {
                self.record_observation(Versioned {
                    version,
                    value: desired.clone(),
                });
                Ok(AcquireOutcome::granted(desired))
            }
            Err(e) if e.is_conflict() => Ok(AcquireOutcome::denied(Some(current.value))),
            Err(e) => Err(e),
        }
    }

    /// Give the lock up if this identity still holds it.
    ///
    /// Returns `Ok(false)` when the record is missing, owned by someone
    /// else, or changed underneath us.
    pub async fn release(&self) -> StoreResult<bool> {
        let Some(current) = self.store.get(&self.key).await? else {
            return Ok(false);
        };
        if !current.value.is_held_by(&self.identity) {
            return Ok(false);
        }

        let now_ms = unix_millis();
        let released = LockRecord {
            holder_identity: String::new(),
            lease_duration_ms: RELEASED_LEASE.as_millis() as u64,
            acquire_time_ms: now_ms,
            renew_time_ms: now_ms,
            leader_transitions: current.value.leader_transitions,
        };

        match self.store.update(&self.key, &released, current.version).await {
            Ok(version) => {
                self.record_observation(Versioned {
                    version,
                    value: released,
                });
                Ok(true)
            }
            Err(e) if e.is_conflict() => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn observe_if_changed(&self, current: &Versioned<LockRecord>) {
        let unchanged = self.observed.load_full().is_some_and(|o| {
            o.record.version == current.version && o.record.value == current.value
        });
        if !unchanged {
            self.record_observation(current.clone());
        }
    }

    fn record_observation(&self, record: Versioned<LockRecord>) {
        self.observed.store(Some(Arc::new(Observation {
            record,
            observed_at: Instant::now(),
        })));
    }

    fn observed_lease_expired(&self) -> bool {
        match self.observed.load_full() {
            Some(o) => o.observed_at + o.record.value.lease_duration() <= Instant::now(),
            None => true,
        }
    }
}
