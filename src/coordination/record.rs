//! Lock record types shared by every store backend.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Monotonic version assigned by the store on every successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(pub u64);

impl Version {
    /// Version of a freshly created record.
    pub const INITIAL: Version = Version(1);

    pub fn next(self) -> Self {
        Version(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Location of a lock record inside the coordination store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockKey {
    pub namespace: String,
    pub name: String,
}

impl LockKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// The shared leadership record.
///
/// An empty `holder_identity` means the lock was explicitly released and may
/// be taken by any candidate without waiting for the lease to run out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Identity of the current leader.
    pub holder_identity: String,

    /// How long the lease stays valid without a renewal.
    pub lease_duration_ms: u64,

    /// Wall-clock time the current holder first acquired the lock.
    pub acquire_time_ms: u64,

    /// Wall-clock time of the last successful renewal.
    pub renew_time_ms: u64,

    /// Number of times ownership changed hands.
    pub leader_transitions: u32,
}

impl LockRecord {
    pub fn lease_duration(&self) -> Duration {
        Duration::from_millis(self.lease_duration_ms)
    }

    pub fn is_held(&self) -> bool {
        !self.holder_identity.is_empty()
    }

    pub fn is_held_by(&self, identity: &str) -> bool {
        self.holder_identity == identity
    }
}

/// A record together with the version the store assigned to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: Version,
    pub value: T,
}

/// Milliseconds since the Unix epoch, for informational timestamps.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
