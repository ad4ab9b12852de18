//! Coordination store abstraction.

use async_trait::async_trait;
use thiserror::Error;

use crate::coordination::record::{LockKey, LockRecord, Version, Versioned};

/// Errors returned by coordination store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The conditional write lost: the record exists, or its version moved.
    #[error("conflicting write on {key}")]
    Conflict { key: String },

    /// Update targeted a record that does not exist.
    #[error("lock record {key} not found")]
    NotFound { key: String },

    /// The store could not be reached or did not answer in time.
    #[error("coordination store unavailable: {0}")]
    Unavailable(String),

    /// Local I/O failure in a file-backed store.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored record could not be decoded.
    #[error("corrupt lock record: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    /// Stable label used for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            StoreError::Conflict { .. } => "conflict",
            StoreError::NotFound { .. } => "not_found",
            StoreError::Unavailable(_) => "unavailable",
            StoreError::Io(_) => "io",
            StoreError::Corrupt(_) => "corrupt",
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Versioned key/record storage with conditional writes.
///
/// Implementations MUST make `create` fail with [`StoreError::Conflict`] when
/// the key exists and `update` fail with [`StoreError::Conflict`] when the
/// stored version differs from `expected`. Two processes can only both
/// believe they hold leadership if one of these guarantees is broken.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Stable backend label for logs.
    fn kind(&self) -> &'static str;

    async fn get(&self, key: &LockKey) -> StoreResult<Option<Versioned<LockRecord>>>;

    async fn create(&self, key: &LockKey, record: &LockRecord) -> StoreResult<Version>;

    async fn update(
        &self,
        key: &LockKey,
        record: &LockRecord,
        expected: Version,
    ) -> StoreResult<Version>;
}
