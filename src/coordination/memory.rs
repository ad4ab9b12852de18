//! Process-local coordination store.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use crate::coordination::record::{LockKey, LockRecord, Version, Versioned};
use crate::coordination::store::{CoordinationStore, StoreError, StoreResult};

/// A coordination store shared between tasks of one process.
///
/// Cloning is cheap and every clone sees the same records, so several
/// electors in one process (or one test) can contend for the same lock.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    records: Arc<DashMap<LockKey, Versioned<LockRecord>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot of a record, bypassing the async interface.
    pub fn snapshot(&self, key: &LockKey) -> Option<Versioned<LockRecord>> {
        self.records.get(key).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl CoordinationStore for InMemoryStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &LockKey) -> StoreResult<Option<Versioned<LockRecord>>> {
        Ok(self.snapshot(key))
    }

    async fn create(&self, key: &LockKey, record: &LockRecord) -> StoreResult<Version> {
        match self.records.entry(key.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict {
                key: key.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(Versioned {
                    version: Version::INITIAL,
                    value: record.clone(),
                });
                Ok(Version::INITIAL)
            }
        }
    }

    async fn update(
        &self,
        key: &LockKey,
        record: &LockRecord,
        expected: Version,
    ) -> StoreResult<Version> {
        let mut current = self.records.get_mut(key).ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })?;

        if current.version != expected {
            return Err(StoreError::Conflict {
                key: key.to_string(),
            });
        }

        let next = current.version.next();
        *current = Versioned {
            version: next,
            value: record.clone(),
        };
        Ok(next)
    }
}
