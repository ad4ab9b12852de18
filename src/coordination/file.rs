//! Directory-backed coordination store.
//!
//! Each lock record lives in `<root>/<namespace>/<name>.json`. Every
//! operation takes an exclusive `flock` on the sibling `<name>.lock` file, so
//! read-check-write sequences are atomic across processes that share the
//! directory. Writes go to a temporary file which is then renamed into place.

use async_trait::async_trait;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::coordination::record::{LockKey, LockRecord, Version, Versioned};
use crate::coordination::store::{CoordinationStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, key: &LockKey) -> PathBuf {
        self.root.join(&key.namespace).join(format!("{}.json", key.name))
    }

    fn lock_path(&self, key: &LockKey) -> PathBuf {
        self.root.join(&key.namespace).join(format!("{}.lock", key.name))
    }

    /// Run `op` while holding the key's exclusive file lock.
    fn with_lock<T>(
        &self,
        key: &LockKey,
        op: impl FnOnce(&Path) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let record_path = self.record_path(key);
        if let Some(parent) = record_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let guard = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path(key))?;
        guard.lock_exclusive()?;

        let result = op(&record_path);

        // Dropping the handle also releases the lock; unlock explicitly so
        // the error, if any, is observed.
        if let Err(e) = guard.unlock() {
            tracing::warn!(key = %key, error = %e, "Failed to release store file lock");
        }
        result
    }

    /// Read a record synchronously. Used by the lock inspection CLI.
    pub fn read(&self, key: &LockKey) -> StoreResult<Option<Versioned<LockRecord>>> {
        self.with_lock(key, read_record)
    }

    fn create_blocking(&self, key: &LockKey, record: &LockRecord) -> StoreResult<Version> {
        self.with_lock(key, |path| {
            if read_record(path)?.is_some() {
                return Err(StoreError::Conflict {
                    key: key.to_string(),
                });
            }
            let stored = Versioned {
                version: Version::INITIAL,
                value: record.clone(),
            };
            write_record(path, &stored)?;
            Ok(stored.version)
        })
    }

    fn update_blocking(
        &self,
        key: &LockKey,
        record: &LockRecord,
        expected: Version,
    ) -> StoreResult<Version> {
        self.with_lock(key, |path| {
            let current = read_record(path)?.ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })?;
            if current.version != expected {
                return Err(StoreError::Conflict {
                    key: key.to_string(),
                });
            }
            let stored = Versioned {
                version: current.version.next(),
                value: record.clone(),
            };
            write_record(path, &stored)?;
            Ok(stored.version)
        })
    }
}

fn read_record(path: &Path) -> StoreResult<Option<Versioned<LockRecord>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_record(path: &Path, record: &Versioned<LockRecord>) -> StoreResult<()> {
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(&serde_json::to_vec_pretty(record)?)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

async fn blocking<T, F>(op: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> StoreResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| StoreError::Unavailable(format!("store task failed: {}", e)))?
}

#[async_trait]
impl CoordinationStore for FileStore {
    fn kind(&self) -> &'static str {
        "file"
    }

    async fn get(&self, key: &LockKey) -> StoreResult<Option<Versioned<LockRecord>>> {
        let store = self.clone();
        let key = key.clone();
        blocking(move || store.read(&key)).await
    }

    async fn create(&self, key: &LockKey, record: &LockRecord) -> StoreResult<Version> {
        let store = self.clone();
        let key = key.clone();
        let record = record.clone();
        blocking(move || store.create_blocking(&key, &record)).await
    }

    async fn update(
        &self,
        key: &LockKey,
        record: &LockRecord,
        expected: Version,
    ) -> StoreResult<Version> {
        let store = self.clone();
        let key = key.clone();
        let record = record.clone();
        blocking(move || store.update_blocking(&key, &record, expected)).await
    }
}
