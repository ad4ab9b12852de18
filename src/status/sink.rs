//! Destinations for published status documents.

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

use crate::status::types::OperatorStatus;

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("failed to write status to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode status: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Where a reporter publishes each observation.
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn publish(&self, status: &OperatorStatus) -> Result<(), StatusError>;
}

/// Writes `<dir>/<name>.json`, replacing it atomically on every publish.
#[derive(Debug, Clone)]
pub struct FileStatusSink {
    dir: PathBuf,
}

impl FileStatusSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }
}

#[async_trait]
impl StatusSink for FileStatusSink {
    async fn publish(&self, status: &OperatorStatus) -> Result<(), StatusError> {
        let path = self.path_for(&status.name);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(status)?;

        let write = async {
            tokio::fs::create_dir_all(&self.dir).await?;
            tokio::fs::write(&tmp, &body).await?;
            tokio::fs::rename(&tmp, &path).await
        };
        write.await.map_err(|source| StatusError::Write {
            path: path.clone(),
            source,
        })
    }
}
