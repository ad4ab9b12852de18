//! Shutdown coordination for the operator manager.

use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;

/// Coordinator for process shutdown.
///
/// Wraps the root cancellation token every long-running task is bound to,
/// and remembers the first fatal error so `main` can pick the exit code.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
    fatal: Arc<OnceLock<String>>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// The root token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Trigger an orderly shutdown.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Record a fatal error and shut down. Only the first reason is kept.
    pub fn fail(&self, reason: impl Into<String>) {
        let reason = reason.into();
        if self.fatal.set(reason.clone()).is_err() {
            tracing::debug!(reason = %reason, "Additional fatal error after the first");
        }
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn fatal_reason(&self) -> Option<&str> {
        self.fatal.get().map(String::as_str)
    }

    /// Wait for the root token to be cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}
