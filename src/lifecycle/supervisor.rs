//! Process-level wait group for background tasks.

use std::future::Future;
use tokio::task::JoinSet;

use crate::lifecycle::shutdown::Shutdown;

/// Tracks background tasks bound to the root token.
///
/// A task that fails triggers process shutdown; `wait` blocks until every
/// task has returned.
pub struct TaskSupervisor {
    shutdown: Shutdown,
    tasks: JoinSet<()>,
}

impl TaskSupervisor {
    pub fn new(shutdown: Shutdown) -> Self {
        Self {
            shutdown,
            tasks: JoinSet::new(),
        }
    }

    /// Run `task` until it returns. An `Err` is recorded as fatal.
    pub fn spawn<F, E>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        let shutdown = self.shutdown.clone();
        self.tasks.spawn(async move {
            match task.await {
                Ok(()) => tracing::debug!(task = name, "Supervised task finished"),
                Err(e) => {
                    tracing::error!(task = name, error = %e, "Supervised task failed");
                    shutdown.fail(format!("{name}: {e}"));
                }
            }
        });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every supervised task to return.
    pub async fn wait(mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Supervised task panicked");
                self.shutdown.fail(format!("supervised task panicked: {e}"));
            }
        }
    }
}
