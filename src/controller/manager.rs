//! Controller manager: the control loop run while leading.

use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::defaults::Defaults;

#[derive(Debug, Error)]
pub enum ControlLoopError {
    #[error("controller {name} failed: {message}")]
    Controller { name: String, message: String },

    #[error("failed to register controllers: {0}")]
    Registration(String),

    #[error("controller task panicked: {0}")]
    Panicked(String),
}

/// The reconciliation engine, seen from the sequencer.
#[async_trait]
pub trait ControlLoop: Send + Sync {
    /// Build the controllers for this episode from the populated defaults.
    fn register(&self, defaults: Arc<Defaults>) -> Result<(), ControlLoopError>;

    /// Run until `token` is cancelled or a controller fails.
    async fn start(&self, token: CancellationToken) -> Result<(), ControlLoopError>;
}

/// A single reconciler managed by [`ControllerManager`].
#[async_trait]
pub trait Controller: Send + Sync {
    fn name(&self) -> &str;

    /// Run until `token` is cancelled. Returning `Ok` early is allowed.
    async fn run(&self, token: CancellationToken) -> Result<(), ControlLoopError>;
}

type ControllerFactory =
    Box<dyn Fn(Arc<Defaults>) -> Result<Arc<dyn Controller>, ControlLoopError> + Send + Sync>;

/// Runs every registered controller on its own task.
pub struct ControllerManager {
    factories: Vec<ControllerFactory>,
    registered: ArcSwap<Vec<Arc<dyn Controller>>>,
}

impl ControllerManager {
    pub fn new() -> Self {
        Self {
            factories: Vec::new(),
            registered: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Add a controller factory. Factories run on every `register`, so each
    /// episode gets fresh controllers built from that episode's defaults.
    pub fn with_controller<F>(mut self, factory: F) -> Self
    where
        F: Fn(Arc<Defaults>) -> Result<Arc<dyn Controller>, ControlLoopError> + Send + Sync + 'static,
    {
        self.factories.push(Box::new(factory));
        self
    }

    /// Names of the controllers built by the last `register`.
    pub fn registered(&self) -> Vec<String> {
        self.registered
            .load()
            .iter()
            .map(|c| c.name().to_string())
            .collect()
    }
}

impl Default for ControllerManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ControlLoop for ControllerManager {
    fn register(&self, defaults: Arc<Defaults>) -> Result<(), ControlLoopError> {
        let controllers = self
            .factories
            .iter()
            .map(|factory| factory(defaults.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            controllers = controllers.len(),
            defaults = defaults.len(),
            "Registered controllers"
        );
        self.registered.store(Arc::new(controllers));
        Ok(())
    }

    async fn start(&self, token: CancellationToken) -> Result<(), ControlLoopError> {
        let controllers = self.registered.load_full();
        let group = token.child_token();
        let mut tasks = JoinSet::new();

        for controller in controllers.iter().cloned() {
            let child = group.clone();
            tasks.spawn(async move {
                tracing::debug!(controller = controller.name(), "Starting controller");
                controller.run(child).await
            });
        }

        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            let result = joined.map_err(|e| ControlLoopError::Panicked(e.to_string())).and_then(|r| r);
            if let Err(e) = result {
                if failure.is_none() {
                    tracing::error!(error = %e, "Controller failed, stopping the rest");
                    group.cancel();
                    failure = Some(e);
                }
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }

        // Controllers that return early leave the manager waiting for the episode to end.
        token.cancelled().await;
        tracing::info!("Controller manager stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Sleeper {
        stopped: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Controller for Sleeper {
        fn name(&self) -> &str {
            "sleeper"
        }

        async fn run(&self, token: CancellationToken) -> Result<(), ControlLoopError> {
            token.cancelled().await;
            self.stopped.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl Controller for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn run(&self, _token: CancellationToken) -> Result<(), ControlLoopError> {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err(ControlLoopError::Controller {
                name: "failing".into(),
                message: "boom".into(),
            })
        }
    }

    fn sleeper_manager(stopped: Arc<AtomicUsize>) -> ControllerManager {
        ControllerManager::new().with_controller(move |_| {
            Ok(Arc::new(Sleeper {
                stopped: stopped.clone(),
            }) as Arc<dyn Controller>)
        })
    }

    #[tokio::test]
    async fn test_register_builds_controllers() {
        let manager = sleeper_manager(Arc::new(AtomicUsize::new(0)));
        assert!(manager.registered().is_empty());
        manager.register(Arc::new(Defaults::default())).unwrap();
        assert_eq!(manager.registered(), vec!["sleeper"]);
    }

    #[tokio::test]
    async fn test_factory_error_fails_registration() {
        let manager = ControllerManager::new()
            .with_controller(|_| Err(ControlLoopError::Registration("bad defaults".into())));
        let err = manager.register(Arc::new(Defaults::default())).unwrap_err();
        assert!(matches!(err, ControlLoopError::Registration(_)));
    }

    #[tokio::test]
    async fn test_start_returns_ok_on_cancel() {
        let stopped = Arc::new(AtomicUsize::new(0));
        let manager = Arc::new(sleeper_manager(stopped.clone()));
        manager.register(Arc::new(Defaults::default())).unwrap();

        let token = CancellationToken::new();
        let running = tokio::spawn({
            let manager = manager.clone();
            let token = token.clone();
            async move { manager.start(token).await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
        running.await.unwrap().unwrap();
        assert_eq!(stopped.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_cancels_siblings() {
        let stopped = Arc::new(AtomicUsize::new(0));
        let manager = sleeper_manager(stopped.clone())
            .with_controller(|_| Ok(Arc::new(Failing) as Arc<dyn Controller>));
        manager.register(Arc::new(Defaults::default())).unwrap();

        let token = CancellationToken::new();
        let err = manager.start(token.clone()).await.unwrap_err();

        assert!(matches!(err, ControlLoopError::Controller { .. }));
        assert_eq!(stopped.load(Ordering::SeqCst), 1);
        // only the manager's child group is cancelled, not the episode
        assert!(!token.is_cancelled());
    }
}
