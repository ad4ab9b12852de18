//! Subsystem sequencer.
//!
//! # Data Flow
//! ```text
//! on_started_leading(token)
//!     → start status reporter (child token) → CompletionSignal
//!     → populate defaults                    (error: fatal)
//!     → control_loop.register(defaults)      (error: fatal)
//!     → control_loop.start(token)            (blocks for the episode)
//!     → cancel reporter, await its final publish
//! ```
//!
//! # Design Decisions
//! - The reporter is always stopped and awaited before returning, fatal
//!   error or not, so status never outlives the episode that produced it
//! - Control-loop errors end the episode but are not fatal to the process

use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::controller::{ControlLoop, ControlLoopError};
use crate::defaults::{populate_blocking, DefaultsError, DefaultsPopulator};
use crate::status::{CompletionSignal, StatusReporter};

/// Errors that must take the whole process down.
#[derive(Debug, Error)]
pub enum SequencerError {
    #[error("failed to populate defaults: {0}")]
    Defaults(#[from] DefaultsError),

    #[error("failed to register control loop: {0}")]
    Registration(#[source] ControlLoopError),
}

/// How an episode's subsystems came to a stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EpisodeOutcome {
    /// The episode token was cancelled and the control loop returned cleanly.
    Cancelled,
    /// The control loop returned an error.
    ControlLoopFailed(String),
}

/// Starts the episode's subsystems in order and tears them down in reverse.
#[derive(Clone)]
pub struct SubsystemSequencer {
    reporter: Arc<dyn StatusReporter>,
    defaults: Arc<dyn DefaultsPopulator>,
    control_loop: Arc<dyn ControlLoop>,
}

impl SubsystemSequencer {
    pub fn new(
        reporter: Arc<dyn StatusReporter>,
        defaults: Arc<dyn DefaultsPopulator>,
        control_loop: Arc<dyn ControlLoop>,
    ) -> Self {
        Self {
            reporter,
            defaults,
            control_loop,
        }
    }

    /// Run one leadership episode until `token` is cancelled or the control
    /// loop returns.
    pub async fn run_episode(&self, token: CancellationToken) -> Result<EpisodeOutcome, SequencerError> {
        let reporter_token = token.child_token();
        let signal = self.reporter.start_reporting(reporter_token.clone());
        tracing::debug!("Status reporter started");

        let defaults = match populate_blocking(self.defaults.clone()).await {
            Ok(defaults) => Arc::new(defaults),
            Err(e) => {
                stop_reporter(reporter_token, signal).await;
                return Err(e.into());
            }
        };
        tracing::info!(count = defaults.len(), "Populated defaults");
        tracing::debug!(names = ?defaults.names().collect::<Vec<_>>(), "Default definitions");

        if let Err(e) = self.control_loop.register(defaults) {
            stop_reporter(reporter_token, signal).await;
            return Err(SequencerError::Registration(e));
        }

        tracing::info!("Starting control loop");
        let outcome = match self.control_loop.start(token).await {
            Ok(()) => {
                tracing::info!("Control loop stopped");
                EpisodeOutcome::Cancelled
            }
            Err(e) => {
                tracing::error!(error = %e, "Control loop exited with error");
                EpisodeOutcome::ControlLoopFailed(e.to_string())
            }
        };

        stop_reporter(reporter_token, signal).await;
        Ok(outcome)
    }
}

async fn stop_reporter(token: CancellationToken, signal: CompletionSignal) {
    token.cancel();
    signal.wait().await;
    tracing::debug!("Status reporter finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ControllerManager;
    use crate::defaults::Defaults;
    use crate::status::NoOpReporter;

    struct BrokenDefaults;

    impl DefaultsPopulator for BrokenDefaults {
        fn populate(&self) -> Result<Defaults, DefaultsError> {
            Err(DefaultsError::Missing("/nowhere".into()))
        }
    }

    struct EmptyDefaults;

    impl DefaultsPopulator for EmptyDefaults {
        fn populate(&self) -> Result<Defaults, DefaultsError> {
            Ok(Defaults::default())
        }
    }

    #[tokio::test]
    async fn test_defaults_failure_is_fatal() {
        let sequencer = SubsystemSequencer::new(
            Arc::new(NoOpReporter),
            Arc::new(BrokenDefaults),
            Arc::new(ControllerManager::new()),
        );
        let err = sequencer.run_episode(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, SequencerError::Defaults(_)));
    }

    #[tokio::test]
    async fn test_cancelled_episode_returns_cancelled() {
        let sequencer = SubsystemSequencer::new(
            Arc::new(NoOpReporter),
            Arc::new(EmptyDefaults),
            Arc::new(ControllerManager::new()),
        );
        let token = CancellationToken::new();
        token.cancel();
        let outcome = sequencer.run_episode(token).await.unwrap();
        assert_eq!(outcome, EpisodeOutcome::Cancelled);
    }
}
