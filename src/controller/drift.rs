//! Watches the defaults source for changes made while leading.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::controller::manager::{ControlLoopError, Controller};
use crate::defaults::{populate_blocking, Defaults, DefaultsPopulator};

/// Re-reads the defaults every resync interval and warns when they no longer
/// match what the episode was registered with. A restart of the episode is
/// needed to pick the new definitions up.
pub struct DefaultsDriftController {
    applied: Arc<Defaults>,
    source: Arc<dyn DefaultsPopulator>,
    resync: Duration,
}

impl DefaultsDriftController {
    pub fn new(applied: Arc<Defaults>, source: Arc<dyn DefaultsPopulator>, resync: Duration) -> Self {
        Self {
            applied,
            source,
            resync,
        }
    }

    /// Names that differ from the applied defaults, or `None` if the source
    /// could not be read this round.
    async fn check(&self) -> Option<Vec<String>> {
        match populate_blocking(self.source.clone()).await {
            Ok(current) => Some(self.applied.diff(&current)),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to re-read defaults");
                None
            }
        }
    }
}

#[async_trait]
impl Controller for DefaultsDriftController {
    fn name(&self) -> &str {
        "defaults-drift"
    }

    async fn run(&self, token: CancellationToken) -> Result<(), ControlLoopError> {
        let mut ticker = interval(self.resync);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick is immediate and would only compare against itself
        ticker.tick().await;

        let mut reported: Vec<String> = Vec::new();
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(drifted) = self.check().await else { continue };
                    if drifted != reported {
                        if drifted.is_empty() {
                            tracing::info!("Defaults back in sync");
                        } else {
                            tracing::warn!(
                                changed = ?drifted,
                                "Defaults changed since this episode started"
                            );
                        }
                        reported = drifted;
                    }
                }
            }
        }

        Ok(())
    }
}
