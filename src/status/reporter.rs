//! Status reporters.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::coordination::record::unix_millis;
use crate::status::signal::CompletionSignal;
use crate::status::sink::StatusSink;
use crate::status::types::{conditions_for, OperatorStatus, RelatedObject, ReportPhase};

/// Publishes the operator's aggregate health while it leads.
pub trait StatusReporter: Send + Sync {
    /// Begin reporting until `token` is cancelled. The returned signal
    /// resolves after the final observation has been published.
    fn start_reporting(&self, token: CancellationToken) -> CompletionSignal;
}

/// Reporter used when no status target is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpReporter;

impl StatusReporter for NoOpReporter {
    fn start_reporting(&self, _token: CancellationToken) -> CompletionSignal {
        CompletionSignal::completed()
    }
}

/// Reports to a named status object through a [`StatusSink`].
#[derive(Clone)]
pub struct ClusterStatusReporter {
    name: String,
    version: String,
    reporter: String,
    related_objects: Vec<RelatedObject>,
    interval: Duration,
    sink: Arc<dyn StatusSink>,
}

impl ClusterStatusReporter {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        reporter: impl Into<String>,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            reporter: reporter.into(),
            related_objects: Vec::new(),
            interval: Duration::from_secs(60),
            sink,
        }
    }

    pub fn with_related_objects(mut self, related: Vec<RelatedObject>) -> Self {
        self.related_objects = related;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    fn snapshot(&self, phase: ReportPhase, since_ms: u64) -> OperatorStatus {
        OperatorStatus {
            name: self.name.clone(),
            version: self.version.clone(),
            reporter: self.reporter.clone(),
            phase,
            conditions: conditions_for(phase, since_ms),
            related_objects: self.related_objects.clone(),
            last_update_ms: unix_millis(),
        }
    }

    async fn publish(&self, phase: ReportPhase, since_ms: u64) {
        let status = self.snapshot(phase, since_ms);
        match self.sink.publish(&status).await {
            Ok(()) => tracing::debug!(name = %self.name, ?phase, "Published operator status"),
            Err(e) => tracing::warn!(name = %self.name, ?phase, error = %e, "Failed to publish operator status"),
        }
    }

    async fn run(self, token: CancellationToken) {
        let mut since = unix_millis();
        self.publish(ReportPhase::Starting, since).await;

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut running = false;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    if !running {
                        running = true;
                        since = unix_millis();
                    }
                    self.publish(ReportPhase::Running, since).await;
                }
            }
        }

        self.publish(ReportPhase::Stopped, unix_millis()).await;
        tracing::info!(name = %self.name, "Status reporter stopped");
    }
}

impl StatusReporter for ClusterStatusReporter {
    fn start_reporting(&self, token: CancellationToken) -> CompletionSignal {
        let (notifier, signal) = CompletionSignal::channel();
        let reporter = self.clone();
        tokio::spawn(async move {
            reporter.run(token).await;
            notifier.complete();
        });
        signal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::sink::StatusError;
    use crate::status::types::{ConditionStatus, ConditionType};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        published: Mutex<Vec<OperatorStatus>>,
    }

    #[async_trait]
    impl StatusSink for RecordingSink {
        async fn publish(&self, status: &OperatorStatus) -> Result<(), StatusError> {
            self.published.lock().unwrap().push(status.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_noop_reporter_is_immediately_idle() {
        let mut signal = NoOpReporter.start_reporting(CancellationToken::new());
        assert!(signal.is_complete());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reporter_publishes_final_observation_before_completing() {
        let sink = Arc::new(RecordingSink::default());
        let reporter = ClusterStatusReporter::new("marketplace", "1.0.0", "pod-a", sink.clone())
            .with_interval(Duration::from_secs(10));
        let token = CancellationToken::new();

        let signal = reporter.start_reporting(token.clone());
        tokio::time::sleep(Duration::from_secs(25)).await;
        token.cancel();
        signal.wait().await;

        let published = sink.published.lock().unwrap();
        let phases: Vec<_> = published.iter().map(|s| s.phase).collect();
        assert_eq!(phases.first(), Some(&ReportPhase::Starting));
        assert_eq!(phases.last(), Some(&ReportPhase::Stopped));
        // immediate tick plus ticks at 10s and 20s
        assert_eq!(
            phases.iter().filter(|p| **p == ReportPhase::Running).count(),
            3
        );

        let running = published
            .iter()
            .find(|s| s.phase == ReportPhase::Running)
            .unwrap();
        assert_eq!(
            running.condition(ConditionType::Available).unwrap().status,
            ConditionStatus::True
        );
        assert_eq!(running.reporter, "pod-a");
    }
}
