//! Lifecycle callbacks fired by the elector.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Hooks invoked as leadership is gained and lost.
///
/// Episodes are serialized: `on_stopped_leading` for an episode only runs
/// after that episode's `on_started_leading` future has completed.
#[async_trait]
pub trait LeaderCallbacks: Send + Sync + 'static {
    /// Runs for the whole leadership episode. `token` is cancelled when
    /// leadership is lost or the process shuts down; the future should
    /// return promptly afterwards.
    async fn on_started_leading(&self, token: CancellationToken);

    /// Runs once at the end of every episode. Must not block.
    fn on_stopped_leading(&self);

    /// Runs whenever the observed lock holder changes, including to
    /// ourselves. Observability only.
    fn on_new_leader(&self, identity: &str);
}
