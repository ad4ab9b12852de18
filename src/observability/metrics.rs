//! Metrics collection and exposition.
//!
//! # Metrics
//! - `operator_leader_is_leader` (gauge): 1 while this identity leads
//! - `operator_leader_transitions_total` (counter): episodes started
//! - `operator_leader_episodes_total` (counter): episodes ended, by outcome
//! - `operator_lease_acquire_attempts_total` (counter): attempts, by result
//! - `operator_lease_renew_failures_total` (counter): renewals that lost
//!
//! Recording is a no-op until [`install_recorder`] has run, so library code
//! and tests can call these freely.

use axum::{extract::State, routing::get, Router};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    metrics::describe_gauge!(
        "operator_leader_is_leader",
        "Whether this process currently holds the leadership lease"
    );
    metrics::describe_counter!(
        "operator_leader_transitions_total",
        "Number of leadership episodes started by this process"
    );
    Ok(handle)
}

/// Router exposing `GET /metrics` in Prometheus text format.
pub fn router(handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/metrics", get(render))
        .with_state(handle)
}

async fn render(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

pub fn record_leader_status(identity: &str, leading: bool) {
    metrics::gauge!("operator_leader_is_leader", "identity" => identity.to_string())
        .set(if leading { 1.0 } else { 0.0 });
}

pub fn record_leader_transition() {
    metrics::counter!("operator_leader_transitions_total").increment(1);
}

pub fn record_episode(outcome: &'static str) {
    metrics::counter!("operator_leader_episodes_total", "outcome" => outcome).increment(1);
}

pub fn record_acquire_attempt(result: &'static str) {
    metrics::counter!("operator_lease_acquire_attempts_total", "result" => result).increment(1);
}

pub fn record_renew_failure() {
    metrics::counter!("operator_lease_renew_failures_total").increment(1);
}
