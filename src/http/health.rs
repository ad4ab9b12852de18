//! Liveness endpoint.
//!
//! `/healthz` answers 200 whether or not this process is leading. A standby
//! replica is healthy; restarting it would not make it leader any sooner.

use axum::{http::StatusCode, routing::get, Router};

pub fn router() -> Router {
    Router::new().route("/healthz", get(healthz))
}

async fn healthz() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}
