//! Auxiliary HTTP endpoints.
//!
//! # Data Flow
//! ```text
//! health.rs  → GET /healthz  (plain HTTP, always 200)
//! observability/metrics.rs → GET /metrics (HTTP or HTTPS)
//!     → server.rs (TraceLayer, graceful shutdown on the root token)
//! ```

pub mod health;
pub mod server;

pub use server::HttpServer;
