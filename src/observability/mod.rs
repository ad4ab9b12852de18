//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, identity/episode fields)
//!     → metrics.rs (leadership gauges and counters)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → /metrics endpoint (Prometheus scrape, optionally over TLS)
//! ```

pub mod logging;
pub mod metrics;
