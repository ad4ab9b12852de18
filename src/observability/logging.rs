//! Structured logging.
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - `--level` sets the default; `RUST_LOG` directives still apply on top

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("not a valid logging level: {0:?}")]
    InvalidLevel(String),

    #[error("failed to install log subscriber: {0}")]
    Init(String),
}

/// Output format of log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Parse a verbosity name. `warning`, `fatal` and `panic` are accepted as
/// aliases so existing deployment manifests keep working.
pub fn parse_level(level: &str) -> Result<LevelFilter, LoggingError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" | "warning" => Ok(LevelFilter::WARN),
        "error" | "fatal" | "panic" => Ok(LevelFilter::ERROR),
        "off" => Ok(LevelFilter::OFF),
        _ => Err(LoggingError::InvalidLevel(level.to_string())),
    }
}

/// Install the global subscriber. Call once, early in `main`.
pub fn init_logging(level: LevelFilter, format: LogFormat) -> Result<(), LoggingError> {
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let json = format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))
}
