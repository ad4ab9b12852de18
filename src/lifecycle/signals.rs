//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT)
//! - Cancel the root token on the first one
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A second signal is left to the default handler once the
//!   listener has returned

use tokio::signal::unix::{signal, SignalKind};

use crate::lifecycle::shutdown::Shutdown;

/// Wait for SIGTERM or SIGINT, then trigger shutdown.
///
/// Returns early without triggering if `shutdown` fires first.
pub async fn listen(shutdown: Shutdown) -> Result<(), std::io::Error> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => tracing::info!(signal = "SIGTERM", "Shutdown signal received"),
        _ = sigint.recv() => tracing::info!(signal = "SIGINT", "Shutdown signal received"),
        _ = shutdown.cancelled() => return Ok(()),
    }

    shutdown.trigger();
    Ok(())
}
