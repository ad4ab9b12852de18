//! Operator Manager
//!
//! Runs a singleton operator as exactly one active replica. Every replica
//! competes for a lease in a shared coordination store; the holder starts
//! the operator's subsystems and stops them again when the lease is lost or
//! the process is asked to shut down.
//!
//! # Architecture Overview
//!
//! ```text
//!   main.rs ── cli + config ──▶ lifecycle::startup
//!                                   │
//!          ┌────────────────────────┼──────────────────────────┐
//!          ▼                        ▼                          ▼
//!   TaskSupervisor          leader::LeaderElector       coordination::LeaseLock
//!   (signals, /healthz,        │  state machine            (CAS on a lock record
//!    /metrics)                 │                            in a FileStore)
//!                              ▼
//!                      sequencer::SubsystemSequencer
//!                      status reporter → defaults → control loop
//! ```

use clap::Parser;
use std::process::ExitCode;

use operator_manager::cli::Cli;
use operator_manager::config::{self, OperatorConfig};
use operator_manager::lifecycle::{self, Identity, Shutdown};
use operator_manager::observability::logging;
use operator_manager::version::build_info;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.version {
        println!("{}", build_info());
        return ExitCode::SUCCESS;
    }

    let base = match &cli.config {
        Some(path) => match config::read_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("failed to load {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => OperatorConfig::default(),
    };
    let config = cli.apply(base);

    let level = match logging::parse_level(&config.observability.log_level) {
        Ok(level) => level,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = logging::init_logging(level, config.observability.log_format) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    let info = build_info();
    tracing::info!(
        version = info.version,
        commit = info.commit.unwrap_or("unknown"),
        os = info.os,
        arch = info.arch,
        "operator-manager starting"
    );

    let config = match config::validate(config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let identity = match Identity::resolve(cli.pod_name.as_deref()) {
        Ok(identity) => identity,
        Err(e) => {
            tracing::error!(error = %e, "Failed to determine identity");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        identity = %identity,
        namespace = %config.leader_election.namespace,
        lock = %config.leader_election.lock_name,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    match lifecycle::run(config, identity, shutdown).await {
        Ok(summary) => {
            if let Some(reason) = &summary.fatal {
                tracing::error!(reason = %reason, episodes = summary.episodes, "Exiting after fatal error");
            } else {
                tracing::info!(episodes = summary.episodes, "Shutdown complete");
            }
            ExitCode::from(summary.exit_code())
        }
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            ExitCode::FAILURE
        }
    }
}
