//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Enforce the lease timing invariant
//! - Check that addresses parse and paired settings are given together
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: OperatorConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{OperatorConfig, StoreKind};
use crate::leader::LeaderTiming;
use crate::observability::logging::parse_level;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn validate_config(config: &OperatorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let election = &config.leader_election;

    if election.namespace.trim().is_empty() {
        errors.push(ValidationError::new("leader_election.namespace", "must not be empty"));
    }
    if election.lock_name.trim().is_empty() {
        errors.push(ValidationError::new("leader_election.lock_name", "must not be empty"));
    }
    if let Err(e) = LeaderTiming::new(
        election.lease_duration(),
        election.renew_deadline(),
        election.retry_period(),
    ) {
        errors.push(ValidationError::new("leader_election", e.to_string()));
    }

    if config.store.kind == StoreKind::File && config.store.lock_dir.is_none() {
        errors.push(ValidationError::new("store.lock_dir", "required by the file store"));
    }

    if config.status.report_interval_secs == 0 {
        errors.push(ValidationError::new("status.report_interval_secs", "must be greater than zero"));
    }
    if config.controller.resync_secs == 0 {
        errors.push(ValidationError::new("controller.resync_secs", "must be greater than zero"));
    }

    let observability = &config.observability;
    if let Err(e) = parse_level(&observability.log_level) {
        errors.push(ValidationError::new("observability.log_level", e.to_string()));
    }
    if observability.health_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.health_address",
            format!("invalid socket address {:?}", observability.health_address),
        ));
    }
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address {:?}", observability.metrics_address),
        ));
    }
    if let Some(tls) = &observability.tls {
        if tls.cert_path.is_empty() != tls.key_path.is_empty() {
            errors.push(ValidationError::new(
                "observability.tls",
                "cert and key must be given together",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
