//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the operator
//! manager. All types derive Serde traits for deserialization from config
//! files, and every field has a default so an empty file is a valid config.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::observability::logging::LogFormat;
use crate::status::RelatedObject;

/// Root configuration for the operator manager.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct OperatorConfig {
    /// Lease timing and lock location.
    pub leader_election: LeaderElectionConfig,

    /// Coordination store backing the lock record.
    pub store: StoreConfig,

    /// Aggregate status reporting.
    pub status: StatusConfig,

    /// Default definitions handed to the control loop.
    pub defaults: DefaultsConfig,

    /// Control loop settings.
    pub controller: ControllerConfig,

    /// Logging, metrics and health endpoints.
    pub observability: ObservabilityConfig,
}

/// Leader election configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LeaderElectionConfig {
    /// Namespace part of the lock key.
    pub namespace: String,

    /// Name part of the lock key.
    pub lock_name: String,

    pub lease_duration_secs: u64,
    pub renew_deadline_secs: u64,
    pub retry_period_secs: u64,

    /// Write an empty holder when leadership ends on shutdown.
    pub release_on_cancel: bool,

    /// Return to candidate after losing leadership instead of exiting.
    pub rejoin_after_loss: bool,
}

impl Default for LeaderElectionConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            lock_name: "operator-manager-lock".to_string(),
            lease_duration_secs: 90,
            renew_deadline_secs: 60,
            retry_period_secs: 30,
            release_on_cancel: true,
            rejoin_after_loss: false,
        }
    }
}

impl LeaderElectionConfig {
    pub fn lease_duration(&self) -> Duration {
        Duration::from_secs(self.lease_duration_secs)
    }

    pub fn renew_deadline(&self) -> Duration {
        Duration::from_secs(self.renew_deadline_secs)
    }

    pub fn retry_period(&self) -> Duration {
        Duration::from_secs(self.retry_period_secs)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Shared directory of lock files.
    #[default]
    File,
    /// Process-local; only useful for a single replica and tests.
    Memory,
}

/// Coordination store configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,

    /// Lock directory for the file store.
    pub lock_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::File,
            lock_dir: Some(PathBuf::from("/var/run/operator-manager/locks")),
        }
    }
}

/// Status reporting configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StatusConfig {
    /// Name of the status object. Empty disables reporting.
    pub cluster_operator_name: String,

    /// Directory status documents are written to.
    pub dir: PathBuf,

    pub report_interval_secs: u64,

    /// Version reported in the status document.
    pub release_version: String,

    /// Reported alongside the lock namespace.
    pub related_objects: Vec<RelatedObject>,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            cluster_operator_name: String::new(),
            dir: PathBuf::from("/var/run/operator-manager/status"),
            report_interval_secs: 60,
            release_version: String::new(),
            related_objects: Vec::new(),
        }
    }
}

/// Defaults population configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Directory of definitions. Unset means "no defaults".
    pub dir: Option<PathBuf>,
}

/// Control loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ControllerConfig {
    /// How often controllers re-read their inputs.
    pub resync_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self { resync_secs: 300 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Liveness endpoint bind address.
    pub health_address: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Optional TLS for the metrics endpoint.
    pub tls: Option<TlsConfig>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            health_address: "0.0.0.0:8080".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:8081".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the metrics endpoint.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}
