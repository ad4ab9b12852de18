//! Command-line interface of the `operator-manager` binary.
//!
//! Flag names follow the ones existing deployment manifests already pass,
//! hence the mixed camelCase and kebab-case.

use clap::Parser;
use std::path::PathBuf;

use crate::config::{OperatorConfig, TlsConfig};

#[derive(Parser, Debug, Default)]
#[command(name = "operator-manager")]
#[command(about = "Leader-gated lifecycle manager for a singleton operator", long_about = None)]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// Name of the status object to report to. Empty disables reporting.
    #[arg(long = "clusterOperatorName")]
    pub cluster_operator_name: Option<String>,

    /// Directory holding the default definitions.
    #[arg(long = "defaultsDir")]
    pub defaults_dir: Option<PathBuf>,

    /// Print version information and exit.
    #[arg(long)]
    pub version: bool,

    /// Private key for the metrics endpoint (PEM).
    #[arg(long = "tls-key")]
    pub tls_key: Option<String>,

    /// Certificate for the metrics endpoint (PEM).
    #[arg(long = "tls-cert")]
    pub tls_cert: Option<String>,

    /// Namespace the leadership lock lives in.
    #[arg(long = "leader-namespace")]
    pub leader_namespace: Option<String>,

    /// Log verbosity (trace, debug, info, warn, error).
    #[arg(long)]
    pub level: Option<String>,

    /// Optional TOML configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory shared by all replicas for the lock file.
    #[arg(long = "lock-dir")]
    pub lock_dir: Option<PathBuf>,

    /// Directory status documents are written to.
    #[arg(long = "status-dir")]
    pub status_dir: Option<PathBuf>,

    #[arg(long = "health-address")]
    pub health_address: Option<String>,

    #[arg(long = "metrics-address")]
    pub metrics_address: Option<String>,

    /// Leader election identity. Falls back to the host name.
    #[arg(long = "pod-name", env = "POD_NAME", hide = true)]
    pub pod_name: Option<String>,

    /// Version reported in the status document.
    #[arg(long = "release-version", env = "RELEASE_VERSION", hide = true)]
    pub release_version: Option<String>,
}

impl Cli {
    /// Overlay every flag that was given on top of `config`.
    pub fn apply(&self, mut config: OperatorConfig) -> OperatorConfig {
        if let Some(name) = &self.cluster_operator_name {
            config.status.cluster_operator_name = name.clone();
        }
        if let Some(dir) = &self.defaults_dir {
            config.defaults.dir = Some(dir.clone());
        }
        if let Some(namespace) = &self.leader_namespace {
            config.leader_election.namespace = namespace.clone();
        }
        if let Some(level) = &self.level {
            config.observability.log_level = level.clone();
        }
        if let Some(dir) = &self.lock_dir {
            config.store.lock_dir = Some(dir.clone());
        }
        if let Some(dir) = &self.status_dir {
            config.status.dir = dir.clone();
        }
        if let Some(address) = &self.health_address {
            config.observability.health_address = address.clone();
        }
        if let Some(address) = &self.metrics_address {
            config.observability.metrics_address = address.clone();
        }
        if let Some(version) = &self.release_version {
            config.status.release_version = version.clone();
        }
        if self.tls_cert.is_some() || self.tls_key.is_some() {
            // a lone flag is left for validation to reject
            config.observability.tls = Some(TlsConfig {
                cert_path: self.tls_cert.clone().unwrap_or_default(),
                key_path: self.tls_key.clone().unwrap_or_default(),
            });
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_flag_names_parse() {
        let cli = Cli::try_parse_from([
            "operator-manager",
            "--clusterOperatorName",
            "marketplace",
            "--defaultsDir",
            "/defaults",
            "--leader-namespace",
            "openshift-marketplace",
            "--level",
            "debug",
        ])
        .unwrap();

        let config = cli.apply(OperatorConfig::default());
        assert_eq!(config.status.cluster_operator_name, "marketplace");
        assert_eq!(config.defaults.dir, Some(PathBuf::from("/defaults")));
        assert_eq!(config.leader_election.namespace, "openshift-marketplace");
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn test_version_flag_is_ours() {
        let cli = Cli::try_parse_from(["operator-manager", "--version"]).unwrap();
        assert!(cli.version);
    }

    #[test]
    fn test_lone_tls_flag_fails_validation() {
        let cli = Cli::try_parse_from(["operator-manager", "--tls-cert", "/tls/tls.crt"]).unwrap();
        let config = cli.apply(OperatorConfig::default());
        let errors = crate::config::validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "observability.tls"));
    }

    #[test]
    fn test_unset_flags_keep_config() {
        let config = Cli::default().apply(OperatorConfig::default());
        assert_eq!(config, OperatorConfig::default());
    }
}
