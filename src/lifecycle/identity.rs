//! Process identity used as lock owner and log source.

use std::fmt;
use std::process::Command;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity must not be empty")]
    Empty,

    #[error("POD_NAME is unset and the host name could not be determined")]
    Unresolvable,
}

/// Opaque, non-empty name of this process instance. Stable for the process
/// lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    pub fn new(name: impl Into<String>) -> Result<Self, IdentityError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(IdentityError::Empty);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Use the pod name when given, otherwise fall back to the host name.
    pub fn resolve(pod_name: Option<&str>) -> Result<Self, IdentityError> {
        if let Some(name) = pod_name.filter(|n| !n.trim().is_empty()) {
            return Self::new(name);
        }

        let host = detect_hostname().ok_or(IdentityError::Unresolvable)?;
        tracing::warn!(
            identity = %host,
            "POD_NAME not set, falling back to the host name as leader election identity"
        );
        Self::new(host)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn detect_hostname() -> Option<String> {
    let from_proc = std::fs::read_to_string("/proc/sys/kernel/hostname")
        .ok()
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty());
    if from_proc.is_some() {
        return from_proc;
    }

    let output = Command::new("hostname")
        .output()
        .ok()
        .filter(|output| output.status.success())?;

    let hostname = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if hostname.is_empty() {
        None
    } else {
        Some(hostname)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pod_name_wins() {
        let identity = Identity::resolve(Some("marketplace-operator-7d9f")).unwrap();
        assert_eq!(identity.as_str(), "marketplace-operator-7d9f");
    }

    #[test]
    fn test_blank_pod_name_falls_back() {
        // Every Linux host the tests run on has a host name.
        let identity = Identity::resolve(Some("  ")).unwrap();
        assert!(!identity.as_str().is_empty());
    }

    #[test]
    fn test_empty_identity_is_rejected() {
        assert!(matches!(Identity::new(""), Err(IdentityError::Empty)));
    }
}
