//! Build version information.

use std::fmt;

/// Version of this build, with the git commit when the build provided one.
#[derive(Debug, Clone, Copy)]
pub struct BuildInfo {
    pub version: &'static str,
    pub commit: Option<&'static str>,
    pub os: &'static str,
    pub arch: &'static str,
}

pub const fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT"),
        os: std::env::consts::OS,
        arch: std::env::consts::ARCH,
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operator-manager {}", self.version)?;
        if let Some(commit) = self.commit {
            write!(f, " ({})", commit)?;
        }
        write!(f, " {}/{}", self.os, self.arch)
    }
}
