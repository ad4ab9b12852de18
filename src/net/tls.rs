//! TLS configuration and certificate loading.

use axum_server::tls_rustls::RustlsConfig;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("{kind} file not found: {path}")]
    NotFound { kind: &'static str, path: PathBuf },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificates found in {0}")]
    NoCertificates(PathBuf),

    #[error("no private key found in {0}")]
    NoPrivateKey(PathBuf),

    #[error("failed to build TLS config: {0}")]
    Config(#[source] std::io::Error),
}

/// Check that both files exist and hold PEM material of the right kind.
///
/// Runs at startup so a bad pair is a setup error rather than a
/// failure of the metrics listener later on.
pub fn check_pem_pair(cert_path: &Path, key_path: &Path) -> Result<usize, TlsError> {
    let open = |kind, path: &Path| {
        if !path.exists() {
            return Err(TlsError::NotFound {
                kind,
                path: path.to_path_buf(),
            });
        }
        File::open(path)
            .map(BufReader::new)
            .map_err(|source| TlsError::Read {
                path: path.to_path_buf(),
                source,
            })
    };

    let mut certs = open("Certificate", cert_path)?;
    let count = rustls_pemfile::certs(&mut certs)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Read {
            path: cert_path.to_path_buf(),
            source,
        })?
        .len();
    if count == 0 {
        return Err(TlsError::NoCertificates(cert_path.to_path_buf()));
    }

    let mut key = open("Private key", key_path)?;
    match rustls_pemfile::private_key(&mut key) {
        Ok(Some(_)) => Ok(count),
        Ok(None) => Err(TlsError::NoPrivateKey(key_path.to_path_buf())),
        Err(source) => Err(TlsError::Read {
            path: key_path.to_path_buf(),
            source,
        }),
    }
}

/// Load TLS configuration from certificate and key files.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, TlsError> {
    let certs = check_pem_pair(cert_path, key_path)?;
    tracing::debug!(cert = %cert_path.display(), certs, "Loaded TLS certificate chain");
    RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(TlsError::Config)
}
