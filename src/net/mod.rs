//! Network layer subsystem.
//!
//! # Design Decisions
//! - TLS applies to the metrics listener only; liveness stays plain HTTP
//! - Certificate and key are checked at startup, before any listener binds

pub mod tls;

pub use tls::{check_pem_pair, load_tls_config, TlsError};
