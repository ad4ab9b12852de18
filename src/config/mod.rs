//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! built-in defaults (schema.rs)
//!     → optional TOML file (loader.rs)
//!     → command-line overrides (cli.rs)
//!     → validation.rs (semantic checks, all errors at once)
//!     → OperatorConfig threaded through constructors
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no process-wide copy
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{read_config, validate, ConfigError};
pub use schema::{
    ControllerConfig, DefaultsConfig, LeaderElectionConfig, ObservabilityConfig, OperatorConfig, StatusConfig,
    StoreConfig, StoreKind, TlsConfig,
};
pub use validation::{validate_config, ValidationError};
