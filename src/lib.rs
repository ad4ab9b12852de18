//! Leader-gated lifecycle manager for a singleton operator.

// Leadership core
pub mod coordination;
pub mod leader;
pub mod sequencer;

// Episode subsystems
pub mod controller;
pub mod defaults;
pub mod status;

// Process surface
pub mod cli;
pub mod config;
pub mod http;
pub mod net;
pub mod version;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::OperatorConfig;
pub use leader::LeaderElector;
pub use lifecycle::Shutdown;
