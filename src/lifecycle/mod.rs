//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Identity → Store → Collaborators → Background tasks → Leader election
//!
//! Shutdown (shutdown.rs):
//!     Signal, lost leadership or fatal error → cancel root token
//!     → episode cancelled and awaited → elector returns
//!     → supervisor.rs waits for health/metrics/signal tasks → exit code
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger shutdown
//! ```
//!
//! # Design Decisions
//! - One root token; every task gets it or a child of it
//! - The first fatal error decides the exit code, later ones are only logged
//! - Losing leadership ends the process unless configured to rejoin

pub mod identity;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod supervisor;

pub use identity::{Identity, IdentityError};
pub use shutdown::Shutdown;
pub use startup::{run, Bootstrap, Collaborators, OperatorCallbacks, RunSummary, StartupError};
pub use supervisor::TaskSupervisor;
