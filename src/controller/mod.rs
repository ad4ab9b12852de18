//! Control loop subsystem.
//!
//! # Data Flow
//! ```text
//! Sequencer, once per episode:
//!     register(defaults) → manager.rs builds controllers from factories
//!     start(token)       → each controller runs on a child token (JoinSet)
//!                        → first failure cancels the rest and is returned
//! ```
//!
//! # Design Decisions
//! - Controllers are rebuilt on every registration so an episode never sees
//!   state left behind by the previous one
//! - `start` only returns `Ok` once the episode token is cancelled

pub mod drift;
pub mod manager;

pub use drift::DefaultsDriftController;
pub use manager::{ControlLoop, ControlLoopError, Controller, ControllerManager};
