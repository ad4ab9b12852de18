//! Leadership subsystem.
//!
//! # Data Flow
//! ```text
//! elector.rs (loop)
//!     Candidate: try_acquire_or_renew every retry period (jittered)
//!     Leading:   renew every retry period, give up at the renew deadline
//!     → state.rs (pure transition: state × event → state + effects)
//!     → effects: spawn / cancel episode, release lock, fire callbacks
//!     → callbacks.rs (on_started_leading / on_stopped_leading / on_new_leader)
//! ```
//!
//! # Design Decisions
//! - Episodes are serialized: an episode is cancelled and awaited before
//!   `on_stopped_leading` fires and before the next acquisition attempt
//! - Transient store errors mean "not leading", never a crash
//! - Timing is validated on construction (`lease > renew > 1.2 * retry`)

pub mod callbacks;
pub mod elector;
pub mod state;
pub mod timing;

pub use callbacks::LeaderCallbacks;
pub use elector::{ElectionError, LeaderElector, LeaderStatus};
pub use state::{Effect, LeaderEvent, LeaderState, LeaderStateMachine};
pub use timing::{LeaderTiming, TimingError};
