//! Status reporting subsystem.
//!
//! # Data Flow
//! ```text
//! Sequencer starts a reporter at the beginning of each episode:
//!     reporter.rs (Starting → Running heartbeat → Stopped on cancel)
//!     → types.rs (OperatorStatus with Available/Progressing/Degraded/Upgradeable)
//!     → sink.rs (FileStatusSink: <dir>/<name>.json)
//!     → signal.rs (CompletionSignal resolved after the final publish)
//! ```
//!
//! # Design Decisions
//! - An empty status target name selects `NoOpReporter`
//! - Publish failures are logged and retried on the next tick, never fatal

pub mod reporter;
pub mod signal;
pub mod sink;
pub mod types;

pub use reporter::{ClusterStatusReporter, NoOpReporter, StatusReporter};
pub use signal::{CompletionNotifier, CompletionSignal};
pub use sink::{FileStatusSink, StatusError, StatusSink};
pub use types::{Condition, ConditionStatus, ConditionType, OperatorStatus, RelatedObject, ReportPhase};
