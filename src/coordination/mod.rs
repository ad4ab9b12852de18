//! Coordination lock client subsystem.
//!
//! # Data Flow
//! ```text
//! LeaderElector (leader/elector.rs)
//!     → lock.rs (LeaseLock: acquire / renew / release for one identity)
//!     → store.rs (CoordinationStore: get / create / conditional update)
//!     → memory.rs (process-local) | file.rs (shared directory)
//! ```
//!
//! # Design Decisions
//! - Every write is a compare-and-swap on the record version; a lost race is
//!   a normal "not granted" outcome, never an error
//! - Expiry is judged against the local monotonic instant at which the record
//!   was last seen to change, not against the writer's wall clock
//! - Transient store failures are surfaced to the caller, which owns retries

pub mod file;
pub mod lock;
pub mod memory;
pub mod record;
pub mod store;

pub use file::FileStore;
pub use lock::{AcquireOutcome, LeaseLock};
pub use memory::InMemoryStore;
pub use record::{LockKey, LockRecord, Version, Versioned};
pub use store::{CoordinationStore, StoreError, StoreResult};
