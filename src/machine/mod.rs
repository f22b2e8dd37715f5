//! Running processes.
//!
//! - `Engine` resolves a triggered event against a payload in memory,
//!   including initial-state entry and `onStateWasSet` cascades.
//! - `StateMachine` wraps the engine with locking, payload storage and
//!   timeout scheduling, and fires due timeouts.

mod engine;
mod error;
mod lock;
mod orchestrator;
mod report;

pub use engine::Engine;
pub use error::{MachineError, MachineResult};
pub use lock::LockGuard;
pub use orchestrator::StateMachine;
pub use report::{TimeoutFailure, TimeoutReport};
