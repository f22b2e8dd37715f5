//! Collaborator contracts consumed by the orchestrator.
//!
//! The engine never persists anything itself. Payload storage, pending
//! timeout storage and per-identifier locking are injected through the
//! traits below, so a deployment can back them with whatever shared store
//! it already runs. The `memory` module provides single-process
//! implementations suitable for tests and embedding.

mod error;
pub mod memory;

pub use error::HandlerError;
pub use memory::{MemoryLockHandler, MemoryPayloadHandler, MemoryTimeoutHandler};

use crate::core::PendingTimeout;
use crate::payload::Payload;
use chrono::Duration;

/// Loads and persists payloads by external identifier.
pub trait PayloadHandler<S>: Send + Sync {
    /// Rebuild the payload for `identifier`, creating a fresh one for
    /// subjects seen for the first time.
    fn restore(&self, identifier: &str) -> Result<Payload<S>, HandlerError>;

    /// Persist the payload. Storing identical content twice must be harmless.
    fn store(&self, payload: &Payload<S>) -> Result<(), HandlerError>;
}

/// Stores pending timeouts, at most one per identifier.
pub trait TimeoutHandler: Send + Sync {
    /// All pending timeouts due now, across identifiers.
    fn expired(&self) -> Result<Vec<PendingTimeout>, HandlerError>;

    /// Create or replace the pending timeout for its identifier.
    fn store(&self, timeout: PendingTimeout) -> Result<(), HandlerError>;

    /// Delete this specific pending timeout.
    fn remove(&self, timeout: &PendingTimeout) -> Result<(), HandlerError>;
}

/// Mutual exclusion keyed by subject identifier.
///
/// Whether `lock` waits or fails when the identifier is already held is an
/// implementation decision; it must only return `Ok` once access is
/// exclusive.
pub trait LockHandler: Send + Sync {
    fn lock(&self, identifier: &str) -> Result<(), HandlerError>;

    fn release(&self, identifier: &str) -> Result<(), HandlerError>;

    fn is_locked(&self, identifier: &str) -> Result<bool, HandlerError>;

    /// Force-release every lock held longer than `max_age`, returning how
    /// many were released.
    fn release_timed_out(&self, max_age: Duration) -> Result<usize, HandlerError>;
}
