//! Error types for storage and locking collaborators.

use crate::payload::SnapshotError;
use thiserror::Error;

/// Errors raised by payload, timeout and lock handlers.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Another run holds the lock for this identifier
    #[error("Identifier \"{identifier}\" is already locked")]
    Locked { identifier: String },

    /// Release requested for a lock that is not held
    #[error("Identifier \"{identifier}\" is not locked")]
    NotLocked { identifier: String },

    #[error("Payload snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Backend-specific failure (database, network, ...)
    #[error("Handler backend failure: {0}")]
    Backend(String),
}

impl HandlerError {
    pub fn backend(message: impl Into<String>) -> Self {
        HandlerError::Backend(message.into())
    }
}
