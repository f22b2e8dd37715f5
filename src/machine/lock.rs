//! Scoped lock acquisition.

use crate::handler::{HandlerError, LockHandler};
use tracing::warn;

/// Holds the lock for one identifier until released or dropped.
///
/// Dropping the guard releases the lock, so early returns and `?` cannot
/// leave an identifier wedged.
pub struct LockGuard<'a> {
    locks: &'a dyn LockHandler,
    identifier: String,
    held: bool,
}

impl<'a> LockGuard<'a> {
    pub fn acquire(locks: &'a dyn LockHandler, identifier: &str) -> Result<Self, HandlerError> {
        locks.lock(identifier)?;
        Ok(Self {
            locks,
            identifier: identifier.to_string(),
            held: true,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Release explicitly, surfacing a release failure to the caller.
    pub fn release(mut self) -> Result<(), HandlerError> {
        self.held = false;
        self.locks.release(&self.identifier)
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if self.held {
            self.held = false;
            if let Err(e) = self.locks.release(&self.identifier) {
                warn!(
                    identifier = %self.identifier,
                    error = %e,
                    "Failed to release lock in LockGuard drop"
                );
            }
        }
    }
}
