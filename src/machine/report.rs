//! Outcome of a `resolve_timeouts` pass.

use super::error::MachineError;
use crate::core::PendingTimeout;
use std::collections::BTreeMap;

/// A timeout that could not be resolved, with the reason.
#[derive(Debug)]
pub struct TimeoutFailure {
    pub timeout: PendingTimeout,
    pub error: MachineError,
}

/// Per-timeout results of one pass.
///
/// `resolved` maps identifier to run history for every timeout that fired.
/// Deferred timeouts (identifier locked) stay stored and are retried on
/// the next pass.
#[derive(Debug, Default)]
pub struct TimeoutReport {
    pub resolved: BTreeMap<String, Vec<String>>,
    pub deferred: Vec<String>,
    pub discarded: Vec<PendingTimeout>,
    pub failed: Vec<TimeoutFailure>,
}

impl TimeoutReport {
    /// Nothing was due.
    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
            && self.deferred.is_empty()
            && self.discarded.is_empty()
            && self.failed.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn history(&self, identifier: &str) -> Option<&[String]> {
        self.resolved.get(identifier).map(Vec::as_slice)
    }

    pub fn into_resolved(self) -> BTreeMap<String, Vec<String>> {
        self.resolved
    }
}
