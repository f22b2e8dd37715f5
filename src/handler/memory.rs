//! In-process handler implementations.
//!
//! These keep everything behind `parking_lot` mutexes in the current
//! process. They honor the full handler contracts, so they double as
//! reference implementations for real backends and as test fixtures.

use super::{HandlerError, LockHandler, PayloadHandler, TimeoutHandler};
use crate::core::{system_clock, Clock, PendingTimeout};
use crate::payload::{Payload, PayloadSnapshot, Subject};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

type SubjectFactory<S> = Arc<dyn Fn(&str) -> S + Send + Sync>;

/// Payload storage keyed by identifier, holding JSON snapshots.
///
/// Unknown identifiers get a fresh payload around a subject built by the
/// factory. Restored payloads keep their accumulated history.
pub struct MemoryPayloadHandler<S> {
    factory: SubjectFactory<S>,
    snapshots: Mutex<HashMap<String, String>>,
    stores: AtomicUsize,
}

impl<S> MemoryPayloadHandler<S>
where
    S: Subject + Clone + Serialize + DeserializeOwned,
{
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&str) -> S + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
            snapshots: Mutex::new(HashMap::new()),
            stores: AtomicUsize::new(0),
        }
    }

    /// Put a payload in storage without counting it as a store.
    pub fn seed(&self, payload: &Payload<S>) -> Result<(), HandlerError> {
        let json = PayloadSnapshot::capture(payload).to_json()?;
        self.snapshots
            .lock()
            .insert(payload.identifier().to_string(), json);
        Ok(())
    }

    /// Currently stored payload for `identifier`, if any.
    pub fn stored(&self, identifier: &str) -> Result<Option<Payload<S>>, HandlerError> {
        let snapshots = self.snapshots.lock();
        match snapshots.get(identifier) {
            Some(json) => Ok(Some(PayloadSnapshot::<S>::from_json(json)?.into_payload())),
            None => Ok(None),
        }
    }

    pub fn was_stored(&self) -> bool {
        self.store_count() > 0
    }

    pub fn store_count(&self) -> usize {
        self.stores.load(Ordering::SeqCst)
    }
}

impl<S> PayloadHandler<S> for MemoryPayloadHandler<S>
where
    S: Subject + Clone + Serialize + DeserializeOwned,
{
    fn restore(&self, identifier: &str) -> Result<Payload<S>, HandlerError> {
        match self.stored(identifier)? {
            Some(payload) => Ok(payload),
            None => Ok(Payload::new(identifier, (self.factory)(identifier))),
        }
    }

    fn store(&self, payload: &Payload<S>) -> Result<(), HandlerError> {
        self.seed(payload)?;
        self.stores.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Pending timeouts, one per identifier, due according to the clock.
pub struct MemoryTimeoutHandler {
    clock: Clock,
    records: Mutex<BTreeMap<String, PendingTimeout>>,
}

impl Default for MemoryTimeoutHandler {
    fn default() -> Self {
        Self::new(system_clock())
    }
}

impl MemoryTimeoutHandler {
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            records: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn pending(&self, identifier: &str) -> Option<PendingTimeout> {
        self.records.lock().get(identifier).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl TimeoutHandler for MemoryTimeoutHandler {
    fn expired(&self) -> Result<Vec<PendingTimeout>, HandlerError> {
        let now = (self.clock)();
        Ok(self
            .records
            .lock()
            .values()
            .filter(|timeout| timeout.is_due(now))
            .cloned()
            .collect())
    }

    fn store(&self, timeout: PendingTimeout) -> Result<(), HandlerError> {
        self.records
            .lock()
            .insert(timeout.identifier().to_string(), timeout);
        Ok(())
    }

    /// Only deletes an identical record; a newer timeout stored for the
    /// same identifier in the meantime is kept.
    fn remove(&self, timeout: &PendingTimeout) -> Result<(), HandlerError> {
        let mut records = self.records.lock();
        if records.get(timeout.identifier()) == Some(timeout) {
            records.remove(timeout.identifier());
        }
        Ok(())
    }
}

#[derive(Default)]
struct LockTable {
    held: HashMap<String, DateTime<Utc>>,
    acquisitions: HashMap<String, usize>,
    releases: HashMap<String, usize>,
}

/// Fail-fast lock table: `lock` on a held identifier returns
/// `HandlerError::Locked` instead of waiting.
pub struct MemoryLockHandler {
    clock: Clock,
    table: Mutex<LockTable>,
}

impl Default for MemoryLockHandler {
    fn default() -> Self {
        Self::new(system_clock())
    }
}

impl MemoryLockHandler {
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            table: Mutex::new(LockTable::default()),
        }
    }

    /// True if the identifier was ever locked through this handler.
    pub fn was_locked(&self, identifier: &str) -> bool {
        self.acquisitions(identifier) > 0
    }

    pub fn acquisitions(&self, identifier: &str) -> usize {
        self.table
            .lock()
            .acquisitions
            .get(identifier)
            .copied()
            .unwrap_or(0)
    }

    /// Explicit releases; forced releases of timed-out locks are not counted.
    pub fn releases(&self, identifier: &str) -> usize {
        self.table
            .lock()
            .releases
            .get(identifier)
            .copied()
            .unwrap_or(0)
    }
}

impl LockHandler for MemoryLockHandler {
    fn lock(&self, identifier: &str) -> Result<(), HandlerError> {
        let now = (self.clock)();
        let mut table = self.table.lock();
        if table.held.contains_key(identifier) {
            return Err(HandlerError::Locked {
                identifier: identifier.to_string(),
            });
        }
        table.held.insert(identifier.to_string(), now);
        *table
            .acquisitions
            .entry(identifier.to_string())
            .or_insert(0) += 1;
        Ok(())
    }

    fn release(&self, identifier: &str) -> Result<(), HandlerError> {
        let mut table = self.table.lock();
        if table.held.remove(identifier).is_none() {
            return Err(HandlerError::NotLocked {
                identifier: identifier.to_string(),
            });
        }
        *table.releases.entry(identifier.to_string()).or_insert(0) += 1;
        Ok(())
    }

    fn is_locked(&self, identifier: &str) -> Result<bool, HandlerError> {
        Ok(self.table.lock().held.contains_key(identifier))
    }

    fn release_timed_out(&self, max_age: Duration) -> Result<usize, HandlerError> {
        let Some(cutoff) = (self.clock)().checked_sub_signed(max_age) else {
            return Ok(0);
        };

        let mut table = self.table.lock();
        let before = table.held.len();
        table.held.retain(|_, acquired_at| *acquired_at > cutoff);
        let released = before - table.held.len();

        if released > 0 {
            debug!(released, "Force-released timed out locks");
        }
        Ok(released)
    }
}
