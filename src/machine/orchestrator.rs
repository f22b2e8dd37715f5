//! Orchestration: locking, persistence and the timeout lifecycle around
//! the engine.

use super::engine::Engine;
use super::error::{MachineError, MachineResult};
use super::lock::LockGuard;
use super::report::{TimeoutFailure, TimeoutReport};
use crate::config::{ConfigError, MachineConfig, StaleTimeoutPolicy};
use crate::core::{system_clock, Clock, PendingTimeout};
use crate::handler::{HandlerError, LockHandler, PayloadHandler, TimeoutHandler};
use crate::payload::{Payload, Subject};
use crate::process::Process;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

enum TimeoutOutcome {
    Resolved(Vec<String>),
    Deferred,
    Discarded,
}

/// A process bound to its storage and lock collaborators.
///
/// Every run holds the identifier's lock from restore to store, so at most
/// one resolution per identifier is in flight. The lock is released on
/// every exit path.
pub struct StateMachine<S> {
    process: Arc<Process<S>>,
    engine: Engine,
    payloads: Arc<dyn PayloadHandler<S>>,
    timeouts: Arc<dyn TimeoutHandler>,
    locks: Arc<dyn LockHandler>,
    clock: Clock,
    config: MachineConfig,
}

impl<S: Subject + 'static> StateMachine<S> {
    pub fn new(
        process: impl Into<Arc<Process<S>>>,
        payloads: Arc<dyn PayloadHandler<S>>,
        timeouts: Arc<dyn TimeoutHandler>,
        locks: Arc<dyn LockHandler>,
    ) -> Self {
        let config = MachineConfig::default();
        Self {
            process: process.into(),
            engine: Engine::new(config.max_cascade_depth),
            payloads,
            timeouts,
            locks,
            clock: system_clock(),
            config,
        }
    }

    pub fn with_config(mut self, config: MachineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        self.engine = Engine::new(config.max_cascade_depth);
        self.config = config;
        Ok(self)
    }

    /// Clock used to schedule timeouts.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn process(&self) -> &Process<S> {
        &self.process
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Trigger `event` for the subject stored under `identifier` and
    /// return its history.
    pub fn trigger_event(&self, event: &str, identifier: &str) -> MachineResult<Vec<String>> {
        let guard = LockGuard::acquire(self.locks.as_ref(), identifier)?;
        let mut payload = self.payloads.restore(identifier)?;
        let history = self.resolve(&mut payload, event)?;
        guard.release()?;

        info!(
            process = %self.process.name(),
            identifier = %identifier,
            event = %event,
            state = ?payload.state(),
            "Event resolved"
        );
        Ok(history)
    }

    /// Fire every due timeout.
    ///
    /// Stale locks are force-released first. Each due timeout is handled
    /// on its own: locked identifiers are deferred to the next pass and a
    /// failing timeout never stops the others. Only failures of the
    /// lock sweep or of listing expired timeouts fail the whole call.
    pub fn resolve_timeouts(&self) -> MachineResult<TimeoutReport> {
        let released = self
            .locks
            .release_timed_out(self.config.stale_lock_grace())?;
        if released > 0 {
            warn!(
                process = %self.process.name(),
                released,
                "Released stale locks"
            );
        }

        let mut report = TimeoutReport::default();
        for timeout in self.timeouts.expired()? {
            let identifier = timeout.identifier().to_string();
            match self.resolve_timeout(&timeout) {
                Ok(TimeoutOutcome::Resolved(history)) => {
                    info!(
                        process = %self.process.name(),
                        identifier = %identifier,
                        event = %timeout.event(),
                        "Timeout resolved"
                    );
                    report.resolved.insert(identifier, history);
                }
                Ok(TimeoutOutcome::Deferred) => {
                    warn!(
                        process = %self.process.name(),
                        identifier = %identifier,
                        "Identifier locked, timeout deferred"
                    );
                    report.deferred.push(identifier);
                }
                Ok(TimeoutOutcome::Discarded) => {
                    warn!(
                        process = %self.process.name(),
                        identifier = %identifier,
                        state = %timeout.state(),
                        "Discarded stale timeout"
                    );
                    report.discarded.push(timeout);
                }
                Err(error) => {
                    warn!(
                        process = %self.process.name(),
                        identifier = %identifier,
                        error = %error,
                        "Timeout rejected"
                    );
                    report.failed.push(TimeoutFailure { timeout, error });
                }
            }
        }

        Ok(report)
    }

    fn resolve_timeout(&self, timeout: &PendingTimeout) -> MachineResult<TimeoutOutcome> {
        let identifier = timeout.identifier();
        if self.locks.is_locked(identifier)? {
            return Ok(TimeoutOutcome::Deferred);
        }

        // Another caller may grab the lock between the check and here.
        let guard = match LockGuard::acquire(self.locks.as_ref(), identifier) {
            Ok(guard) => guard,
            Err(HandlerError::Locked { .. }) => return Ok(TimeoutOutcome::Deferred),
            Err(e) => return Err(e.into()),
        };

        let mut payload = self.payloads.restore(identifier)?;
        if payload.state() != Some(timeout.state()) {
            let actual = payload.state().unwrap_or_default().to_string();
            return match self.config.stale_timeout_policy {
                StaleTimeoutPolicy::Reject => {
                    let stale = MachineError::StaleTimeout {
                        identifier: identifier.to_string(),
                        expected: timeout.state().to_string(),
                        actual,
                    };
                    // The stale state is the failure worth reporting.
                    if let Err(error) = guard.release() {
                        warn!(
                            identifier = %identifier,
                            error = %error,
                            "Failed to release lock after stale timeout"
                        );
                    }
                    Err(stale)
                }
                StaleTimeoutPolicy::Discard => {
                    self.timeouts.remove(timeout)?;
                    guard.release()?;
                    Ok(TimeoutOutcome::Discarded)
                }
            };
        }

        let history = self.resolve(&mut payload, timeout.event())?;
        self.timeouts.remove(timeout)?;
        guard.release()?;

        Ok(TimeoutOutcome::Resolved(history))
    }

    /// Resolve, schedule the follow-on timeout if the state changed, store.
    fn resolve(&self, payload: &mut Payload<S>, event: &str) -> MachineResult<Vec<String>> {
        let history = self.engine.trigger_event(&self.process, event, payload)?;

        if payload.has_changed() {
            let now = (self.clock)();
            if let Some(timeout) = self.engine.pending_timeout(&self.process, payload, now)? {
                debug!(
                    identifier = %timeout.identifier(),
                    state = %timeout.state(),
                    execute_at = %timeout.execute_at(),
                    "Scheduling timeout"
                );
                self.timeouts.store(timeout)?;
            }
        }

        self.payloads.store(payload)?;
        Ok(history)
    }
}

impl<S> fmt::Debug for StateMachine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("process", &self.process.name())
            .field("engine", &self.engine)
            .field("config", &self.config)
            .finish()
    }
}
