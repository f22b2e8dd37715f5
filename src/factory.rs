//! Registry of named state machines.
//!
//! Applications usually run several processes side by side (orders,
//! tickets, ...). The factory keeps one definition per name and builds each
//! machine the first time it is needed, so a scheduler can resolve the
//! timeouts of every registered process with one call.

use crate::machine::{MachineError, MachineResult, StateMachine, TimeoutReport};
use crate::payload::Subject;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Type-erased state machine, so machines over different subject types
/// can live in one registry.
pub trait Machine: Send + Sync {
    fn name(&self) -> &str;

    fn trigger_event(&self, event: &str, identifier: &str) -> MachineResult<Vec<String>>;

    fn resolve_timeouts(&self) -> MachineResult<TimeoutReport>;
}

impl<S: Subject + 'static> Machine for StateMachine<S> {
    fn name(&self) -> &str {
        self.process().name()
    }

    fn trigger_event(&self, event: &str, identifier: &str) -> MachineResult<Vec<String>> {
        StateMachine::trigger_event(self, event, identifier)
    }

    fn resolve_timeouts(&self) -> MachineResult<TimeoutReport> {
        StateMachine::resolve_timeouts(self)
    }
}

type Definition = Arc<dyn Fn() -> MachineResult<Arc<dyn Machine>> + Send + Sync>;

/// Named definitions plus the machines built from them.
///
/// # Example
///
/// ```rust
/// use lifecycle::factory::Factory;
/// use lifecycle::handler::{MemoryLockHandler, MemoryPayloadHandler, MemoryTimeoutHandler};
/// use lifecycle::machine::StateMachine;
/// use lifecycle::process::{Event, Process, State};
/// use std::sync::Arc;
///
/// let mut factory = Factory::new();
/// factory.register("ticket", || {
///     let process: Process<()> = Process::new(
///         "ticket",
///         "open",
///         vec![
///             State::new("open")?
///                 .with_event(Event::new("close")?.with_target("closed"))?,
///             State::new("closed")?,
///         ],
///     )?;
///     Ok(StateMachine::new(
///         process,
///         Arc::new(MemoryPayloadHandler::new(|_: &str| ())),
///         Arc::new(MemoryTimeoutHandler::default()),
///         Arc::new(MemoryLockHandler::default()),
///     ))
/// });
///
/// let history = factory.trigger_event("ticket", "close", "T-1").unwrap();
/// assert_eq!(history, ["open", "closed"]);
/// assert!(factory.trigger_event("order", "close", "T-1").is_err());
/// ```
#[derive(Default)]
pub struct Factory {
    definitions: BTreeMap<String, Definition>,
    instances: Mutex<HashMap<String, Arc<dyn Machine>>>,
}

impl Factory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition. Re-registering a name replaces the
    /// definition and drops any machine already built from the old one.
    pub fn register<F, M>(&mut self, name: impl Into<String>, definition: F)
    where
        F: Fn() -> MachineResult<M> + Send + Sync + 'static,
        M: Machine + 'static,
    {
        let name = name.into();
        self.instances.lock().remove(&name);
        self.definitions.insert(
            name,
            Arc::new(move || definition().map(|machine| Arc::new(machine) as Arc<dyn Machine>)),
        );
    }

    pub fn has(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Registered names, in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    /// Machine registered under `name`, built on first access.
    pub fn get(&self, name: &str) -> MachineResult<Arc<dyn Machine>> {
        let definition = self
            .definitions
            .get(name)
            .ok_or_else(|| MachineError::UnknownMachine {
                name: name.to_string(),
            })?;

        let mut instances = self.instances.lock();
        if let Some(machine) = instances.get(name) {
            return Ok(Arc::clone(machine));
        }

        debug!(machine = %name, "Building state machine");
        let machine = definition()?;
        instances.insert(name.to_string(), Arc::clone(&machine));
        Ok(machine)
    }

    pub fn trigger_event(
        &self,
        schema: &str,
        event: &str,
        identifier: &str,
    ) -> MachineResult<Vec<String>> {
        self.get(schema)?.trigger_event(event, identifier)
    }

    /// Resolve timeouts for the named schemas, or for every registered
    /// schema when `schemas` is empty.
    pub fn resolve_timeouts(
        &self,
        schemas: &[&str],
    ) -> MachineResult<BTreeMap<String, TimeoutReport>> {
        let names: Vec<&str> = if schemas.is_empty() {
            self.names().collect()
        } else {
            schemas.to_vec()
        };

        let mut reports = BTreeMap::new();
        for name in names {
            reports.insert(name.to_string(), self.get(name)?.resolve_timeouts()?);
        }
        Ok(reports)
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut built: Vec<String> = self.instances.lock().keys().cloned().collect();
        built.sort_unstable();
        f.debug_struct("Factory")
            .field("definitions", &self.definitions.keys().collect::<Vec<_>>())
            .field("built", &built)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{MemoryLockHandler, MemoryPayloadHandler, MemoryTimeoutHandler};
    use crate::process::{Event, Process, State};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn machine(name: &str) -> MachineResult<StateMachine<()>> {
        let process = Process::new(
            name,
            "open",
            vec![
                State::new("open")?.with_event(Event::new("close")?.with_target("closed"))?,
                State::new("closed")?,
            ],
        )?;
        Ok(StateMachine::new(
            process,
            Arc::new(MemoryPayloadHandler::new(|_: &str| ())),
            Arc::new(MemoryTimeoutHandler::default()),
            Arc::new(MemoryLockHandler::default()),
        ))
    }

    #[test]
    fn machines_are_built_lazily_once() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&builds);

        let mut factory = Factory::new();
        factory.register("ticket", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            machine("ticket")
        });

        assert!(factory.has("ticket"));
        assert_eq!(builds.load(Ordering::SeqCst), 0);

        let first = factory.get("ticket").unwrap();
        let second = factory.get("ticket").unwrap();

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.name(), "ticket");
    }

    #[test]
    fn unknown_machine_is_an_error() {
        let factory = Factory::new();

        assert!(!factory.has("ticket"));
        let error = factory.get("ticket").err().unwrap();
        assert_eq!(
            error.to_string(),
            "State machine \"ticket\" is not registered"
        );
    }

    #[test]
    fn failing_definition_is_not_cached() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);

        let mut factory = Factory::new();
        factory.register("broken", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            machine("")
        });

        assert!(matches!(
            factory.get("broken"),
            Err(MachineError::Definition(_))
        ));
        assert!(factory.get("broken").is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn resolve_timeouts_defaults_to_all_schemas() {
        let mut factory = Factory::new();
        factory.register("tickets", || machine("tickets"));
        factory.register("orders", || machine("orders"));

        let all = factory.resolve_timeouts(&[]).unwrap();
        assert_eq!(all.keys().collect::<Vec<_>>(), vec!["orders", "tickets"]);
        assert!(all.values().all(TimeoutReport::is_empty));

        let some = factory.resolve_timeouts(&["tickets"]).unwrap();
        assert_eq!(some.len(), 1);

        assert!(factory.resolve_timeouts(&["missing"]).is_err());
    }

    #[test]
    fn trigger_event_dispatches_by_name() {
        let mut factory = Factory::new();
        factory.register("tickets", || machine("tickets"));

        assert_eq!(
            factory.trigger_event("tickets", "close", "T-1").unwrap(),
            vec!["open", "closed"]
        );
    }
}
