//! End-to-end tests for the orchestrator using the in-memory handlers and
//! a manual clock.

use chrono::{Duration, TimeZone, Utc};
use lifecycle::config::{MachineConfig, StaleTimeoutPolicy};
use lifecycle::core::{Flag, ManualClock, PendingTimeout};
use lifecycle::handler::{
    HandlerError, LockHandler, MemoryLockHandler, MemoryPayloadHandler, MemoryTimeoutHandler,
    PayloadHandler, TimeoutHandler,
};
use lifecycle::machine::{MachineError, StateMachine};
use lifecycle::payload::{Payload, Subject};
use lifecycle::process::{Command, Process, TransitionError, ON_TIME_OUT};
use lifecycle::schema::{CommandRegistry, ProcessSchema};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

const IDENTIFIER: &str = "FakeIdentifier";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct FakeSubject {
    identifier: String,
    state: Option<String>,
    flags: Vec<Flag>,
}

impl FakeSubject {
    fn new(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            ..Self::default()
        }
    }

    fn has_flag(&self, name: &str) -> bool {
        self.flags.iter().any(|flag| flag.name() == name)
    }
}

impl Subject for FakeSubject {
    fn state(&self) -> Option<String> {
        self.state.clone()
    }

    fn change_state(&mut self, state: &str) {
        self.state = Some(state.to_string());
    }

    fn flags(&self) -> Vec<Flag> {
        self.flags.clone()
    }

    fn set_flags(&mut self, flags: &[Flag]) {
        for flag in flags {
            match self.flags.iter_mut().find(|f| f.name() == flag.name()) {
                Some(existing) => *existing = flag.clone(),
                None => self.flags.push(flag.clone()),
            }
        }
    }
}

/// Command that returns scripted results in order and fails once they
/// run out.
fn scripted(results: Vec<bool>) -> Command<FakeSubject> {
    let results = Arc::new(Mutex::new(VecDeque::from(results)));
    Command::fallible(move |_payload| {
        results
            .lock()
            .pop_front()
            .ok_or_else(|| "Out of results".into())
    })
}

fn process(results: Vec<bool>) -> Process<FakeSubject> {
    let schema = ProcessSchema::from_value(json!({
        "name": "testSchema",
        "initialState": "new",
        "states": [
            {
                "name": "new",
                "flags": {"wasNew": true},
                "events": [
                    {"name": "goPending", "targetState": "pending", "errorState": "error", "commands": ["command"]}
                ]
            },
            {
                "name": "pending",
                "flags": {"wasPending": true},
                "events": [
                    {"name": "onStateWasSet", "targetState": "done", "errorState": "error", "commands": ["command"]}
                ]
            },
            {
                "name": "error",
                "flags": {"hadError": true},
                "events": [
                    {"name": "onTimeOut", "targetState": "pending", "errorState": "error", "timeout": "PT1S", "commands": ["command"]}
                ]
            },
            {
                "name": "done",
                "flags": {"isDone": true}
            }
        ]
    }))
    .unwrap();

    let mut registry = CommandRegistry::new();
    registry.register("command", scripted(results));
    schema.build(&registry).unwrap()
}

struct Harness {
    clock: ManualClock,
    payloads: Arc<MemoryPayloadHandler<FakeSubject>>,
    timeouts: Arc<MemoryTimeoutHandler>,
    locks: Arc<MemoryLockHandler>,
    machine: StateMachine<FakeSubject>,
}

fn harness_with(results: Vec<bool>, config: MachineConfig) -> Harness {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
    let payloads = Arc::new(MemoryPayloadHandler::new(FakeSubject::new));
    let timeouts = Arc::new(MemoryTimeoutHandler::new(clock.clock()));
    let locks = Arc::new(MemoryLockHandler::new(clock.clock()));

    let machine = StateMachine::new(
        process(results),
        payloads.clone(),
        timeouts.clone(),
        locks.clone(),
    )
    .with_clock(clock.clock())
    .with_config(config)
    .unwrap();

    Harness {
        clock,
        payloads,
        timeouts,
        locks,
        machine,
    }
}

fn harness(results: Vec<bool>) -> Harness {
    harness_with(results, MachineConfig::default())
}

fn resolved(identifier: &str, history: &[&str]) -> BTreeMap<String, Vec<String>> {
    let history = history.iter().map(|s| s.to_string()).collect();
    BTreeMap::from([(identifier.to_string(), history)])
}

#[test]
fn trigger_event_runs_cascade_and_stores() {
    let h = harness(vec![true, false, true, true]);

    assert!(!h.payloads.was_stored());
    assert!(!h.locks.is_locked(IDENTIFIER).unwrap());
    assert!(!h.locks.was_locked(IDENTIFIER));

    let history = h.machine.trigger_event("goPending", IDENTIFIER).unwrap();

    assert_eq!(history, ["new", "pending", "error"]);
    assert!(h.payloads.was_stored());
    assert!(!h.locks.is_locked(IDENTIFIER).unwrap());
    assert!(h.locks.was_locked(IDENTIFIER));

    let stored = h.payloads.stored(IDENTIFIER).unwrap().unwrap();
    let subject = stored.subject();
    assert_eq!(subject.state.as_deref(), Some("error"));
    assert!(subject.has_flag("wasNew"));
    assert!(subject.has_flag("wasPending"));
    assert!(subject.has_flag("hadError"));
    assert!(!subject.has_flag("isDone"));

    let timeout = h.timeouts.pending(IDENTIFIER).unwrap();
    assert_eq!(timeout.state(), "error");
    assert_eq!(timeout.event(), ON_TIME_OUT);
    assert_eq!(timeout.execute_at(), h.clock.now() + Duration::seconds(1));
}

#[test]
fn resolve_timeouts_fires_due_timeouts_only() {
    let h = harness(vec![true, false, true, true]);

    h.machine.trigger_event("goPending", IDENTIFIER).unwrap();

    h.clock.advance(Duration::milliseconds(800));
    let report = h.machine.resolve_timeouts().unwrap();
    assert!(report.is_empty());
    assert!(report.resolved.is_empty());

    h.clock.advance(Duration::milliseconds(1500));
    let report = h.machine.resolve_timeouts().unwrap();
    assert_eq!(
        report.into_resolved(),
        resolved(IDENTIFIER, &["new", "pending", "error", "pending", "done"])
    );

    assert!(h.payloads.was_stored());
    assert!(h.timeouts.is_empty());
    assert!(!h.locks.is_locked(IDENTIFIER).unwrap());
    assert!(h.locks.was_locked(IDENTIFIER));

    let stored = h.payloads.stored(IDENTIFIER).unwrap().unwrap();
    assert!(stored.subject().has_flag("isDone"));
}

#[test]
fn rescheduled_timeout_survives_consumption() {
    // error -> onTimeOut fails -> error again, which schedules a new timeout
    let h = harness(vec![true, false, false]);

    h.machine.trigger_event("goPending", IDENTIFIER).unwrap();
    h.clock.advance(Duration::seconds(2));

    let report = h.machine.resolve_timeouts().unwrap();
    assert_eq!(
        report.history(IDENTIFIER).unwrap(),
        ["new", "pending", "error", "error"]
    );

    let next = h.timeouts.pending(IDENTIFIER).unwrap();
    assert_eq!(next.state(), "error");
    assert_eq!(next.execute_at(), h.clock.now() + Duration::seconds(1));
}

#[test]
fn command_failure_releases_lock_once() {
    let h = harness(vec![]);

    let error = h
        .machine
        .trigger_event("goPending", IDENTIFIER)
        .unwrap_err();

    assert!(matches!(
        error,
        MachineError::Transition(TransitionError::CommandFailed { .. })
    ));
    assert!(!h.locks.is_locked(IDENTIFIER).unwrap());
    assert_eq!(h.locks.acquisitions(IDENTIFIER), 1);
    assert_eq!(h.locks.releases(IDENTIFIER), 1);
    assert!(!h.payloads.was_stored());
    assert!(h.timeouts.is_empty());
}

#[test]
fn undefined_event_releases_lock() {
    let h = harness(vec![true, true]);

    let error = h.machine.trigger_event("cancel", IDENTIFIER).unwrap_err();

    assert!(matches!(
        error,
        MachineError::Transition(TransitionError::UndefinedEvent { .. })
    ));
    assert!(!h.locks.is_locked(IDENTIFIER).unwrap());
    assert_eq!(h.locks.releases(IDENTIFIER), 1);
}

struct FailingStore {
    inner: MemoryPayloadHandler<FakeSubject>,
}

impl PayloadHandler<FakeSubject> for FailingStore {
    fn restore(&self, identifier: &str) -> Result<Payload<FakeSubject>, HandlerError> {
        self.inner.restore(identifier)
    }

    fn store(&self, _payload: &Payload<FakeSubject>) -> Result<(), HandlerError> {
        Err(HandlerError::backend("disk full"))
    }
}

#[test]
fn store_failure_releases_lock_once() {
    let locks = Arc::new(MemoryLockHandler::default());
    let machine = StateMachine::new(
        process(vec![true, false]),
        Arc::new(FailingStore {
            inner: MemoryPayloadHandler::new(FakeSubject::new),
        }),
        Arc::new(MemoryTimeoutHandler::default()),
        locks.clone(),
    );

    let error = machine.trigger_event("goPending", IDENTIFIER).unwrap_err();

    assert!(matches!(
        error,
        MachineError::Handler(HandlerError::Backend(ref message)) if message == "disk full"
    ));
    assert!(!locks.is_locked(IDENTIFIER).unwrap());
    assert_eq!(locks.acquisitions(IDENTIFIER), 1);
    assert_eq!(locks.releases(IDENTIFIER), 1);
}

/// Payload store whose restore fails for selected identifiers.
struct FailingRestore {
    inner: MemoryPayloadHandler<FakeSubject>,
    broken: Mutex<Vec<String>>,
}

impl FailingRestore {
    fn new() -> Self {
        Self {
            inner: MemoryPayloadHandler::new(FakeSubject::new),
            broken: Mutex::new(Vec::new()),
        }
    }

    fn break_restore(&self, identifier: &str) {
        self.broken.lock().push(identifier.to_string());
    }
}

impl PayloadHandler<FakeSubject> for FailingRestore {
    fn restore(&self, identifier: &str) -> Result<Payload<FakeSubject>, HandlerError> {
        if self.broken.lock().iter().any(|broken| broken == identifier) {
            return Err(HandlerError::backend("connection reset"));
        }
        self.inner.restore(identifier)
    }

    fn store(&self, payload: &Payload<FakeSubject>) -> Result<(), HandlerError> {
        self.inner.store(payload)
    }
}

#[test]
fn restore_failure_releases_lock_once() {
    let payloads = Arc::new(FailingRestore::new());
    let locks = Arc::new(MemoryLockHandler::default());
    let machine = StateMachine::new(
        process(vec![true, false]),
        payloads.clone(),
        Arc::new(MemoryTimeoutHandler::default()),
        locks.clone(),
    );
    payloads.break_restore(IDENTIFIER);

    let error = machine.trigger_event("goPending", IDENTIFIER).unwrap_err();

    assert!(matches!(
        error,
        MachineError::Handler(HandlerError::Backend(ref message)) if message == "connection reset"
    ));
    assert!(!locks.is_locked(IDENTIFIER).unwrap());
    assert_eq!(locks.acquisitions(IDENTIFIER), 1);
    assert_eq!(locks.releases(IDENTIFIER), 1);
}

#[test]
fn restore_failure_during_timeouts_is_isolated() {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
    let payloads = Arc::new(FailingRestore::new());
    let timeouts = Arc::new(MemoryTimeoutHandler::new(clock.clock()));
    let locks = Arc::new(MemoryLockHandler::new(clock.clock()));
    let machine = StateMachine::new(
        process(vec![true, false, true, false, true, true]),
        payloads.clone(),
        timeouts.clone(),
        locks.clone(),
    )
    .with_clock(clock.clock());

    machine.trigger_event("goPending", "A").unwrap();
    machine.trigger_event("goPending", "B").unwrap();
    payloads.break_restore("A");
    clock.advance(Duration::seconds(2));

    let report = machine.resolve_timeouts().unwrap();

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].timeout.identifier(), "A");
    assert!(matches!(
        report.failed[0].error,
        MachineError::Handler(HandlerError::Backend(_))
    ));
    assert!(timeouts.pending("A").is_some());
    assert!(!locks.is_locked("A").unwrap());
    assert_eq!(locks.acquisitions("A"), 2);
    assert_eq!(locks.releases("A"), 2);
    assert_eq!(
        report.into_resolved(),
        resolved("B", &["new", "pending", "error", "pending", "done"])
    );
}

/// Lock handler whose release always fails.
struct StuckLocks {
    inner: MemoryLockHandler,
}

impl LockHandler for StuckLocks {
    fn lock(&self, identifier: &str) -> Result<(), HandlerError> {
        self.inner.lock(identifier)
    }

    fn release(&self, _identifier: &str) -> Result<(), HandlerError> {
        Err(HandlerError::backend("lock service unavailable"))
    }

    fn is_locked(&self, identifier: &str) -> Result<bool, HandlerError> {
        self.inner.is_locked(identifier)
    }

    fn release_timed_out(&self, max_age: Duration) -> Result<usize, HandlerError> {
        self.inner.release_timed_out(max_age)
    }
}

#[test]
fn stale_timeout_is_reported_even_if_release_fails() {
    let payloads = Arc::new(MemoryPayloadHandler::new(FakeSubject::new));
    let timeouts = Arc::new(MemoryTimeoutHandler::default());
    let machine = StateMachine::new(
        process(vec![]),
        payloads.clone(),
        timeouts.clone(),
        Arc::new(StuckLocks {
            inner: MemoryLockHandler::default(),
        }),
    );

    let payload = Payload::from_parts(
        IDENTIFIER,
        FakeSubject::new(IDENTIFIER),
        Some("error".to_string()),
        vec!["error".to_string()],
        vec![],
    );
    payloads.seed(&payload).unwrap();
    let stale = PendingTimeout::new("pending", ON_TIME_OUT, IDENTIFIER, Utc::now()).unwrap();
    timeouts.store(stale.clone()).unwrap();

    let report = machine.resolve_timeouts().unwrap();

    assert_eq!(report.failed.len(), 1);
    assert!(matches!(
        report.failed[0].error,
        MachineError::StaleTimeout { ref expected, ref actual, .. }
            if expected == "pending" && actual == "error"
    ));
    assert_eq!(timeouts.pending(IDENTIFIER), Some(stale));
}

#[test]
fn locked_identifier_is_rejected_for_triggers() {
    let h = harness(vec![true, false]);
    h.locks.lock(IDENTIFIER).unwrap();

    let error = h.machine.trigger_event("goPending", IDENTIFIER).unwrap_err();

    assert!(matches!(
        error,
        MachineError::Handler(HandlerError::Locked { .. })
    ));
    assert!(h.locks.is_locked(IDENTIFIER).unwrap());
    assert!(!h.payloads.was_stored());
}

#[test]
fn locked_identifier_defers_its_timeout() {
    let h = harness(vec![true, false, true, true]);

    h.machine.trigger_event("goPending", IDENTIFIER).unwrap();
    h.clock.advance(Duration::seconds(2));
    h.locks.lock(IDENTIFIER).unwrap();

    let report = h.machine.resolve_timeouts().unwrap();
    assert!(report.resolved.is_empty());
    assert_eq!(report.deferred, vec![IDENTIFIER.to_string()]);
    assert!(h.timeouts.pending(IDENTIFIER).is_some());

    h.locks.release(IDENTIFIER).unwrap();
    let report = h.machine.resolve_timeouts().unwrap();
    assert_eq!(
        report.history(IDENTIFIER).unwrap(),
        ["new", "pending", "error", "pending", "done"]
    );
}

#[test]
fn stale_locks_are_released_before_resolving() {
    let h = harness(vec![true, false, true, true]);

    h.machine.trigger_event("goPending", IDENTIFIER).unwrap();
    // a crashed worker left the identifier locked
    h.locks.lock(IDENTIFIER).unwrap();
    h.clock.advance(Duration::hours(2));

    let report = h.machine.resolve_timeouts().unwrap();

    assert!(report.deferred.is_empty());
    assert!(report.history(IDENTIFIER).is_some());
    assert!(!h.locks.is_locked(IDENTIFIER).unwrap());
}

#[test]
fn stale_timeout_is_rejected_without_mutation() {
    let h = harness(vec![true, false, true, true]);

    h.machine.trigger_event("goPending", IDENTIFIER).unwrap();
    let stale = PendingTimeout::new("pending", ON_TIME_OUT, IDENTIFIER, h.clock.now()).unwrap();
    h.timeouts.store(stale.clone()).unwrap();
    let stores_before = h.payloads.store_count();

    let report = h.machine.resolve_timeouts().unwrap();

    assert!(report.resolved.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].timeout, stale);
    assert!(matches!(
        report.failed[0].error,
        MachineError::StaleTimeout { ref expected, ref actual, .. }
            if expected == "pending" && actual == "error"
    ));

    let stored = h.payloads.stored(IDENTIFIER).unwrap().unwrap();
    assert_eq!(stored.history(), ["new", "pending", "error"]);
    assert_eq!(h.payloads.store_count(), stores_before);
    assert_eq!(h.timeouts.pending(IDENTIFIER), Some(stale));
    assert!(!h.locks.is_locked(IDENTIFIER).unwrap());
}

#[test]
fn stale_timeout_can_be_discarded() {
    let config = MachineConfig {
        stale_timeout_policy: StaleTimeoutPolicy::Discard,
        ..MachineConfig::default()
    };
    let h = harness_with(vec![true, false], config);

    h.machine.trigger_event("goPending", IDENTIFIER).unwrap();
    let stale = PendingTimeout::new("pending", ON_TIME_OUT, IDENTIFIER, h.clock.now()).unwrap();
    h.timeouts.store(stale.clone()).unwrap();

    let report = h.machine.resolve_timeouts().unwrap();

    assert!(!report.has_failures());
    assert_eq!(report.discarded, vec![stale]);
    assert!(h.timeouts.is_empty());
    assert!(!h.locks.is_locked(IDENTIFIER).unwrap());
}

#[test]
fn one_failing_timeout_does_not_stop_the_rest() {
    let h = harness(vec![true, false, true, false, true, true]);

    h.machine.trigger_event("goPending", "A").unwrap();
    h.machine.trigger_event("goPending", "B").unwrap();
    h.timeouts
        .store(PendingTimeout::new("done", ON_TIME_OUT, "A", h.clock.now()).unwrap())
        .unwrap();
    h.clock.advance(Duration::seconds(2));

    let report = h.machine.resolve_timeouts().unwrap();

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].timeout.identifier(), "A");
    assert_eq!(
        report.into_resolved(),
        resolved("B", &["new", "pending", "error", "pending", "done"])
    );
    assert!(!h.locks.is_locked("A").unwrap());
    assert!(!h.locks.is_locked("B").unwrap());
}

#[test]
fn finished_subject_rejects_further_events() {
    let h = harness(vec![true, true]);

    assert_eq!(
        h.machine.trigger_event("goPending", IDENTIFIER).unwrap(),
        ["new", "pending", "done"]
    );
    assert!(h.timeouts.is_empty());

    let error = h.machine.trigger_event("goPending", IDENTIFIER).unwrap_err();
    assert!(matches!(
        error,
        MachineError::Transition(TransitionError::UndefinedEvent { ref state, .. }) if state == "done"
    ));
}

#[test]
fn cascade_limit_comes_from_config() {
    let looping = ProcessSchema::from_value(json!({
        "name": "loop",
        "initialState": "a",
        "states": [
            {"name": "a", "events": [{"name": "go", "targetState": "b"}]},
            {"name": "b", "events": [{"name": "onStateWasSet", "targetState": "c", "commands": ["yes"]}]},
            {"name": "c", "events": [{"name": "onStateWasSet", "targetState": "b", "commands": ["yes"]}]}
        ]
    }))
    .unwrap()
    .build(&CommandRegistry::new().with("yes", |_: &mut Payload<()>| true))
    .unwrap();

    let locks = Arc::new(MemoryLockHandler::default());
    let payloads = Arc::new(MemoryPayloadHandler::new(|_: &str| ()));
    let machine = StateMachine::new(
        looping,
        payloads.clone(),
        Arc::new(MemoryTimeoutHandler::default()),
        locks.clone(),
    )
    .with_config(MachineConfig {
        max_cascade_depth: 4,
        ..MachineConfig::default()
    })
    .unwrap();

    let error = machine.trigger_event("go", "x").unwrap_err();

    assert!(matches!(
        error,
        MachineError::Transition(TransitionError::CascadeTooDeep { limit: 4, .. })
    ));
    assert!(!locks.is_locked("x").unwrap());
    assert!(!payloads.was_stored());
}
