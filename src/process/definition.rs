//! The process graph.

use super::error::TransitionError;
use super::state::State;
use super::validation::{validate_process, SchemaViolation};
use crate::core::{ensure_name, DefinitionError, Guard, NamedCollection};
use std::fmt;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

/// Named finite-state machine definition: states keyed by name plus the
/// state new subjects start in.
///
/// A process is immutable once built and is meant to be shared (behind an
/// `Arc`) by every concurrent run.
///
/// # Example
///
/// ```rust
/// use lifecycle::process::{Event, Process, State};
///
/// let process: Process<()> = Process::new(
///     "order",
///     "new",
///     vec![
///         State::new("new")
///             .unwrap()
///             .with_event(Event::new("pay").unwrap().with_target("paid"))
///             .unwrap(),
///         State::new("paid").unwrap(),
///     ],
/// )
/// .unwrap();
///
/// assert_eq!(process.initial_state().name(), "new");
/// assert!(process.has_state("paid"));
///
/// assert!(Process::<()>::new("order", "missing", vec![]).is_err());
/// ```
pub struct Process<S> {
    name: String,
    initial: usize,
    states: NamedCollection<State<S>>,
    subject_guard: Option<Guard<S>>,
}

impl<S> Process<S> {
    pub fn new<I>(
        name: impl Into<String>,
        initial_state: impl Into<String>,
        states: I,
    ) -> Result<Self, DefinitionError>
    where
        I: IntoIterator<Item = State<S>>,
    {
        let name = name.into();
        ensure_name("process", &name)?;

        let initial_state = initial_state.into();
        let states = NamedCollection::try_from_iter("state", states)?;
        let initial =
            states
                .position(&initial_state)
                .ok_or_else(|| DefinitionError::MissingInitialState {
                    process: name.clone(),
                    state: initial_state.clone(),
                })?;

        Ok(Self {
            name,
            initial,
            states,
            subject_guard: None,
        })
    }

    /// Refuse to run against subjects failing `guard`.
    pub fn with_subject_guard(mut self, guard: Guard<S>) -> Self {
        self.subject_guard = Some(guard);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// State subjects without a state start in.
    pub fn initial_state(&self) -> &State<S> {
        &self.states.as_slice()[self.initial]
    }

    pub fn state(&self, name: &str) -> Option<&State<S>> {
        self.states.get(name)
    }

    pub fn has_state(&self, name: &str) -> bool {
        self.states.contains(name)
    }

    pub fn states(&self) -> &[State<S>] {
        self.states.as_slice()
    }

    pub fn subject_guard(&self) -> Option<&Guard<S>> {
        self.subject_guard.as_ref()
    }

    /// Look a state up, treating absence as a data/schema mismatch.
    pub fn require_state(&self, name: &str) -> Result<&State<S>, TransitionError> {
        self.state(name)
            .ok_or_else(|| TransitionError::UndefinedState {
                process: self.name.clone(),
                state: name.to_string(),
            })
    }

    /// Check a subject against the process guard, if any.
    pub fn check_subject(&self, subject: &S) -> Result<(), TransitionError> {
        match &self.subject_guard {
            Some(guard) if !guard.check(subject) => Err(TransitionError::InvalidSubject {
                process: self.name.clone(),
                guard: guard.description().to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Lint the graph, collecting every problem instead of stopping at
    /// the first.
    pub fn validate(&self) -> Validation<(), NonEmptyVec<SchemaViolation>> {
        validate_process(self)
    }
}

impl<S> fmt::Debug for Process<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("name", &self.name)
            .field("initial_state", &self.initial_state().name())
            .field("states", &self.states)
            .field("subject_guard", &self.subject_guard)
            .finish()
    }
}
