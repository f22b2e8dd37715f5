//! Transition resolution.
//!
//! The engine takes an immutable process and a payload and resolves one
//! triggered event to completion: entering the initial state for new
//! subjects, running the event, entering the resulting state and
//! following any `onStateWasSet` cascade. It performs no I/O; everything
//! it does is visible on the payload afterwards.

use crate::config::DEFAULT_MAX_CASCADE_DEPTH;
use crate::core::{DefinitionError, PendingTimeout};
use crate::payload::{Payload, Subject};
use crate::process::{Process, State, TransitionError, ON_STATE_WAS_SET, ON_TIME_OUT};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// Resolves events against payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Engine {
    max_cascade_depth: usize,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CASCADE_DEPTH)
    }
}

impl Engine {
    pub fn new(max_cascade_depth: usize) -> Self {
        Self { max_cascade_depth }
    }

    pub fn max_cascade_depth(&self) -> usize {
        self.max_cascade_depth
    }

    /// Resolve `event` for the payload and return its history.
    ///
    /// Subjects without a state enter the initial state first. A resolved
    /// next state of `None` ends the run without touching the payload.
    /// After every state change, an `onStateWasSet` event defined on the
    /// new state is fired immediately; more than `max_cascade_depth` of
    /// those in one run fails with `CascadeTooDeep`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use lifecycle::machine::Engine;
    /// use lifecycle::payload::Payload;
    /// use lifecycle::process::{Event, Process, State, ON_STATE_WAS_SET};
    ///
    /// let process: Process<()> = Process::new(
    ///     "ticket",
    ///     "open",
    ///     vec![
    ///         State::new("open")
    ///             .unwrap()
    ///             .with_event(Event::new("resolve").unwrap().with_target("resolved"))
    ///             .unwrap(),
    ///         State::new("resolved")
    ///             .unwrap()
    ///             .with_event(Event::new(ON_STATE_WAS_SET).unwrap().with_target("closed"))
    ///             .unwrap(),
    ///         State::new("closed").unwrap(),
    ///     ],
    /// )
    /// .unwrap();
    ///
    /// let mut payload = Payload::new("T-1", ());
    /// let history = Engine::default()
    ///     .trigger_event(&process, "resolve", &mut payload)
    ///     .unwrap();
    ///
    /// assert_eq!(history, ["open", "resolved", "closed"]);
    /// ```
    pub fn trigger_event<S: Subject>(
        &self,
        process: &Process<S>,
        event: &str,
        payload: &mut Payload<S>,
    ) -> Result<Vec<String>, TransitionError> {
        process.check_subject(payload.subject())?;

        let current = match payload.state().map(str::to_string) {
            Some(name) => process.require_state(&name)?,
            None => {
                let initial = process.initial_state();
                enter(process, payload, initial);
                initial
            }
        };

        let mut next = current.trigger_event(event, payload)?;
        let mut cascades = 0;

        while let Some(target) = next {
            let state = process.require_state(target)?;
            enter(process, payload, state);

            if !state.has_event(ON_STATE_WAS_SET) {
                break;
            }

            cascades += 1;
            if cascades > self.max_cascade_depth {
                return Err(TransitionError::CascadeTooDeep {
                    process: process.name().to_string(),
                    state: state.name().to_string(),
                    limit: self.max_cascade_depth,
                });
            }
            next = state.trigger_event(ON_STATE_WAS_SET, payload)?;
        }

        Ok(payload.history().to_vec())
    }

    /// True if the payload's current state defines `onTimeOut`.
    pub fn has_timeout<S: Subject>(&self, process: &Process<S>, payload: &Payload<S>) -> bool {
        payload
            .state()
            .and_then(|name| process.state(name))
            .is_some_and(State::has_timeout)
    }

    /// Pending timeout for the payload's current state, resolved against
    /// `now`. `None` when the state has no `onTimeOut` event.
    pub fn pending_timeout<S: Subject>(
        &self,
        process: &Process<S>,
        payload: &Payload<S>,
        now: DateTime<Utc>,
    ) -> Result<Option<PendingTimeout>, DefinitionError> {
        let Some(state) = payload.state().and_then(|name| process.state(name)) else {
            return Ok(None);
        };
        let Some(event) = state.event(ON_TIME_OUT) else {
            return Ok(None);
        };
        let Some(execute_at) = event.timeout_at(now) else {
            warn!(
                process = %process.name(),
                state = %state.name(),
                "onTimeOut event has no timeout, nothing scheduled"
            );
            return Ok(None);
        };

        PendingTimeout::new(state.name(), event.name(), payload.identifier(), execute_at).map(Some)
    }
}

/// Move the payload into `state` and stamp the state's flags onto it.
fn enter<S: Subject>(process: &Process<S>, payload: &mut Payload<S>, state: &State<S>) {
    debug!(
        process = %process.name(),
        identifier = %payload.identifier(),
        from = ?payload.state(),
        to = %state.name(),
        "Entering state"
    );

    payload.change_state(state.name());
    for flag in state.flags() {
        payload.set_flag(flag.clone());
    }
}
