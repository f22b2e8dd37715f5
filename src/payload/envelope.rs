//! Per-run context wrapping a subject.

use super::subject::Subject;
use crate::core::{Flag, NamedCollection};

/// Mutable run context: the subject plus its current state, change marker,
/// visited-state history and flags.
///
/// The payload is owned by exactly one in-flight resolution at a time.
///
/// # Example
///
/// ```rust
/// use lifecycle::payload::Payload;
///
/// let mut payload = Payload::new("order-7", ());
/// assert_eq!(payload.state(), None);
/// assert!(!payload.has_changed());
///
/// payload.change_state("new");
/// payload.change_state("new");
///
/// assert!(payload.has_changed());
/// assert_eq!(payload.history(), ["new", "new"]);
/// ```
#[derive(Clone, Debug)]
pub struct Payload<S> {
    identifier: String,
    subject: S,
    state: Option<String>,
    has_changed: bool,
    history: Vec<String>,
    flags: NamedCollection<Flag>,
}

impl<S: Subject> Payload<S> {
    /// Wrap a subject, seeding state and flags from its capabilities.
    pub fn new(identifier: impl Into<String>, subject: S) -> Self {
        let state = subject.state().filter(|s| !s.is_empty());
        let mut flags = NamedCollection::new();
        for flag in subject.flags() {
            flags.upsert(flag);
        }

        Self {
            identifier: identifier.into(),
            subject,
            state,
            has_changed: false,
            history: Vec::new(),
            flags,
        }
    }

    /// Rebuild a payload from stored parts. The change marker starts clear.
    pub fn from_parts(
        identifier: impl Into<String>,
        subject: S,
        state: Option<String>,
        history: Vec<String>,
        flags: Vec<Flag>,
    ) -> Self {
        let mut payload = Self::new(identifier, subject);
        if state.is_some() {
            payload.state = state;
        }
        payload.history = history;
        for flag in flags {
            payload.flags.upsert(flag);
        }
        payload
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// True once `change_state` was called on this payload, even if the
    /// state was set back to the same name.
    pub fn has_changed(&self) -> bool {
        self.has_changed
    }

    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    /// Move to `state`, append it to the history and mirror it onto a
    /// state-aware subject.
    pub fn change_state(&mut self, state: &str) {
        self.state = Some(state.to_string());
        self.history.push(state.to_string());
        self.has_changed = true;
        self.subject.change_state(state);
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn flag(&self, name: &str) -> Option<&Flag> {
        self.flags.get(name)
    }

    pub fn flags(&self) -> &[Flag] {
        self.flags.as_slice()
    }

    /// Set or replace a flag and mirror the full set onto a flag-aware subject.
    pub fn set_flag(&mut self, flag: Flag) {
        self.flags.upsert(flag);
        self.subject.set_flags(self.flags.as_slice());
    }

    pub fn subject(&self) -> &S {
        &self.subject
    }

    pub fn subject_mut(&mut self) -> &mut S {
        &mut self.subject
    }

    pub fn set_subject(&mut self, subject: S) {
        self.subject = subject;
    }

    pub fn into_subject(self) -> S {
        self.subject
    }
}
