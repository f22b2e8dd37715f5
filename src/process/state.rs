//! States: named nodes owning their outgoing events.

use super::error::TransitionError;
use super::event::Event;
use crate::core::{ensure_name, Attributes, DefinitionError, Flag, Named, NamedCollection};
use crate::payload::Payload;
use serde_json::Value;
use std::fmt;

/// Reserved event fired right after any state change completes.
pub const ON_STATE_WAS_SET: &str = "onStateWasSet";

/// Reserved event fired when a scheduled timeout expires.
pub const ON_TIME_OUT: &str = "onTimeOut";

/// A node in the process graph.
///
/// Events are kept in insertion order. Flags are stamped onto the payload
/// every time a subject enters the state.
pub struct State<S> {
    name: String,
    events: NamedCollection<Event<S>>,
    flags: NamedCollection<Flag>,
    attributes: Attributes,
}

impl<S> State<S> {
    pub fn new(name: impl Into<String>) -> Result<Self, DefinitionError> {
        let name = name.into();
        ensure_name("state", &name)?;
        Ok(Self {
            name,
            events: NamedCollection::new(),
            flags: NamedCollection::new(),
            attributes: Attributes::new(),
        })
    }

    /// Add an event; names must be unique within the state.
    pub fn with_event(mut self, event: Event<S>) -> Result<Self, DefinitionError> {
        self.events.try_insert("event", event)?;
        Ok(self)
    }

    pub fn with_flag(mut self, flag: Flag) -> Self {
        self.flags.upsert(flag);
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes = self.attributes.with(name, value);
        self
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn events(&self) -> &[Event<S>] {
        self.events.as_slice()
    }

    pub fn has_event(&self, name: &str) -> bool {
        self.events.contains(name)
    }

    pub fn event(&self, name: &str) -> Option<&Event<S>> {
        self.events.get(name)
    }

    pub fn flags(&self) -> &[Flag] {
        self.flags.as_slice()
    }

    pub fn flag(&self, name: &str) -> Option<&Flag> {
        self.flags.get(name)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// True if an `onTimeOut` event is defined here.
    pub fn has_timeout(&self) -> bool {
        self.has_event(ON_TIME_OUT)
    }

    /// Fire the named event and return the next state name, if any.
    pub fn trigger_event(
        &self,
        event: &str,
        payload: &mut Payload<S>,
    ) -> Result<Option<&str>, TransitionError> {
        let definition = self
            .event(event)
            .ok_or_else(|| TransitionError::UndefinedEvent {
                state: self.name.clone(),
                event: event.to_string(),
            })?;

        definition
            .trigger(payload)
            .map_err(|source| TransitionError::CommandFailed {
                state: self.name.clone(),
                event: event.to_string(),
                source,
            })
    }
}

impl<S> Named for State<S> {
    fn name(&self) -> &str {
        &self.name
    }
}

impl<S> Clone for State<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            events: self.events.clone(),
            flags: self.flags.clone(),
            attributes: self.attributes.clone(),
        }
    }
}

impl<S> fmt::Debug for State<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("name", &self.name)
            .field("events", &self.events)
            .field("flags", &self.flags)
            .finish()
    }
}

impl<S> fmt::Display for State<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
