//! Events and the commands they run.

use crate::core::{ensure_name, Attributes, DefinitionError, Named, Timeout, TimeoutSpec};
use crate::payload::Payload;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Error a fallible command may raise. It reaches the caller unchanged.
pub type CommandError = Box<dyn std::error::Error + Send + Sync>;

type CommandFn<S> = Arc<dyn Fn(&mut Payload<S>) -> Result<bool, CommandError> + Send + Sync>;

/// Business logic run when an event fires. `true` means success.
pub struct Command<S> {
    name: Option<String>,
    run: CommandFn<S>,
}

impl<S> Command<S> {
    pub fn new<F>(run: F) -> Self
    where
        F: Fn(&mut Payload<S>) -> bool + Send + Sync + 'static,
    {
        Self::fallible(move |payload| Ok(run(payload)))
    }

    /// Command that can fail outright instead of just returning `false`.
    pub fn fallible<F>(run: F) -> Self
    where
        F: Fn(&mut Payload<S>) -> Result<bool, CommandError> + Send + Sync + 'static,
    {
        Self {
            name: None,
            run: Arc::new(run),
        }
    }

    /// Label used in logs.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn execute(&self, payload: &mut Payload<S>) -> Result<bool, CommandError> {
        (self.run)(payload)
    }
}

impl<S> Clone for Command<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            run: Arc::clone(&self.run),
        }
    }
}

impl<S> fmt::Debug for Command<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command").field("name", &self.name).finish()
    }
}

/// Named transition rule.
///
/// Triggering runs the command chain in order, stopping at the first
/// failure. Success leads to the target state, failure to the error state;
/// either may be absent, meaning "stay put".
///
/// # Example
///
/// ```rust
/// use lifecycle::payload::Payload;
/// use lifecycle::process::Event;
///
/// let event: Event<()> = Event::new("pay")
///     .unwrap()
///     .with_target("paid")
///     .with_error("declined")
///     .with_action(|_payload| false);
///
/// let mut payload = Payload::new("order-1", ());
/// assert_eq!(event.trigger(&mut payload).unwrap(), Some("declined"));
/// ```
pub struct Event<S> {
    name: String,
    target_state: Option<String>,
    error_state: Option<String>,
    commands: Vec<Command<S>>,
    timeout: Option<Timeout>,
    attributes: Attributes,
}

impl<S> Event<S> {
    pub fn new(name: impl Into<String>) -> Result<Self, DefinitionError> {
        let name = name.into();
        ensure_name("event", &name)?;
        Ok(Self {
            name,
            target_state: None,
            error_state: None,
            commands: Vec::new(),
            timeout: None,
            attributes: Attributes::new(),
        })
    }

    /// State entered on success. An empty name means no transition.
    pub fn with_target(mut self, state: impl Into<String>) -> Self {
        self.target_state = non_empty(state.into());
        self
    }

    /// State entered on failure. An empty name means no transition.
    pub fn with_error(mut self, state: impl Into<String>) -> Self {
        self.error_state = non_empty(state.into());
        self
    }

    pub fn with_command(mut self, command: Command<S>) -> Self {
        self.commands.push(command);
        self
    }

    /// Append an infallible command built from a closure.
    pub fn with_action<F>(self, run: F) -> Self
    where
        F: Fn(&mut Payload<S>) -> bool + Send + Sync + 'static,
    {
        self.with_command(Command::new(run))
    }

    pub fn with_timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Convert and attach a raw timeout description.
    pub fn with_timeout_spec(self, spec: impl Into<TimeoutSpec>) -> Result<Self, DefinitionError> {
        let timeout = Timeout::try_from(spec.into())?;
        Ok(self.with_timeout(timeout))
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

    pub fn target_state(&self) -> Option<&str> {
        self.target_state.as_deref()
    }

    pub fn error_state(&self) -> Option<&str> {
        self.error_state.as_deref()
    }

    pub fn commands(&self) -> &[Command<S>] {
        &self.commands
    }

    pub fn has_timeout(&self) -> bool {
        self.timeout.is_some()
    }

    pub fn timeout(&self) -> Option<&Timeout> {
        self.timeout.as_ref()
    }

    /// When this event times out, relative to `now`.
    pub fn timeout_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.timeout.as_ref().map(|t| t.timeout_at(now))
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Run the command chain and pick the next state name.
    pub fn trigger(&self, payload: &mut Payload<S>) -> Result<Option<&str>, CommandError> {
        for command in &self.commands {
            if !command.execute(payload)? {
                return Ok(self.error_state());
            }
        }
        Ok(self.target_state())
    }
}

fn non_empty(name: String) -> Option<String> {
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

impl<S> Named for Event<S> {
    fn name(&self) -> &str {
        &self.name
    }
}

impl<S> Clone for Event<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            target_state: self.target_state.clone(),
            error_state: self.error_state.clone(),
            commands: self.commands.clone(),
            timeout: self.timeout,
            attributes: self.attributes.clone(),
        }
    }
}

impl<S> fmt::Debug for Event<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name)
            .field("target_state", &self.target_state)
            .field("error_state", &self.error_state)
            .field("commands", &self.commands.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}
