//! Serde representation of process schemas.

use super::error::SchemaError;
use super::registry::CommandRegistry;
use crate::core::{Attributes, Flag, TimeoutSpec};
use crate::process::{Event, Process, State};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use stillwater::validation::Validation;

/// Timeout as written in a schema: whole seconds, or a string holding
/// digits, an ISO-8601 duration or a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeoutValue {
    Seconds(i64),
    Text(String),
}

impl From<TimeoutValue> for TimeoutSpec {
    fn from(value: TimeoutValue) -> Self {
        match value {
            TimeoutValue::Seconds(seconds) => TimeoutSpec::Seconds(seconds),
            TimeoutValue::Text(text) => TimeoutSpec::Text(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_state: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<TimeoutValue>,
    /// Any other keys
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub flags: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<EventSchema>,
    /// Any other keys
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

/// Declarative process definition.
///
/// # Example
///
/// ```rust
/// use lifecycle::schema::{CommandRegistry, ProcessSchema};
///
/// let schema = ProcessSchema::from_json(r#"{
///     "name": "ticket",
///     "initialState": "open",
///     "states": [
///         {"name": "open", "events": [
///             {"name": "close", "targetState": "closed", "commands": ["canClose"]}
///         ]},
///         {"name": "closed", "flags": {"isClosed": true}}
///     ]
/// }"#).unwrap();
///
/// let registry = CommandRegistry::<()>::new().with("canClose", |_| true);
/// let process = schema.build(&registry).unwrap();
///
/// assert_eq!(process.initial_state().name(), "open");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSchema {
    pub name: String,
    pub initial_state: String,
    #[serde(default)]
    pub states: Vec<StateSchema>,
}

impl ProcessSchema {
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        serde_json::from_str(json).map_err(|e| SchemaError::Json(e.to_string()))
    }

    pub fn from_value(value: Value) -> Result<Self, SchemaError> {
        serde_json::from_value(value).map_err(|e| SchemaError::Json(e.to_string()))
    }

    /// Build and lint the process, resolving command names through
    /// `registry`.
    pub fn build<S>(&self, registry: &CommandRegistry<S>) -> Result<Process<S>, SchemaError> {
        let states = self
            .states
            .iter()
            .map(|state| state.build(registry))
            .collect::<Result<Vec<_>, _>>()?;

        let process = Process::new(self.name.as_str(), self.initial_state.as_str(), states)?;

        match process.validate() {
            Validation::Success(_) => Ok(process),
            Validation::Failure(violations) => {
                Err(SchemaError::Invalid(violations.iter().cloned().collect()))
            }
        }
    }
}

impl StateSchema {
    fn build<S>(&self, registry: &CommandRegistry<S>) -> Result<State<S>, SchemaError> {
        let mut state =
            State::new(self.name.as_str())?.with_attributes(Attributes::from(self.attributes.clone()));

        for (name, value) in &self.flags {
            state = state.with_flag(Flag::new(name.as_str(), value.clone())?);
        }
        for event in &self.events {
            state = state.with_event(event.build(&self.name, registry)?)?;
        }

        Ok(state)
    }
}

impl EventSchema {
    fn build<S>(&self, state: &str, registry: &CommandRegistry<S>) -> Result<Event<S>, SchemaError> {
        let mut event = Event::new(self.name.as_str())?
            .with_target(self.target_state.clone().unwrap_or_default())
            .with_error(self.error_state.clone().unwrap_or_default())
            .with_attributes(Attributes::from(self.attributes.clone()));

        for name in &self.commands {
            let command = registry
                .get(name)
                .ok_or_else(|| SchemaError::UnknownCommand {
                    state: state.to_string(),
                    event: self.name.clone(),
                    command: name.clone(),
                })?;
            event = event.with_command(command);
        }

        if let Some(timeout) = &self.timeout {
            event = event.with_timeout_spec(timeout.clone())?;
        }

        Ok(event)
    }
}
