//! Flags: named values a state stamps onto the payload when entered.

use super::collection::Named;
use super::error::{ensure_name, DefinitionError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name/value annotation.
///
/// # Example
///
/// ```rust
/// use lifecycle::core::Flag;
///
/// let flag = Flag::new("wasPaid", true).unwrap();
/// assert_eq!(flag.name(), "wasPaid");
/// assert_eq!(flag.value(), &serde_json::json!(true));
///
/// assert!(Flag::new("", 1).is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Flag {
    name: String,
    value: Value,
}

impl Flag {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Result<Self, DefinitionError> {
        let name = name.into();
        ensure_name("flag", &name)?;
        Ok(Self {
            name,
            value: value.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl Named for Flag {
    fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
