//! Construction-time errors for process definitions and value objects.

use thiserror::Error;

/// Errors raised while building definitions. These are permanent: a
/// definition that fails to build must be fixed at its source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("Invalid {kind} name, can not be empty string")]
    EmptyName { kind: &'static str },

    #[error("Initial state \"{state}\" does not exist in process \"{process}\"")]
    MissingInitialState { process: String, state: String },

    #[error("Duplicate {kind} \"{name}\"")]
    DuplicateName { kind: &'static str, name: String },

    #[error("Invalid timeout \"{value}\": {reason}")]
    InvalidTimeout { value: String, reason: String },
}

impl DefinitionError {
    pub(crate) fn invalid_timeout(value: impl Into<String>, reason: impl Into<String>) -> Self {
        DefinitionError::InvalidTimeout {
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Reject empty names for the given kind of definition.
pub(crate) fn ensure_name(kind: &'static str, name: &str) -> Result<(), DefinitionError> {
    if name.is_empty() {
        return Err(DefinitionError::EmptyName { kind });
    }
    Ok(())
}
