//! Schema loading errors.

use crate::core::DefinitionError;
use crate::process::SchemaViolation;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Failed to parse schema: {0}")]
    Json(String),

    #[error("Command \"{command}\" used by event \"{event}\" in state \"{state}\" is not registered")]
    UnknownCommand {
        state: String,
        event: String,
        command: String,
    },

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    /// The process was built but failed linting
    #[error("Invalid schema: {}", join_violations(.0))]
    Invalid(Vec<SchemaViolation>),
}

fn join_violations(violations: &[SchemaViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
