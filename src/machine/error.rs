//! Orchestration errors.

use crate::config::ConfigError;
use crate::core::DefinitionError;
use crate::handler::HandlerError;
use crate::process::TransitionError;
use thiserror::Error;

/// Errors surfaced by `StateMachine` and `Factory`.
///
/// Transition and handler errors pass through unchanged; the orchestrator
/// only adds the conditions it detects itself.
#[derive(Debug, Error)]
pub enum MachineError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A due timeout no longer matches the subject's current state
    #[error(
        "Timeout for \"{identifier}\" expected state \"{expected}\" but subject is in \"{actual}\""
    )]
    StaleTimeout {
        identifier: String,
        expected: String,
        actual: String,
    },

    #[error("State machine \"{name}\" is not registered")]
    UnknownMachine { name: String },
}

pub type MachineResult<T> = Result<T, MachineError>;
