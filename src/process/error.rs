//! Runtime errors raised while resolving transitions.

use super::event::CommandError;
use thiserror::Error;

/// Errors that can occur while resolving an event against a payload.
///
/// A resolution that simply leads nowhere (empty target) is not an error;
/// these variants all mean the request or the data is invalid.
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("State \"{state}\" does not exist in process \"{process}\"")]
    UndefinedState { process: String, state: String },

    #[error("Event \"{event}\" is not defined in state \"{state}\"")]
    UndefinedEvent { state: String, event: String },

    #[error("Subject rejected by process \"{process}\": {guard}")]
    InvalidSubject { process: String, guard: String },

    #[error("Command for event \"{event}\" in state \"{state}\" failed: {source}")]
    CommandFailed {
        state: String,
        event: String,
        #[source]
        source: CommandError,
    },

    #[error(
        "Process \"{process}\" exceeded {limit} onStateWasSet transitions (last state \"{state}\")"
    )]
    CascadeTooDeep {
        process: String,
        state: String,
        limit: usize,
    },
}
