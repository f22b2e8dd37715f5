//! The process graph: events, states and the process that owns them.
//!
//! A `Process` is built once (by hand or through the schema adapter),
//! never mutated afterwards, and shared by every run. Resolving a single
//! event against a state lives here; cascading and timeouts live in the
//! machine layer.

mod definition;
mod error;
mod event;
mod state;
mod validation;

pub use definition::Process;
pub use error::TransitionError;
pub use event::{Command, CommandError, Event};
pub use state::{State, ON_STATE_WAS_SET, ON_TIME_OUT};
pub use validation::SchemaViolation;
