//! Declarative process schemas.
//!
//! A schema is plain data (JSON or anything serde reads) naming states,
//! flags, events and timeouts. Commands are referenced by name and looked
//! up in a `CommandRegistry` while building, and the built process is
//! linted before it is handed out.

mod document;
mod error;
mod registry;

pub use document::{EventSchema, ProcessSchema, StateSchema, TimeoutValue};
pub use error::SchemaError;
pub use registry::CommandRegistry;
