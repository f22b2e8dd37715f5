//! Value objects shared by the whole engine.
//!
//! Everything here is immutable after construction:
//! - `Attributes` and `Flag` annotate states and events
//! - `Timeout` describes when an `onTimeOut` event fires
//! - `PendingTimeout` is the scheduled record handed to timeout storage
//! - `Guard` validates subjects before a run mutates anything
//! - `NamedCollection` keeps name-keyed items in insertion order

mod attributes;
mod clock;
mod collection;
mod error;
mod flag;
mod guard;
mod pending;
mod timeout;

pub use attributes::Attributes;
pub use clock::{system_clock, Clock, ManualClock};
pub use collection::{Named, NamedCollection};
pub use error::DefinitionError;
pub use flag::Flag;
pub use guard::Guard;
pub use pending::PendingTimeout;
pub use timeout::{Interval, Timeout, TimeoutSource, TimeoutSpec};

pub(crate) use error::ensure_name;
