//! Payloads: the per-run wrapper around a subject.
//!
//! A payload carries the subject plus the bookkeeping the engine needs:
//! the current state name, whether it changed during the run, the ordered
//! list of visited states and the flags stamped on by entered states.

mod envelope;
pub mod snapshot;
mod subject;

pub use envelope::Payload;
pub use snapshot::{PayloadSnapshot, SnapshotError, SNAPSHOT_VERSION};
pub use subject::Subject;
