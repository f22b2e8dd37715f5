//! Schema linting for process graphs.
//!
//! Construction only guarantees the invariants needed to run at all (unique
//! names, an existing initial state). Linting goes further and reports
//! every dangling reference and known hazard at once, using `Validation`
//! to accumulate all violations instead of stopping at the first.

use super::definition::Process;
use super::state::{ON_STATE_WAS_SET, ON_TIME_OUT};
use std::collections::HashSet;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use thiserror::Error;

/// Problems found while linting a process graph
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaViolation {
    #[error("Event \"{event}\" in state \"{state}\" targets undefined state \"{target}\"")]
    UndefinedTarget {
        state: String,
        event: String,
        target: String,
    },

    #[error("Event \"{event}\" in state \"{state}\" has undefined error state \"{target}\"")]
    UndefinedErrorState {
        state: String,
        event: String,
        target: String,
    },

    #[error("State \"{state}\" defines onTimeOut without a timeout")]
    MissingTimeout { state: String },

    #[error("Unconditional onStateWasSet cycle: {}", .cycle.join(" -> "))]
    UnconditionalCascade { cycle: Vec<String> },
}

type Check = Validation<(), NonEmptyVec<SchemaViolation>>;

fn check(ok: bool, violation: impl FnOnce() -> SchemaViolation) -> Check {
    if ok {
        Validation::success(())
    } else {
        Validation::fail(violation())
    }
}

pub(crate) fn validate_process<S>(process: &Process<S>) -> Check {
    let mut checks: Vec<Check> = Vec::new();

    for state in process.states() {
        for event in state.events() {
            if let Some(target) = event.target_state() {
                checks.push(check(process.has_state(target), || {
                    SchemaViolation::UndefinedTarget {
                        state: state.name().to_string(),
                        event: event.name().to_string(),
                        target: target.to_string(),
                    }
                }));
            }

            if let Some(target) = event.error_state() {
                checks.push(check(process.has_state(target), || {
                    SchemaViolation::UndefinedErrorState {
                        state: state.name().to_string(),
                        event: event.name().to_string(),
                        target: target.to_string(),
                    }
                }));
            }

            if event.name() == ON_TIME_OUT {
                checks.push(check(event.has_timeout(), || {
                    SchemaViolation::MissingTimeout {
                        state: state.name().to_string(),
                    }
                }));
            }
        }
    }

    for cycle in unconditional_cascades(process) {
        checks.push(Validation::fail(SchemaViolation::UnconditionalCascade {
            cycle,
        }));
    }

    // Accumulate ALL failures using all_vec
    Validation::all_vec(checks).map(|_| ())
}

/// Follow command-less `onStateWasSet` events; any loop among them would
/// cascade forever at runtime.
fn unconditional_cascades<S>(process: &Process<S>) -> Vec<Vec<String>> {
    let mut cycles = Vec::new();
    let mut visited: HashSet<&str> = HashSet::new();

    for start in process.states() {
        let mut path: Vec<&str> = Vec::new();
        let mut current = Some(start);

        while let Some(state) = current {
            if let Some(position) = path.iter().position(|name| *name == state.name()) {
                let mut cycle: Vec<String> =
                    path[position..].iter().map(|s| s.to_string()).collect();
                cycle.push(state.name().to_string());
                cycles.push(cycle);
                break;
            }
            if !visited.insert(state.name()) {
                break;
            }
            path.push(state.name());

            current = state
                .event(ON_STATE_WAS_SET)
                .filter(|event| event.commands().is_empty())
                .and_then(|event| event.target_state())
                .and_then(|target| process.state(target));
        }
    }

    cycles
}
