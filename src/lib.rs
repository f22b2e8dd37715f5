//! Lifecycle: a finite-state-machine engine for entity lifecycles
//!
//! Subjects (orders, tickets, documents, ...) move between named states by
//! triggering named events. Each event runs a chain of commands whose
//! outcome picks the next state, states may cascade through the reserved
//! `onStateWasSet` event, and states may schedule an `onTimeOut` event that
//! fires once a timeout expires.
//!
//! The crate keeps the definition immutable and the side effects at the
//! edges:
//!
//! - **process**: the immutable `Process`/`State`/`Event` graph
//! - **machine**: the `Engine` that resolves events in memory, and the
//!   `StateMachine` that adds locking, persistence and timeouts
//! - **handler**: storage and lock contracts plus in-memory implementations
//! - **schema**: serde-based declarative definitions
//! - **factory**: a registry of named machines
//!
//! # Example
//!
//! ```rust
//! use lifecycle::handler::{MemoryLockHandler, MemoryPayloadHandler, MemoryTimeoutHandler};
//! use lifecycle::machine::StateMachine;
//! use lifecycle::process::{Event, Process, State, ON_STATE_WAS_SET};
//! use std::sync::Arc;
//!
//! let process: Process<()> = Process::new(
//!     "order",
//!     "new",
//!     vec![
//!         State::new("new")
//!             .unwrap()
//!             .with_event(
//!                 Event::new("pay")
//!                     .unwrap()
//!                     .with_target("paid")
//!                     .with_error("new")
//!                     .with_action(|_payload| true),
//!             )
//!             .unwrap(),
//!         State::new("paid")
//!             .unwrap()
//!             .with_event(Event::new(ON_STATE_WAS_SET).unwrap().with_target("shipped"))
//!             .unwrap(),
//!         State::new("shipped").unwrap(),
//!     ],
//! )
//! .unwrap();
//!
//! let machine = StateMachine::new(
//!     process,
//!     Arc::new(MemoryPayloadHandler::new(|_: &str| ())),
//!     Arc::new(MemoryTimeoutHandler::default()),
//!     Arc::new(MemoryLockHandler::default()),
//! );
//!
//! let history = machine.trigger_event("pay", "order-1").unwrap();
//! assert_eq!(history, ["new", "paid", "shipped"]);
//! ```

pub mod config;
pub mod core;
pub mod factory;
pub mod handler;
pub mod logging;
pub mod machine;
pub mod payload;
pub mod process;
pub mod schema;

// Re-export commonly used types
pub use config::{MachineConfig, StaleTimeoutPolicy};
pub use crate::core::{Flag, Guard, PendingTimeout, Timeout, TimeoutSpec};
pub use factory::{Factory, Machine};
pub use handler::{HandlerError, LockHandler, PayloadHandler, TimeoutHandler};
pub use machine::{Engine, MachineError, MachineResult, StateMachine, TimeoutReport};
pub use payload::{Payload, Subject};
pub use process::{Event, Process, State, TransitionError, ON_STATE_WAS_SET, ON_TIME_OUT};
