//! Subject capabilities.

use crate::core::Flag;

/// Entity whose lifecycle a process tracks.
///
/// Every capability has a no-op default, so `impl Subject for Order {}` is
/// enough for subjects that keep no state of their own. Subjects that do
/// override the methods below and the payload keeps them in sync:
///
/// - state-aware subjects report their current state via `state` and
///   receive every change through `change_state`;
/// - flag-aware subjects report flags via `flags` and receive the full,
///   merged flag set through `set_flags`.
///
/// # Example
///
/// ```rust
/// use lifecycle::payload::{Payload, Subject};
///
/// #[derive(Default)]
/// struct Ticket {
///     status: Option<String>,
/// }
///
/// impl Subject for Ticket {
///     fn state(&self) -> Option<String> {
///         self.status.clone()
///     }
///
///     fn change_state(&mut self, state: &str) {
///         self.status = Some(state.to_string());
///     }
/// }
///
/// let mut payload = Payload::new("T-1", Ticket::default());
/// payload.change_state("open");
///
/// assert_eq!(payload.subject().status.as_deref(), Some("open"));
/// ```
pub trait Subject {
    /// Current state as stored on the subject, if it tracks one.
    fn state(&self) -> Option<String> {
        None
    }

    fn change_state(&mut self, _state: &str) {}

    fn flags(&self) -> Vec<Flag> {
        Vec::new()
    }

    fn set_flags(&mut self, _flags: &[Flag]) {}
}

impl Subject for () {}

impl Subject for String {}

impl Subject for serde_json::Value {}

impl<T: Subject + ?Sized> Subject for Box<T> {
    fn state(&self) -> Option<String> {
        (**self).state()
    }

    fn change_state(&mut self, state: &str) {
        (**self).change_state(state)
    }

    fn flags(&self) -> Vec<Flag> {
        (**self).flags()
    }

    fn set_flags(&mut self, flags: &[Flag]) {
        (**self).set_flags(flags)
    }
}
