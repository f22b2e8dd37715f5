//! Guard predicates over subjects.
//!
//! A process may refuse to run against subjects that do not satisfy its
//! guard. Guards are pure boolean functions, checked before any mutation.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Named predicate that decides whether a subject is acceptable.
///
/// # Example
///
/// ```rust
/// use lifecycle::core::Guard;
///
/// struct Order {
///     total: u32,
/// }
///
/// let guard = Guard::new("order has a total", |order: &Order| order.total > 0);
///
/// assert!(guard.check(&Order { total: 10 }));
/// assert!(!guard.check(&Order { total: 0 }));
/// assert_eq!(guard.description(), "order has a total");
/// ```
pub struct Guard<T> {
    description: String,
    predicate: Arc<dyn Fn(&T) -> bool + Send + Sync>,
    _phantom: PhantomData<fn(&T)>,
}

impl<T> Guard<T> {
    /// Create a guard from a pure predicate function.
    ///
    /// The predicate must be deterministic and thread-safe (Send + Sync).
    pub fn new<F>(description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Guard {
            description: description.into(),
            predicate: Arc::new(predicate),
            _phantom: PhantomData,
        }
    }

    pub fn check(&self, subject: &T) -> bool {
        (self.predicate)(subject)
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl<T> Clone for Guard<T> {
    fn clone(&self) -> Self {
        Self {
            description: self.description.clone(),
            predicate: Arc::clone(&self.predicate),
            _phantom: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Guard<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}
