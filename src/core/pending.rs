//! Scheduled timeout records.

use super::error::{ensure_name, DefinitionError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A pending timeout for one subject: fire `event` while the subject is
/// still in `state`, once `execute_at` has passed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTimeout {
    state: String,
    event: String,
    identifier: String,
    execute_at: DateTime<Utc>,
}

impl PendingTimeout {
    pub fn new(
        state: impl Into<String>,
        event: impl Into<String>,
        identifier: impl Into<String>,
        execute_at: DateTime<Utc>,
    ) -> Result<Self, DefinitionError> {
        let state = state.into();
        let event = event.into();
        ensure_name("timeout state", &state)?;
        ensure_name("timeout event", &event)?;

        Ok(Self {
            state,
            event,
            identifier: identifier.into(),
            execute_at,
        })
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn execute_at(&self) -> DateTime<Utc> {
        self.execute_at
    }

    /// Due once the execution instant is reached.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.execute_at <= now
    }
}
