//! Serializable snapshots of payloads.
//!
//! Payload handlers persist a payload between runs. A snapshot captures
//! everything needed to rebuild it: identifier, state, history, flags and
//! the subject itself.

use super::envelope::Payload;
use super::subject::Subject;
use crate::core::Flag;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Version identifier for snapshot format
pub const SNAPSHOT_VERSION: u32 = 1;

/// Errors that can occur while encoding or decoding snapshots
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Serialization to JSON failed
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Deserialization from JSON failed
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    /// Snapshot version is not supported by this version
    #[error("Unsupported snapshot version {found}, supported: {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}

/// Stored form of a payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PayloadSnapshot<S> {
    /// Snapshot format version
    pub version: u32,

    /// Unique snapshot identifier
    pub id: String,

    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,

    pub identifier: String,
    pub state: Option<String>,
    pub history: Vec<String>,
    pub flags: Vec<Flag>,
    pub subject: S,
}

impl<S: Subject + Clone> PayloadSnapshot<S> {
    pub fn capture(payload: &Payload<S>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            identifier: payload.identifier().to_string(),
            state: payload.state().map(str::to_string),
            history: payload.history().to_vec(),
            flags: payload.flags().to_vec(),
            subject: payload.subject().clone(),
        }
    }
}

impl<S: Subject> PayloadSnapshot<S> {
    pub fn into_payload(self) -> Payload<S> {
        Payload::from_parts(
            self.identifier,
            self.subject,
            self.state,
            self.history,
            self.flags,
        )
    }
}

impl<S: Serialize + DeserializeOwned> PayloadSnapshot<S> {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string(self).map_err(|e| SnapshotError::SerializationFailed(e.to_string()))
    }

    /// Decode a snapshot, rejecting unknown format versions.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_str(json)
            .map_err(|e| SnapshotError::DeserializationFailed(e.to_string()))?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: snapshot.version,
                supported: SNAPSHOT_VERSION,
            });
        }

        Ok(snapshot)
    }
}
