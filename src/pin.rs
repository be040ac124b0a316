//! The pin record type shared between peers.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Classification tag applied to pins created from the empty template.
pub const DEFAULT_CATEGORY: &str = "brainstorming";

/// Unique identifier of a [`Pin`].
///
/// Randomly generated at creation and never reused. Uniqueness across peers
/// is probabilistic; an inbound pin whose id already exists locally is
/// dropped, not merged.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[serde(transparent)]
#[display("{_0}")]
pub struct PinId(String);

impl PinId {
    /// Generate a fresh random id.
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PinId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PinId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A geo-tagged annotation record.
///
/// Pins are immutable once created. There is no update operation; replication
/// only ever adds pins that were not seen before.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pin {
    /// Unique identifier.
    pub id: PinId,
    /// Creation time in microseconds since the unix epoch.
    pub created_at: u64,
    /// Short label, may be empty.
    pub title: String,
    /// Free-form annotation text, may be empty.
    pub body: String,
    /// Associated URL, may be empty.
    pub link: String,
    /// Longitude, kept as text without numeric validation.
    pub longitude: String,
    /// Latitude, kept as text without numeric validation.
    pub latitude: String,
    /// Classification tag.
    pub category: String,
}

impl Pin {
    /// The empty record template: fresh id, current timestamp, empty text
    /// fields and the default category.
    pub fn placeholder() -> Self {
        Self {
            id: PinId::random(),
            created_at: now_micros(),
            title: String::new(),
            body: String::new(),
            link: String::new(),
            longitude: String::new(),
            latitude: String::new(),
            category: DEFAULT_CATEGORY.to_string(),
        }
    }
}

pub(crate) fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("time drift")
        .as_micros() as u64
}
