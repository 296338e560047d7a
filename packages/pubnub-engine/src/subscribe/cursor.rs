//! Subscribe loop read position.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Timetoken + region pair marking where the subscribe loop resumes.
///
/// A timetoken counts 100-nanosecond ticks since the Unix epoch. The zero
/// cursor asks the service for a fresh position (handshake).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
pub struct SubscriptionCursor {
    #[serde(rename = "t", deserialize_with = "timetoken")]
    pub timetoken: u64,
    #[serde(rename = "r", default)]
    pub region: u32,
}

impl SubscriptionCursor {
    pub fn new(timetoken: u64, region: u32) -> Self {
        Self { timetoken, region }
    }

    /// Whether this is the zero cursor used for a handshake.
    pub fn is_initial(&self) -> bool {
        self.timetoken == 0
    }

    /// Wall-clock time the timetoken refers to.
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.timetoken / 10_000_000).ok()?;
        let nanos = u32::try_from((self.timetoken % 10_000_000) * 100).ok()?;
        DateTime::from_timestamp(secs, nanos)
    }
}

impl fmt::Display for SubscriptionCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.timetoken, self.region)
    }
}

/// The service sends timetokens as strings; older payloads use numbers.
fn timetoken<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(value) => Ok(value),
        Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
    }
}
