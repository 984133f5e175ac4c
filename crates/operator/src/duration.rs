//! Duration parsing
//!
//! Durations in configuration accept humantime strings ("10s", "1m30s")
//! or bare numbers meaning seconds.

use std::fmt;
use std::ops::Deref;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// A configured duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Duration(pub std::time::Duration);

impl Duration {
    /// Create from whole seconds
    pub fn from_secs(secs: u64) -> Self {
        Duration(std::time::Duration::from_secs(secs))
    }

    /// Create from milliseconds
    pub fn from_millis(millis: u64) -> Self {
        Duration(std::time::Duration::from_millis(millis))
    }

    /// The inner standard-library duration
    pub fn raw(self) -> std::time::Duration {
        self.0
    }
}

impl Deref for Duration {
    type Target = std::time::Duration;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<std::time::Duration> for Duration {
    fn from(d: std::time::Duration) -> Self {
        Duration(d)
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", humantime::format_duration(self.0))
    }
}

impl Serialize for Duration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Duration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Uint(u64),
            Float(f64),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Uint(secs) => Ok(Duration(std::time::Duration::from_secs(secs))),
            Raw::Float(secs) if secs >= 0.0 => {
                Ok(Duration(std::time::Duration::from_secs_f64(secs)))
            }
            Raw::Float(secs) => Err(de::Error::custom(format!(
                "duration {secs} cannot be negative"
            ))),
            Raw::Text(t) => humantime::parse_duration(t.trim())
                .map(Duration)
                .map_err(de::Error::custom),
        }
    }
}
