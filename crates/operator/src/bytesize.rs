//! Byte size parsing
//!
//! Sizes in configuration accept bare numbers, scientific notation, and
//! case-insensitive decimal (`kb`, `mb`, ...) or binary (`kib`, `mib`,
//! ...) suffixes. Fractional results truncate.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "bytesize_test.rs"]
mod tests;

/// A parsed size in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct ByteSize(pub u64);

impl ByteSize {
    /// The size in bytes
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for ByteSize {
    fn from(v: u64) -> Self {
        ByteSize(v)
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ByteSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("size cannot be empty".to_owned());
        }

        // Split the trailing alphabetic suffix from the numeric part. An
        // exponent such as "1e3" is safe: its trailing characters are
        // digits, so they are never captured as a suffix.
        let split = trimmed
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_ascii_alphabetic())
            .map(|(i, _)| i)
            .last()
            .unwrap_or(trimmed.len());
        let (num_part, suffix) = trimmed.split_at(split);

        let multiplier: f64 = match suffix.to_ascii_lowercase().as_str() {
            "" | "b" => 1.0,
            "kb" => 1000.0,
            "kib" => 1024.0,
            "mb" => 1000.0 * 1000.0,
            "mib" => 1024.0 * 1024.0,
            "gb" => 1000.0 * 1000.0 * 1000.0,
            "gib" => 1024.0 * 1024.0 * 1024.0,
            "tb" => 1000.0f64.powi(4),
            "tib" => 1024.0f64.powi(4),
            "pb" => 1000.0f64.powi(5),
            "pib" => 1024.0f64.powi(5),
            other => return Err(format!("unknown size suffix '{other}'")),
        };

        let number: f64 = num_part
            .trim()
            .parse()
            .map_err(|_| format!("invalid size '{s}'"))?;
        if number < 0.0 {
            return Err(format!("size '{s}' cannot be negative"));
        }

        Ok(ByteSize((number * multiplier) as u64))
    }
}

impl Serialize for ByteSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Uint(u64),
            Float(f64),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Uint(n) => Ok(ByteSize(n)),
            Raw::Float(f) if f >= 0.0 => Ok(ByteSize(f as u64)),
            Raw::Float(f) => Err(de::Error::custom(format!("size {f} cannot be negative"))),
            Raw::Text(t) => t.parse().map_err(de::Error::custom),
        }
    }
}
