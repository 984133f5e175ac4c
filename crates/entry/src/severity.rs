//! Severity levels
//!
//! A coarse scale with named base levels ten apart, plus numbered
//! sub-levels for sources that report finer grains.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Entry severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    /// No severity assigned
    #[default]
    Unknown,
    Trace,
    Trace2,
    Trace3,
    Trace4,
    Debug,
    Debug2,
    Debug3,
    Debug4,
    Info,
    Info2,
    Info3,
    Info4,
    Warning,
    Warning2,
    Warning3,
    Warning4,
    Error,
    Error2,
    Error3,
    Error4,
    Fatal,
    Fatal2,
    Fatal3,
    Fatal4,
}

impl Severity {
    /// Numeric value of the level, base levels ten apart
    pub fn as_i32(self) -> i32 {
        use Severity::*;
        match self {
            Unknown => 0,
            Trace => 10,
            Trace2 => 11,
            Trace3 => 12,
            Trace4 => 13,
            Debug => 20,
            Debug2 => 21,
            Debug3 => 22,
            Debug4 => 23,
            Info => 30,
            Info2 => 31,
            Info3 => 32,
            Info4 => 33,
            Warning => 40,
            Warning2 => 41,
            Warning3 => 42,
            Warning4 => 43,
            Error => 50,
            Error2 => 51,
            Error3 => 52,
            Error4 => 53,
            Fatal => 60,
            Fatal2 => 61,
            Fatal3 => 62,
            Fatal4 => 63,
        }
    }

    /// Build a severity from its numeric value
    pub fn from_i32(v: i32) -> Option<Self> {
        use Severity::*;
        let s = match v {
            0 => Unknown,
            10 => Trace,
            11 => Trace2,
            12 => Trace3,
            13 => Trace4,
            20 => Debug,
            21 => Debug2,
            22 => Debug3,
            23 => Debug4,
            30 => Info,
            31 => Info2,
            32 => Info3,
            33 => Info4,
            40 => Warning,
            41 => Warning2,
            42 => Warning3,
            43 => Warning4,
            50 => Error,
            51 => Error2,
            52 => Error3,
            53 => Error4,
            60 => Fatal,
            61 => Fatal2,
            62 => Fatal3,
            63 => Fatal4,
            _ => return None,
        };
        Some(s)
    }

    /// Canonical lowercase name
    pub fn as_str(self) -> &'static str {
        use Severity::*;
        match self {
            Unknown => "unknown",
            Trace => "trace",
            Trace2 => "trace2",
            Trace3 => "trace3",
            Trace4 => "trace4",
            Debug => "debug",
            Debug2 => "debug2",
            Debug3 => "debug3",
            Debug4 => "debug4",
            Info => "info",
            Info2 => "info2",
            Info3 => "info3",
            Info4 => "info4",
            Warning => "warning",
            Warning2 => "warning2",
            Warning3 => "warning3",
            Warning4 => "warning4",
            Error => "error",
            Error2 => "error2",
            Error3 => "error3",
            Error4 => "error4",
            Fatal => "fatal",
            Fatal2 => "fatal2",
            Fatal3 => "fatal3",
            Fatal4 => "fatal4",
        }
    }
}

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Severity {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_i32().cmp(&other.as_i32())
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    /// Parse a case-insensitive level name ("warn" accepted for
    /// "warning", "err" for "error") or a numeric value.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        if let Ok(n) = lower.parse::<i32>() {
            return Severity::from_i32(n).ok_or_else(|| format!("unknown severity value '{s}'"));
        }
        let mapped = match lower.as_str() {
            "warn" => "warning",
            "err" => "error",
            other => other,
        };
        use Severity::*;
        for candidate in [
            Unknown, Trace, Trace2, Trace3, Trace4, Debug, Debug2, Debug3, Debug4, Info, Info2,
            Info3, Info4, Warning, Warning2, Warning3, Warning4, Error, Error2, Error3, Error4,
            Fatal, Fatal2, Fatal3, Fatal4,
        ] {
            if candidate.as_str() == mapped {
                return Ok(candidate);
            }
        }
        Err(format!("unknown severity '{s}'"))
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(i32),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Num(n) => Severity::from_i32(n)
                .ok_or_else(|| de::Error::custom(format!("unknown severity value '{n}'"))),
            Raw::Text(t) => t.parse().map_err(de::Error::custom),
        }
    }
}
