//! Timestamp sub-parser
//!
//! Parsers can promote a field of their parsed output to the entry
//! timestamp. Three layout types are supported: `strptime` (chrono
//! format strings), `epoch` (`s`, `ms`, `us`, `ns`), and `native`
//! (a timestamp value produced by an upstream parser).

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use stave_entry::{Entry, Field, Value};

use crate::error::{OperatorError, Result};

/// How the raw value encodes a timestamp
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutType {
    /// A chrono format string in `layout`
    #[default]
    Strptime,
    /// A numeric epoch; `layout` is the unit: `s`, `ms`, `us`, or `ns`
    Epoch,
    /// A timestamp value already parsed upstream
    Native,
}

/// Timestamp sub-parser configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeParserConfig {
    /// Field holding the raw timestamp
    pub parse_from: Field,

    /// Layout interpretation
    #[serde(default)]
    pub layout_type: LayoutType,

    /// Format string (`strptime`) or epoch unit (`epoch`)
    #[serde(default)]
    pub layout: String,
}

impl TimeParserConfig {
    /// Validate and build the time parser
    pub fn build(&self) -> Result<TimeParser> {
        match self.layout_type {
            LayoutType::Strptime => {
                if self.layout.is_empty() {
                    return Err(OperatorError::config(
                        "timestamp parser with layout_type 'strptime' requires 'layout'",
                    ));
                }
            }
            LayoutType::Epoch => {
                if !matches!(self.layout.as_str(), "s" | "ms" | "us" | "ns") {
                    return Err(OperatorError::config(format!(
                        "invalid epoch layout '{}', expected one of 's', 'ms', 'us', 'ns'",
                        self.layout
                    )));
                }
            }
            LayoutType::Native => {}
        }
        Ok(TimeParser {
            parse_from: self.parse_from.clone(),
            layout_type: self.layout_type,
            layout: self.layout.clone(),
        })
    }
}

/// Built timestamp sub-parser
#[derive(Debug, Clone)]
pub struct TimeParser {
    parse_from: Field,
    layout_type: LayoutType,
    layout: String,
}

impl TimeParser {
    /// A native-layout parser reading from the given field
    pub fn native(parse_from: Field) -> Self {
        Self {
            parse_from,
            layout_type: LayoutType::Native,
            layout: String::new(),
        }
    }

    /// Parse the configured field and set the entry timestamp
    ///
    /// A missing field is a transform error so the surrounding parser's
    /// `on_error` policy decides the entry's fate.
    pub fn apply(&self, entry: &mut Entry) -> Result<()> {
        let value = self
            .parse_from
            .get(entry)
            .ok_or_else(|| OperatorError::MissingField(self.parse_from.to_string()))?;
        entry.timestamp = self.parse_value(&value)?;
        Ok(())
    }

    fn parse_value(&self, value: &Value) -> Result<DateTime<Utc>> {
        match self.layout_type {
            LayoutType::Native => match value {
                Value::Timestamp(t) => Ok(*t),
                other => Err(OperatorError::transform(format!(
                    "expected a native timestamp, got {other:?}"
                ))),
            },
            LayoutType::Strptime => {
                let raw = value.coerce_string();
                if let Ok(t) = DateTime::parse_from_str(&raw, &self.layout) {
                    return Ok(t.with_timezone(&Utc));
                }
                NaiveDateTime::parse_from_str(&raw, &self.layout)
                    .map(|naive| naive.and_utc())
                    .map_err(|e| {
                        OperatorError::transform(format!(
                            "time '{raw}' does not match layout '{}': {e}",
                            self.layout
                        ))
                    })
            }
            LayoutType::Epoch => {
                let ticks = match value {
                    Value::Int(i) => *i,
                    Value::Float(f) => *f as i64,
                    Value::String(s) => s.trim().parse::<i64>().map_err(|_| {
                        OperatorError::transform(format!("'{s}' is not an epoch value"))
                    })?,
                    other => {
                        return Err(OperatorError::transform(format!(
                            "cannot parse {other:?} as an epoch value"
                        )))
                    }
                };
                let ts = match self.layout.as_str() {
                    "s" => Utc.timestamp_opt(ticks, 0).single(),
                    "ms" => DateTime::from_timestamp_millis(ticks),
                    "us" => DateTime::from_timestamp_micros(ticks),
                    "ns" => Some(DateTime::from_timestamp_nanos(ticks)),
                    _ => None,
                };
                ts.ok_or_else(|| {
                    OperatorError::transform(format!("epoch value {ticks} is out of range"))
                })
            }
        }
    }
}
