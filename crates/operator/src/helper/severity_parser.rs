//! Severity sub-parser
//!
//! Maps a field of the parsed output onto the severity scale. The
//! mapping is keyed by severity name, each entry listing the raw values
//! that should resolve to it; unmapped values fall back to the standard
//! level names and numeric values.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use stave_entry::{Entry, Field, Severity};

use crate::error::{OperatorError, Result};

/// Raw values mapped to one severity, a scalar or a list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MappingValues {
    One(String),
    Many(Vec<String>),
}

/// Severity sub-parser configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeverityParserConfig {
    /// Field holding the raw severity
    pub parse_from: Field,

    /// severity name -> raw value(s), matched case-insensitively
    #[serde(default)]
    pub mapping: HashMap<String, MappingValues>,
}

impl SeverityParserConfig {
    /// Validate the mapping and build the severity parser
    pub fn build(&self) -> Result<SeverityParser> {
        let mut lookup = HashMap::new();
        for (severity_name, values) in &self.mapping {
            let severity: Severity = severity_name
                .parse()
                .map_err(|e: String| OperatorError::config(e))?;
            let raw_values = match values {
                MappingValues::One(v) => std::slice::from_ref(v).to_vec(),
                MappingValues::Many(vs) => vs.clone(),
            };
            for raw in raw_values {
                lookup.insert(raw.to_ascii_lowercase(), severity);
            }
        }
        Ok(SeverityParser {
            parse_from: self.parse_from.clone(),
            mapping: lookup,
        })
    }
}

/// Built severity sub-parser
#[derive(Debug, Clone)]
pub struct SeverityParser {
    parse_from: Field,
    mapping: HashMap<String, Severity>,
}

impl SeverityParser {
    /// Parse the configured field and set the entry severity
    pub fn apply(&self, entry: &mut Entry) -> Result<()> {
        let value = self
            .parse_from
            .get(entry)
            .ok_or_else(|| OperatorError::MissingField(self.parse_from.to_string()))?;
        let raw = value.coerce_string();

        let severity = match self.mapping.get(&raw.to_ascii_lowercase()) {
            Some(s) => *s,
            None => raw
                .parse()
                .map_err(|_| OperatorError::transform(format!("unrecognized severity '{raw}'")))?,
        };
        entry.severity = severity;
        Ok(())
    }
}
