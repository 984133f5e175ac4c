//! Regex parser
//!
//! Parses a string or byte value with a regex, producing a map keyed by
//! the pattern's named capture groups.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use stave_entry::{Entry, Value};
use stave_operator::helper::{BasicConfig, ParserConfig, ParserOperator, WriterConfig};
use stave_operator::{BuildContext, Operator, OperatorBuilder, OperatorError, Result};

#[cfg(test)]
#[path = "regex_test.rs"]
mod tests;

/// Configuration for the regex parser
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegexParserConfig {
    #[serde(flatten)]
    pub parser: ParserConfig,

    /// Pattern with at least one named capture group
    #[serde(default)]
    pub regex: String,
}

impl RegexParserConfig {
    /// Create a config with the given id and pattern
    pub fn new(id: impl Into<String>, regex: impl Into<String>) -> Self {
        Self {
            parser: ParserConfig::new(id, "regex_parser"),
            regex: regex.into(),
        }
    }
}

impl OperatorBuilder for RegexParserConfig {
    fn basic(&self) -> &BasicConfig {
        &self.parser.transformer.writer.basic
    }

    fn basic_mut(&mut self) -> &mut BasicConfig {
        &mut self.parser.transformer.writer.basic
    }

    fn writer(&self) -> Option<&WriterConfig> {
        Some(&self.parser.transformer.writer)
    }

    fn writer_mut(&mut self) -> Option<&mut WriterConfig> {
        Some(&mut self.parser.transformer.writer)
    }

    fn build(&self, _context: &BuildContext) -> Result<Vec<Arc<dyn Operator>>> {
        if self.regex.is_empty() {
            return Err(OperatorError::config("missing required field 'regex'"));
        }
        let compiled = Regex::new(&self.regex)
            .map_err(|e| OperatorError::config(format!("compiling regex: {e}")))?;
        if compiled.capture_names().flatten().count() == 0 {
            return Err(OperatorError::config(
                "no named capture groups in regex pattern; use named groups like '(?P<my_key>.*)' \
                 to name the parsed fields",
            ));
        }
        Ok(vec![Arc::new(RegexParser {
            parser: self.parser.build()?,
            regex: compiled,
        })])
    }
}

/// Operator that parses entries with a regex
pub struct RegexParser {
    parser: ParserOperator,
    regex: Regex,
}

impl RegexParser {
    fn parse(&self, value: &Value) -> Result<Value> {
        let captures = match value {
            Value::String(s) => self.regex.captures(s),
            Value::Bytes(b) => {
                let text = std::str::from_utf8(b).map_err(|_| {
                    OperatorError::transform("bytes are not valid UTF-8".to_owned())
                })?;
                self.regex.captures(text)
            }
            other => {
                return Err(OperatorError::transform(format!(
                    "type {other:?} cannot be parsed as regex"
                )))
            }
        }
        .ok_or_else(|| OperatorError::transform("regex pattern does not match"))?;

        let mut parsed = std::collections::BTreeMap::new();
        for name in self.regex.capture_names().flatten() {
            if let Some(capture) = captures.name(name) {
                parsed.insert(name.to_owned(), Value::from(capture.as_str()));
            }
        }
        Ok(Value::Map(parsed))
    }
}

#[async_trait]
impl Operator for RegexParser {
    fn id(&self) -> String {
        self.parser.transformer.writer.id()
    }

    fn operator_type(&self) -> &str {
        self.parser.transformer.writer.operator_type()
    }

    fn can_process(&self) -> bool {
        true
    }

    fn can_output(&self) -> bool {
        true
    }

    async fn start(&self) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }

    fn outputs(&self) -> Vec<Arc<dyn Operator>> {
        self.parser.transformer.writer.outputs()
    }

    fn set_outputs(&self, candidates: &[Arc<dyn Operator>]) -> Result<()> {
        self.parser.transformer.writer.set_outputs(candidates)
    }

    async fn process(&self, entry: Entry) -> Result<()> {
        self.parser
            .process_with(entry, |value| self.parse(value))
            .await
    }
}
