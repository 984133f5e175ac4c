//! Parser mixin: read a field, parse it, write the structured result
//!
//! Parsers layer onto transformers. The parse is atomic: nothing on the
//! entry changes unless the parse function succeeds, and a failed parse
//! is routed through the transformer's `on_error` policy.

use serde::{Deserialize, Serialize};
use stave_entry::{Entry, Field, Value};

use crate::error::{OperatorError, Result};
use crate::helper::severity_parser::{SeverityParser, SeverityParserConfig};
use crate::helper::time_parser::{TimeParser, TimeParserConfig};
use crate::helper::transformer::{TransformerConfig, TransformerOperator};

#[cfg(test)]
#[path = "parser_test.rs"]
mod tests;

/// What happens when `parse_from` is absent from the entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnMissing {
    /// Treat as a parse failure, routed through `on_error`
    #[default]
    Error,
    /// Forward the entry unparsed, without logging
    Send,
    /// Discard the entry quietly
    Drop,
}

/// Configuration shared by every parser operator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParserConfig {
    #[serde(flatten)]
    pub transformer: TransformerConfig,

    /// Field to read the raw value from; the whole record by default
    #[serde(default)]
    pub parse_from: Field,

    /// Field to write the parsed result to; the whole record by default
    #[serde(default)]
    pub parse_to: Field,

    /// Keep the raw value after a successful parse
    #[serde(default)]
    pub preserve: bool,

    /// Entry fate when `parse_from` is absent
    #[serde(default)]
    pub on_missing: OnMissing,

    /// Optional timestamp extraction from the parsed output
    #[serde(default)]
    pub timestamp: Option<TimeParserConfig>,

    /// Optional severity extraction from the parsed output
    #[serde(default)]
    pub severity: Option<SeverityParserConfig>,
}

impl ParserConfig {
    /// Create a parser config with the given id and type
    pub fn new(id: impl Into<String>, operator_type: impl Into<String>) -> Self {
        Self {
            transformer: TransformerConfig::new(id, operator_type),
            parse_from: Field::record_root(),
            parse_to: Field::record_root(),
            preserve: false,
            on_missing: OnMissing::default(),
            timestamp: None,
            severity: None,
        }
    }

    /// Validate and build the parser mixin
    pub fn build(&self) -> Result<ParserOperator> {
        let time_parser = self.timestamp.as_ref().map(|c| c.build()).transpose()?;
        let severity_parser = self.severity.as_ref().map(|c| c.build()).transpose()?;
        Ok(ParserOperator {
            transformer: self.transformer.build()?,
            parse_from: self.parse_from.clone(),
            parse_to: self.parse_to.clone(),
            preserve: self.preserve,
            on_missing: self.on_missing,
            time_parser,
            severity_parser,
        })
    }
}

/// Parser mixin held by operators that parse a field into structure
pub struct ParserOperator {
    pub transformer: TransformerOperator,
    parse_from: Field,
    parse_to: Field,
    preserve: bool,
    on_missing: OnMissing,
    time_parser: Option<TimeParser>,
    severity_parser: Option<SeverityParser>,
}

impl ParserOperator {
    /// Override the default timestamp sub-parser when none is configured
    ///
    /// Used by parsers whose output carries a native timestamp field.
    pub fn with_default_time_parser(mut self, parser: TimeParser) -> Self {
        if self.time_parser.is_none() {
            self.time_parser = Some(parser);
        }
        self
    }

    /// Parse the entry's `parse_from` value with `parse` and forward
    ///
    /// A failed parse is a transform error, so the `on_error` policy
    /// decides whether the unmodified entry is forwarded or dropped. A
    /// missing `parse_from` follows `on_missing`; by default it is
    /// treated as a parse failure too.
    pub async fn process_with<F>(&self, entry: Entry, parse: F) -> Result<()>
    where
        F: FnOnce(&Value) -> Result<Value>,
    {
        if self.parse_from.get(&entry).is_none() {
            match self.on_missing {
                OnMissing::Error => {}
                OnMissing::Send => {
                    self.transformer.writer.write(entry).await;
                    return Ok(());
                }
                OnMissing::Drop => return Ok(()),
            }
        }

        let transform = |e: &mut Entry| -> Result<()> {
            let raw = self
                .parse_from
                .get(e)
                .ok_or_else(|| OperatorError::MissingField(self.parse_from.to_string()))?;

            let parsed = parse(&raw)?;

            if !self.preserve {
                self.parse_from.delete(e);
            }
            self.parse_to.set(e, parsed);

            if let Some(time_parser) = &self.time_parser {
                time_parser.apply(e)?;
            }
            if let Some(severity_parser) = &self.severity_parser {
                severity_parser.apply(e)?;
            }
            Ok(())
        };
        self.transformer.process_with(entry, transform).await
    }
}
