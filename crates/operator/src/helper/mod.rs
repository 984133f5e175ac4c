//! Shared operator behavior
//!
//! Concrete operators are composed from these mixins and delegate the
//! [`crate::Operator`] trait methods to them:
//!
//! - [`BasicOperator`] - id, type, namespacing
//! - [`WriterOperator`] - wired downstreams and copy-on-fan-out emission
//! - [`TransformerOperator`] - per-entry function with the `on_error`
//!   policy
//! - [`ParserOperator`] - `parse_from`/`parse_to` with atomic writes and
//!   optional timestamp/severity sub-parsers
//! - [`InputOperator`] - entry creation with configured labels/resource
//! - [`OutputOperator`] - terminal operators that only process

mod basic;
mod input;
mod output;
mod parser;
mod severity_parser;
mod time_parser;
mod transformer;
mod writer;

pub use basic::{add_namespace, can_namespace, BasicConfig, BasicOperator};
pub use input::{InputConfig, InputOperator};
pub use output::{OutputConfig, OutputOperator};
pub use parser::{OnMissing, ParserConfig, ParserOperator};
pub use severity_parser::{SeverityParser, SeverityParserConfig};
pub use time_parser::{LayoutType, TimeParser, TimeParserConfig};
pub use transformer::{OnError, TransformerConfig, TransformerOperator};
pub use writer::{OutputIds, WriterConfig, WriterOperator};
