//! Built-in operator registration

use stave_operator::OperatorRegistry;
use stave_sinks::{bulk::BulkOutputConfig, null::DropOutputConfig, stdout::StdoutConfig};
use stave_sources::{
    cloudlogs::CloudLogsConfig, file::FileInputConfig, stream::EventStreamConfig,
};
use stave_transform::{noop::NoopConfig, regex::RegexParserConfig, syslog::SyslogParserConfig};

/// Create a registry with every built-in operator registered
///
/// Sources:
/// - `file_input` - tail a file with configurable line splitting
/// - `cloud_logs_input` - interval-poll a cloud log API
/// - `event_stream_input` - consume a partitioned event bus
///
/// Transformers and parsers:
/// - `noop` - pass entries through unchanged
/// - `regex_parser` - named-capture-group parsing
/// - `syslog_parser` - RFC3164 / RFC5424 parsing
///
/// Sinks:
/// - `stdout` - one JSON line per entry
/// - `drop_output` - discard
/// - `bulk_output` - buffered batches to an injected bulk endpoint
pub fn default_registry() -> OperatorRegistry {
    let mut registry = OperatorRegistry::new();

    registry.register::<FileInputConfig>("file_input");
    registry.register::<CloudLogsConfig>("cloud_logs_input");
    registry.register::<EventStreamConfig>("event_stream_input");

    registry.register::<NoopConfig>("noop");
    registry.register::<RegexParserConfig>("regex_parser");
    registry.register::<SyslogParserConfig>("syslog_parser");

    registry.register::<StdoutConfig>("stdout");
    registry.register::<DropOutputConfig>("drop_output");
    registry.register::<BulkOutputConfig>("bulk_output");

    registry
}
