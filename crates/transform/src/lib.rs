//! Stave - Transform
//!
//! Built-in transformers and parsers.
//!
//! # Overview
//!
//! Transformers modify entries in flight on the emitting source's task;
//! parsers read a field, produce structure, and write it back
//! atomically. All of them compose the shared operator mixins, so
//! `on_error`, `parse_from`/`parse_to`, and the timestamp/severity
//! sub-parsers behave identically across types.
//!
//! # Modules
//!
//! - `noop` - forwards entries unchanged
//! - `regex` - named-capture-group parsing into a map
//! - `syslog` - RFC3164 / RFC5424 parsing

pub mod noop;
pub mod regex;
pub mod syslog;

pub use self::noop::{NoopConfig, NoopTransformer};
pub use self::regex::{RegexParser, RegexParserConfig};
pub use self::syslog::{SyslogParser, SyslogParserConfig, SyslogProtocol};

#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use stave_entry::Entry;
    use stave_operator::{Operator, OperatorError, Result};

    /// Terminal operator recording everything it processes
    pub struct Recorder {
        pub received: Arc<Mutex<Vec<Entry>>>,
    }

    impl Recorder {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                received: Arc::new(Mutex::new(Vec::new())),
            })
        }
    }

    #[async_trait]
    impl Operator for Recorder {
        fn id(&self) -> String {
            "sink".to_owned()
        }

        fn operator_type(&self) -> &str {
            "recorder"
        }

        fn can_process(&self) -> bool {
            true
        }

        fn can_output(&self) -> bool {
            false
        }

        async fn start(&self) -> Result<()> {
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            Ok(())
        }

        fn outputs(&self) -> Vec<Arc<dyn Operator>> {
            Vec::new()
        }

        fn set_outputs(&self, _candidates: &[Arc<dyn Operator>]) -> Result<()> {
            Err(OperatorError::OutputUnsupported(self.id()))
        }

        async fn process(&self, entry: Entry) -> Result<()> {
            self.received.lock().push(entry);
            Ok(())
        }
    }
}
