//! Parser mixin tests

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use stave_entry::{Entry, Field, Severity, Value};

use super::*;
use crate::error::{OperatorError, Result};
use crate::helper::transformer::OnError;
use crate::helper::writer::OutputIds;
use crate::helper::{LayoutType, SeverityParserConfig, TimeParserConfig};
use crate::Operator;

struct Recorder {
    received: Arc<Mutex<Vec<Entry>>>,
}

impl Recorder {
    fn new() -> Arc<Self> {
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

fn build_parser(configure: impl FnOnce(&mut ParserConfig)) -> (ParserOperator, Arc<Recorder>) {
    let mut config = ParserConfig::new("p1", "test_parser");
    config.transformer.writer.output = OutputIds(vec!["sink".to_owned()]);
    configure(&mut config);
    let built = config.build().unwrap();

    let sink = Recorder::new();
    built
        .transformer
        .writer
        .set_outputs(&[sink.clone() as Arc<dyn Operator>])
        .unwrap();
    (built, sink)
}

fn entry_with_field(field: &Field, value: Value) -> Entry {
    let mut entry = Entry::new();
    field.set(&mut entry, value);
    entry
}

#[tokio::test]
async fn parses_into_parse_to() {
    let (parser, sink) = build_parser(|c| {
        c.parse_from = Field::record(["raw"]);
        c.parse_to = Field::record(["parsed"]);
    });

    let entry = entry_with_field(&Field::record(["raw"]), Value::from("a=b"));
    parser
        .process_with(entry, |_| {
            Ok([("a".to_owned(), Value::from("b"))].into_iter().collect())
        })
        .await
        .unwrap();

    let received = sink.received.lock();
    assert_eq!(
        Field::record(["parsed", "a"]).get(&received[0]),
        Some(Value::from("b"))
    );
    // parse_from is deleted by default
    assert_eq!(Field::record(["raw"]).get(&received[0]), None);
}

#[tokio::test]
async fn preserve_keeps_the_raw_value() {
    let (parser, sink) = build_parser(|c| {
        c.parse_from = Field::record(["raw"]);
        c.parse_to = Field::record(["parsed"]);
        c.preserve = true;
    });

    let entry = entry_with_field(&Field::record(["raw"]), Value::from("a=b"));
    parser
        .process_with(entry, |_| Ok(Value::from("ok")))
        .await
        .unwrap();

    let received = sink.received.lock();
    assert_eq!(
        Field::record(["raw"]).get(&received[0]),
        Some(Value::from("a=b"))
    );
}

#[tokio::test]
async fn failed_parse_leaves_entry_untouched() {
    let (parser, sink) = build_parser(|c| {
        c.parse_from = Field::record(["raw"]);
        c.transformer.on_error = OnError::Send;
    });

    let entry = entry_with_field(&Field::record(["raw"]), Value::from("junk"));
    parser
        .process_with(entry, |_| Err(OperatorError::transform("no match")))
        .await
        .unwrap();

    // The source value survives because the parse is atomic.
    let received = sink.received.lock();
    assert_eq!(
        Field::record(["raw"]).get(&received[0]),
        Some(Value::from("junk"))
    );
}

#[tokio::test]
async fn missing_parse_from_follows_on_error_drop() {
    let (parser, sink) = build_parser(|c| {
        c.parse_from = Field::record(["absent"]);
        c.transformer.on_error = OnError::Drop;
    });

    parser
        .process_with(Entry::new(), |_| Ok(Value::from("never")))
        .await
        .unwrap();

    assert!(sink.received.lock().is_empty());
}

#[tokio::test]
async fn on_missing_send_forwards_unparsed() {
    let (parser, sink) = build_parser(|c| {
        c.parse_from = Field::record(["absent"]);
        c.on_missing = OnMissing::Send;
        // Even with drop-on-error, a missing field just passes through.
        c.transformer.on_error = OnError::Drop;
    });

    let entry = entry_with_field(&Field::record(["other"]), Value::from("kept"));
    parser
        .process_with(entry, |_| Err(OperatorError::transform("never runs")))
        .await
        .unwrap();

    let received = sink.received.lock();
    assert_eq!(received.len(), 1);
    assert_eq!(
        Field::record(["other"]).get(&received[0]),
        Some(Value::from("kept"))
    );
}

#[tokio::test]
async fn on_missing_drop_discards_quietly() {
    let (parser, sink) = build_parser(|c| {
        c.parse_from = Field::record(["absent"]);
        c.on_missing = OnMissing::Drop;
        c.transformer.on_error = OnError::Send;
    });

    parser
        .process_with(Entry::new(), |_| Ok(Value::from("never")))
        .await
        .unwrap();

    assert!(sink.received.lock().is_empty());
}

#[tokio::test]
async fn timestamp_sub_parser_sets_entry_timestamp() {
    let (parser, sink) = build_parser(|c| {
        c.parse_from = Field::record(["raw"]);
        c.timestamp = Some(TimeParserConfig {
            parse_from: Field::record(["ts"]),
            layout_type: LayoutType::Epoch,
            layout: "s".to_owned(),
        });
    });

    let entry = entry_with_field(&Field::record(["raw"]), Value::from("payload"));
    parser
        .process_with(entry, |_| {
            Ok([("ts".to_owned(), Value::Int(1_600_000_000))]
                .into_iter()
                .collect())
        })
        .await
        .unwrap();

    let received = sink.received.lock();
    assert_eq!(
        received[0].timestamp,
        Utc.timestamp_opt(1_600_000_000, 0).unwrap()
    );
}

#[tokio::test]
async fn severity_sub_parser_sets_entry_severity() {
    let (parser, sink) = build_parser(|c| {
        c.parse_from = Field::record(["raw"]);
        c.severity = Some(SeverityParserConfig {
            parse_from: Field::record(["sev"]),
            mapping: Default::default(),
        });
    });

    let entry = entry_with_field(&Field::record(["raw"]), Value::from("payload"));
    parser
        .process_with(entry, |_| {
            Ok([("sev".to_owned(), Value::from("error"))]
                .into_iter()
                .collect())
        })
        .await
        .unwrap();

    assert_eq!(sink.received.lock()[0].severity, Severity::Error);
}

#[tokio::test]
async fn default_time_parser_applies_only_when_unconfigured() {
    let ts = Utc.with_ymd_and_hms(2020, 5, 6, 7, 8, 9).unwrap();
    let mut config = ParserConfig::new("p1", "test_parser");
    config.parse_from = Field::record(["raw"]);
    config.transformer.writer.output = OutputIds(vec!["sink".to_owned()]);
    let built = config
        .build()
        .unwrap()
        .with_default_time_parser(TimeParser::native(Field::record(["timestamp"])));

    let sink = Recorder::new();
    built
        .transformer
        .writer
        .set_outputs(&[sink.clone() as Arc<dyn Operator>])
        .unwrap();

    let entry = entry_with_field(&Field::record(["raw"]), Value::from("x"));
    built
        .process_with(entry, move |_| {
            Ok([("timestamp".to_owned(), Value::Timestamp(ts))]
                .into_iter()
                .collect())
        })
        .await
        .unwrap();

    assert_eq!(sink.received.lock()[0].timestamp, ts);
}
