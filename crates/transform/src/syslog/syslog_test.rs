//! Syslog parser tests

use std::sync::Arc;

use chrono::{Datelike, TimeZone, Utc};
use stave_operator::helper::OutputIds;
use stave_operator::BuildContext;

use super::*;
use crate::testutil::Recorder;

fn build(protocol: SyslogProtocol) -> (Arc<dyn Operator>, Arc<Recorder>) {
    let mut config = SyslogParserConfig::new("syslog1", protocol);
    config.parser.transformer.writer.output = OutputIds(vec!["sink".to_owned()]);

    let ops = config.build(&BuildContext::in_memory()).unwrap();
    let sink = Recorder::new();
    ops[0]
        .set_outputs(&[sink.clone() as Arc<dyn Operator>])
        .unwrap();
    (ops[0].clone(), sink)
}

/// The year an RFC3164 "Jan 12 06:30:00" resolves to right now
fn expected_year(month: u32, day: u32, hour: u32, minute: u32, second: u32) -> i32 {
    let now = Utc::now();
    let this_year = Utc
        .with_ymd_and_hms(now.year(), month, day, hour, minute, second)
        .unwrap();
    if this_year > now + chrono::Duration::days(7) {
        now.year() - 1
    } else {
        now.year()
    }
}

#[tokio::test]
async fn rfc3164_literal_message() {
    let (parser, sink) = build(SyslogProtocol::Rfc3164);

    parser
        .process(Entry::from_record(Value::from(
            "<34>Jan 12 06:30:00 1.2.3.4 apache_server: test message",
        )))
        .await
        .unwrap();

    let received = sink.received.lock();
    let record = received[0].record.as_map().unwrap();
    assert_eq!(record.get("priority"), Some(&Value::Int(34)));
    assert_eq!(record.get("facility"), Some(&Value::Int(4)));
    assert_eq!(record.get("severity"), Some(&Value::Int(2)));
    assert_eq!(record.get("hostname"), Some(&Value::from("1.2.3.4")));
    assert_eq!(record.get("appname"), Some(&Value::from("apache_server")));
    assert_eq!(record.get("message"), Some(&Value::from("test message")));

    let year = expected_year(1, 12, 6, 30, 0);
    let expected = Utc.with_ymd_and_hms(year, 1, 12, 6, 30, 0).unwrap();
    assert_eq!(record.get("timestamp"), Some(&Value::Timestamp(expected)));
    // Promoted to the entry timestamp by the default native time parser.
    assert_eq!(received[0].timestamp, expected);
}

#[tokio::test]
async fn rfc3164_with_proc_id() {
    let (parser, sink) = build(SyslogProtocol::Rfc3164);

    parser
        .process(Entry::from_record(Value::from(
            "<13>Feb  5 17:32:18 host app[245]: starting up",
        )))
        .await
        .unwrap();

    let received = sink.received.lock();
    let record = received[0].record.as_map().unwrap();
    assert_eq!(record.get("appname"), Some(&Value::from("app")));
    assert_eq!(record.get("proc_id"), Some(&Value::from("245")));
    assert_eq!(record.get("message"), Some(&Value::from("starting up")));
}

#[tokio::test]
async fn rfc3164_from_bytes() {
    let (parser, sink) = build(SyslogProtocol::Rfc3164);

    parser
        .process(Entry::from_record(Value::Bytes(
            b"<34>Jan 12 06:30:00 1.2.3.4 apache_server: test message".to_vec(),
        )))
        .await
        .unwrap();

    let received = sink.received.lock();
    let record = received[0].record.as_map().unwrap();
    assert_eq!(record.get("priority"), Some(&Value::Int(34)));
}

#[tokio::test]
async fn rfc5424_full_message() {
    let (parser, sink) = build(SyslogProtocol::Rfc5424);

    parser
        .process(Entry::from_record(Value::from(
            "<165>1 2003-10-11T22:14:15.003Z mymachine.example.com evntslog 111 ID47 \
             [exampleSDID@32473 iut=\"3\" eventSource=\"Application\" eventID=\"1011\"] \
             An application event log entry",
        )))
        .await
        .unwrap();

    let received = sink.received.lock();
    let record = received[0].record.as_map().unwrap();
    assert_eq!(record.get("priority"), Some(&Value::Int(165)));
    assert_eq!(record.get("facility"), Some(&Value::Int(20)));
    assert_eq!(record.get("severity"), Some(&Value::Int(5)));
    assert_eq!(record.get("version"), Some(&Value::Int(1)));
    assert_eq!(
        record.get("hostname"),
        Some(&Value::from("mymachine.example.com"))
    );
    assert_eq!(record.get("appname"), Some(&Value::from("evntslog")));
    assert_eq!(record.get("proc_id"), Some(&Value::from("111")));
    assert_eq!(record.get("msg_id"), Some(&Value::from("ID47")));
    assert_eq!(
        record.get("message"),
        Some(&Value::from("An application event log entry"))
    );

    let sd = record.get("structured_data").unwrap().as_map().unwrap();
    let element = sd.get("exampleSDID@32473").unwrap().as_map().unwrap();
    assert_eq!(element.get("iut"), Some(&Value::from("3")));
    assert_eq!(element.get("eventSource"), Some(&Value::from("Application")));
    assert_eq!(element.get("eventID"), Some(&Value::from("1011")));

    let expected = Utc.with_ymd_and_hms(2003, 10, 11, 22, 14, 15).unwrap()
        + chrono::Duration::milliseconds(3);
    assert_eq!(received[0].timestamp, expected);
}

#[tokio::test]
async fn rfc5424_nil_fields_are_omitted() {
    let (parser, sink) = build(SyslogProtocol::Rfc5424);

    parser
        .process(Entry::from_record(Value::from(
            "<34>1 2018-01-01T00:00:00Z - - - - - standalone message",
        )))
        .await
        .unwrap();

    let received = sink.received.lock();
    let record = received[0].record.as_map().unwrap();
    assert!(!record.contains_key("hostname"));
    assert!(!record.contains_key("appname"));
    assert!(!record.contains_key("proc_id"));
    assert!(!record.contains_key("msg_id"));
    assert!(!record.contains_key("structured_data"));
    assert_eq!(
        record.get("message"),
        Some(&Value::from("standalone message"))
    );
}

#[tokio::test]
async fn rfc5424_escaped_structured_data_values() {
    let (parser, sink) = build(SyslogProtocol::Rfc5424);

    parser
        .process(Entry::from_record(Value::from(
            "<34>1 2018-01-01T00:00:00Z host app - - [sd@1 k=\"say \\\"hi\\\"\"] m",
        )))
        .await
        .unwrap();

    let received = sink.received.lock();
    let record = received[0].record.as_map().unwrap();
    let sd = record.get("structured_data").unwrap().as_map().unwrap();
    let element = sd.get("sd@1").unwrap().as_map().unwrap();
    assert_eq!(element.get("k"), Some(&Value::from("say \"hi\"")));
}

#[tokio::test]
async fn garbage_input_follows_on_error() {
    let mut config = SyslogParserConfig::new("syslog1", SyslogProtocol::Rfc3164);
    config.parser.transformer.writer.output = OutputIds(vec!["sink".to_owned()]);
    config.parser.transformer.on_error = stave_operator::helper::OnError::Drop;

    let ops = config.build(&BuildContext::in_memory()).unwrap();
    let sink = Recorder::new();
    ops[0]
        .set_outputs(&[sink.clone() as Arc<dyn Operator>])
        .unwrap();

    ops[0]
        .process(Entry::from_record(Value::from("not syslog at all")))
        .await
        .unwrap();

    assert!(sink.received.lock().is_empty());
}

#[test]
fn build_requires_protocol() {
    let config = SyslogParserConfig::default();
    assert!(config.build(&BuildContext::in_memory()).is_err());
}

#[test]
fn deserializes_from_yaml() {
    let config: SyslogParserConfig =
        serde_yaml::from_str("type: syslog_parser\nprotocol: rfc5424\n").unwrap();
    assert_eq!(config.protocol, Some(SyslogProtocol::Rfc5424));
}

#[test]
fn year_resolution_shifts_future_dates_back() {
    let now = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
    // Dec 31 parsed on Jan 1 must land in the previous year.
    let resolved = resolve_year(now, 12, 31, 23, 0, 0).unwrap();
    assert_eq!(resolved.year(), 2020);
    // Jan 3 parsed on Jan 1 is within the 7-day window: current year.
    let resolved = resolve_year(now, 1, 3, 0, 0, 0).unwrap();
    assert_eq!(resolved.year(), 2021);
}
