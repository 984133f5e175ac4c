//! Syslog parser
//!
//! Parses RFC3164 (BSD) and RFC5424 syslog messages into structured
//! records. Absent fields are omitted rather than set to null, and the
//! parsed timestamp is promoted to the entry timestamp through the
//! parser mixin's native time parser.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration as ChronoDuration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use stave_entry::{Entry, Field, Value};
use stave_operator::helper::{
    BasicConfig, ParserConfig, ParserOperator, TimeParser, WriterConfig,
};
use stave_operator::{BuildContext, Operator, OperatorBuilder, OperatorError, Result};

#[cfg(test)]
#[path = "syslog_test.rs"]
mod tests;

/// Supported syslog protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyslogProtocol {
    Rfc3164,
    Rfc5424,
}

/// Configuration for the syslog parser
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyslogParserConfig {
    #[serde(flatten)]
    pub parser: ParserConfig,

    /// Which RFC the input follows
    pub protocol: Option<SyslogProtocol>,
}

impl SyslogParserConfig {
    /// Create a config with the given id and protocol
    pub fn new(id: impl Into<String>, protocol: SyslogProtocol) -> Self {
        Self {
            parser: ParserConfig::new(id, "syslog_parser"),
            protocol: Some(protocol),
        }
    }
}

impl Default for SyslogParserConfig {
    fn default() -> Self {
        Self {
            parser: ParserConfig::new("", "syslog_parser"),
            protocol: None,
        }
    }
}

impl OperatorBuilder for SyslogParserConfig {
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
        let protocol = self
            .protocol
            .ok_or_else(|| OperatorError::config("missing required field 'protocol'"))?;

        // The parsed record carries a native timestamp; promote it to
        // the entry timestamp unless the user configured their own.
        let parser = self
            .parser
            .build()?
            .with_default_time_parser(TimeParser::native(Field::record(["timestamp"])));

        Ok(vec![Arc::new(SyslogParser { parser, protocol })])
    }
}

/// Operator that parses syslog messages
pub struct SyslogParser {
    parser: ParserOperator,
    protocol: SyslogProtocol,
}

impl SyslogParser {
    fn parse(&self, value: &Value) -> Result<Value> {
        let text = match value {
            Value::String(s) => s.as_str(),
            Value::Bytes(b) => std::str::from_utf8(b)
                .map_err(|_| OperatorError::transform("message is not valid UTF-8"))?,
            other => {
                return Err(OperatorError::transform(format!(
                    "cannot parse {other:?} as syslog"
                )))
            }
        };
        match self.protocol {
            SyslogProtocol::Rfc3164 => parse_rfc3164(text, Utc::now()),
            SyslogProtocol::Rfc5424 => parse_rfc5424(text),
        }
    }
}

#[async_trait]
impl Operator for SyslogParser {
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

fn transform_err(msg: &str) -> OperatorError {
    OperatorError::transform(msg.to_owned())
}

/// Read the `<pri>` header, returning (priority, remainder)
fn parse_priority(input: &str) -> Result<(i64, &str)> {
    let rest = input
        .strip_prefix('<')
        .ok_or_else(|| transform_err("message does not start with a priority"))?;
    let end = rest
        .find('>')
        .ok_or_else(|| transform_err("unterminated priority"))?;
    let priority: i64 = rest[..end]
        .parse()
        .map_err(|_| transform_err("priority is not a number"))?;
    if !(0..=191).contains(&priority) {
        return Err(transform_err("priority out of range"));
    }
    Ok((priority, &rest[end + 1..]))
}

fn month_number(name: &str) -> Option<u32> {
    let n = match name {
        "Jan" => 1,
        "Feb" => 2,
        "Mar" => 3,
        "Apr" => 4,
        "May" => 5,
        "Jun" => 6,
        "Jul" => 7,
        "Aug" => 8,
        "Sep" => 9,
        "Oct" => 10,
        "Nov" => 11,
        "Dec" => 12,
        _ => return None,
    };
    Some(n)
}

/// Resolve an RFC3164 timestamp (which has no year) against `now`
///
/// The current year is assumed; if that would put the timestamp more
/// than 7 days in the future, it is shifted one year back.
fn resolve_year(
    now: DateTime<Utc>,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
) -> Result<DateTime<Utc>> {
    let this_year = Utc
        .with_ymd_and_hms(now.year(), month, day, hour, minute, second)
        .single()
        .ok_or_else(|| transform_err("invalid timestamp"))?;
    if this_year > now + ChronoDuration::days(7) {
        return Utc
            .with_ymd_and_hms(now.year() - 1, month, day, hour, minute, second)
            .single()
            .ok_or_else(|| transform_err("invalid timestamp"));
    }
    Ok(this_year)
}

/// Parse an RFC3164 message: `<pri>Mmm dd hh:mm:ss host tag: content`
fn parse_rfc3164(input: &str, now: DateTime<Utc>) -> Result<Value> {
    let (priority, rest) = parse_priority(input)?;

    // Timestamp is a fixed-width 15-character field; the day of month
    // may be space-padded ("Jan  2 06:30:00").
    let ts_text = rest
        .get(0..15)
        .ok_or_else(|| transform_err("message too short for an RFC3164 timestamp"))?;
    let rest = &rest[15..];
    if !ts_text.is_ascii() {
        return Err(transform_err("invalid characters in timestamp"));
    }
    let month = month_number(&ts_text[0..3])
        .ok_or_else(|| transform_err("invalid month in timestamp"))?;
    let day: u32 = ts_text[4..6]
        .trim_start()
        .parse()
        .map_err(|_| transform_err("invalid day in timestamp"))?;
    let hour: u32 = ts_text[7..9]
        .parse()
        .map_err(|_| transform_err("invalid hour in timestamp"))?;
    let minute: u32 = ts_text[10..12]
        .parse()
        .map_err(|_| transform_err("invalid minute in timestamp"))?;
    let second: u32 = ts_text[13..15]
        .parse()
        .map_err(|_| transform_err("invalid second in timestamp"))?;
    let timestamp = resolve_year(now, month, day, hour, minute, second)?;

    let rest = rest
        .strip_prefix(' ')
        .ok_or_else(|| transform_err("expected a space after the timestamp"))?;

    let (hostname, rest) = rest
        .split_once(' ')
        .ok_or_else(|| transform_err("missing hostname"))?;

    // Tag: `appname: msg`, `appname[pid]: msg`, or bare content.
    let mut map = BTreeMap::new();
    map.insert("timestamp".to_owned(), Value::Timestamp(timestamp));
    map.insert("priority".to_owned(), Value::Int(priority));
    map.insert("facility".to_owned(), Value::Int(priority / 8));
    map.insert("severity".to_owned(), Value::Int(priority % 8));
    map.insert("hostname".to_owned(), Value::from(hostname));

    let tag_end = rest.find([':', '[', ' ']).unwrap_or(rest.len());
    let (appname, after_tag) = rest.split_at(tag_end);
    if !appname.is_empty() {
        map.insert("appname".to_owned(), Value::from(appname));
    }

    let mut content = after_tag;
    if let Some(after_bracket) = content.strip_prefix('[') {
        let (proc_id, after) = after_bracket
            .split_once(']')
            .ok_or_else(|| transform_err("unterminated process id"))?;
        map.insert("proc_id".to_owned(), Value::from(proc_id));
        content = after;
    }
    content = content.strip_prefix(':').unwrap_or(content);
    content = content.strip_prefix(' ').unwrap_or(content);
    if !content.is_empty() {
        map.insert("message".to_owned(), Value::from(content));
    }

    Ok(Value::Map(map))
}

/// Split the next space-delimited header token; `-` means absent
fn next_token<'a>(input: &'a str, what: &str) -> Result<(Option<&'a str>, &'a str)> {
    if input.is_empty() {
        return Err(OperatorError::transform(format!("missing {what}")));
    }
    let (token, rest) = match input.split_once(' ') {
        Some((t, r)) => (t, r),
        None => (input, ""),
    };
    if token == "-" {
        Ok((None, rest))
    } else {
        Ok((Some(token), rest))
    }
}

/// Parse RFC5424 structured data: `-` or one or more `[id k="v" ...]`
fn parse_structured_data(input: &str) -> Result<(Option<Value>, &str)> {
    if let Some(rest) = input.strip_prefix('-') {
        return Ok((None, rest));
    }

    let mut elements = BTreeMap::new();
    let mut rest = input;
    while let Some(inner) = rest.strip_prefix('[') {
        let (sd_id, mut body) = match inner.find([' ', ']']) {
            Some(pos) => (&inner[..pos], &inner[pos..]),
            None => return Err(transform_err("unterminated structured data element")),
        };

        let mut params = BTreeMap::new();
        loop {
            body = body.trim_start_matches(' ');
            if let Some(after) = body.strip_prefix(']') {
                rest = after;
                break;
            }
            let eq = body
                .find('=')
                .ok_or_else(|| transform_err("malformed structured data parameter"))?;
            let key = &body[..eq];
            let value_part = body[eq + 1..]
                .strip_prefix('"')
                .ok_or_else(|| transform_err("structured data value must be quoted"))?;

            // Scan for the closing quote, honoring backslash escapes.
            let mut value = String::new();
            let mut chars = value_part.char_indices();
            let mut consumed = None;
            while let Some((i, c)) = chars.next() {
                match c {
                    '\\' => {
                        if let Some((_, escaped)) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    '"' => {
                        consumed = Some(i + 1);
                        break;
                    }
                    _ => value.push(c),
                }
            }
            let consumed =
                consumed.ok_or_else(|| transform_err("unterminated structured data value"))?;
            params.insert(key.to_owned(), Value::from(value));
            body = &value_part[consumed..];
        }
        elements.insert(sd_id.to_owned(), Value::Map(params));
    }

    if elements.is_empty() {
        return Err(transform_err("malformed structured data"));
    }
    Ok((Some(Value::Map(elements)), rest))
}

/// Parse an RFC5424 message:
/// `<pri>version timestamp host app procid msgid sd msg`
fn parse_rfc5424(input: &str) -> Result<Value> {
    let (priority, rest) = parse_priority(input)?;

    let (version_text, rest) = rest
        .split_once(' ')
        .ok_or_else(|| transform_err("missing version"))?;
    let version: i64 = version_text
        .parse()
        .map_err(|_| transform_err("version is not a number"))?;

    let (timestamp_text, rest) = next_token(rest, "timestamp")?;
    let (hostname, rest) = next_token(rest, "hostname")?;
    let (appname, rest) = next_token(rest, "appname")?;
    let (proc_id, rest) = next_token(rest, "proc_id")?;
    let (msg_id, rest) = next_token(rest, "msg_id")?;
    let (structured_data, rest) = parse_structured_data(rest)?;

    let mut map = BTreeMap::new();
    map.insert("priority".to_owned(), Value::Int(priority));
    map.insert("facility".to_owned(), Value::Int(priority / 8));
    map.insert("severity".to_owned(), Value::Int(priority % 8));
    map.insert("version".to_owned(), Value::Int(version));

    if let Some(ts) = timestamp_text {
        let parsed = DateTime::parse_from_rfc3339(ts)
            .map_err(|e| OperatorError::transform(format!("invalid timestamp '{ts}': {e}")))?;
        map.insert(
            "timestamp".to_owned(),
            Value::Timestamp(parsed.with_timezone(&Utc)),
        );
    }
    if let Some(hostname) = hostname {
        map.insert("hostname".to_owned(), Value::from(hostname));
    }
    if let Some(appname) = appname {
        map.insert("appname".to_owned(), Value::from(appname));
    }
    if let Some(proc_id) = proc_id {
        map.insert("proc_id".to_owned(), Value::from(proc_id));
    }
    if let Some(msg_id) = msg_id {
        map.insert("msg_id".to_owned(), Value::from(msg_id));
    }
    if let Some(sd) = structured_data {
        map.insert("structured_data".to_owned(), sd);
    }

    let message = rest.strip_prefix(' ').unwrap_or(rest);
    if !message.is_empty() {
        map.insert("message".to_owned(), Value::from(message));
    }

    Ok(Value::Map(map))
}
