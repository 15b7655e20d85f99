use memchr::memchr;
use serde_json::{Map, Value};

use super::timestamp::parse_json_time;
use super::{LineParser, LogFormat, LogRecord, ParseFailure, optional_field};

/// JSON-per-line access log parser
/// The object may be preceded by arbitrary text (syslog prefixes, container
/// headers); the first `{` from which the rest of the line parses as a
/// single object wins.
///
/// Recognised keys, first present alias wins:
/// ip: forwardedfor, remote_addr | path: path, request | status: code, status
/// size: size, bytes | user agent: agent, user_agent | time: time
pub struct JsonLineParser;

const IP_KEYS: &[&str] = &["forwardedfor", "remote_addr"];
const PATH_KEYS: &[&str] = &["path", "request"];
const STATUS_KEYS: &[&str] = &["code", "status"];
const SIZE_KEYS: &[&str] = &["size", "bytes"];
const AGENT_KEYS: &[&str] = &["agent", "user_agent"];

/// Find the first `{` that starts a complete JSON object running to the end
/// of the line
pub fn extract_json_block(line: &str) -> Option<Map<String, Value>> {
    let bytes = line.as_bytes();
    let mut start = memchr(b'{', bytes);
    while let Some(pos) = start {
        if let Ok(object) = serde_json::from_str::<Map<String, Value>>(line[pos..].trim()) {
            return Some(object);
        }
        start = memchr(b'{', &bytes[pos + 1..]).map(|i| pos + 1 + i);
    }
    None
}

fn text_field(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match object.get(*key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    })
}

/// Unsigned integers or digit-only strings; anything else reads as 0
fn numeric_field(object: &Map<String, Value>, keys: &[&str]) -> u64 {
    let value = keys
        .iter()
        .find_map(|key| object.get(*key).filter(|v| !v.is_null()));
    match value {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => super::numeric_or_zero(s),
        _ => 0,
    }
}

impl JsonLineParser {
    fn map_object(object: &Map<String, Value>, raw: &str) -> Result<LogRecord, ParseFailure> {
        let time = match object.get("time") {
            None | Some(Value::Null) => return Err(ParseFailure::MissingTimestamp),
            Some(Value::String(s)) if s.is_empty() => return Err(ParseFailure::MissingTimestamp),
            Some(Value::String(s)) => s.as_str(),
            Some(other) => return Err(ParseFailure::InvalidTimestamp(other.to_string())),
        };
        let timestamp =
            parse_json_time(time).ok_or_else(|| ParseFailure::InvalidTimestamp(time.to_string()))?;

        let mut record = LogRecord::new(timestamp, raw);
        if let Some(ip) = text_field(object, IP_KEYS) {
            record.ip = ip;
        }
        if let Some(method) = text_field(object, &["method"]) {
            record.method = method;
        }
        if let Some(path) = text_field(object, PATH_KEYS) {
            record.path = path;
        }
        if let Some(version) = text_field(object, &["version"]) {
            record.version = version;
        }
        record.status_code = u32::try_from(numeric_field(object, STATUS_KEYS)).unwrap_or(0);
        record.size = numeric_field(object, SIZE_KEYS);
        record.referer = text_field(object, &["referer"]).as_deref().and_then(optional_field);
        record.user_agent = text_field(object, AGENT_KEYS).as_deref().and_then(optional_field);
        Ok(record)
    }
}

impl LineParser for JsonLineParser {
    fn format(&self) -> LogFormat {
        LogFormat::Json
    }

    fn can_parse(&self, line: &str) -> bool {
        memchr(b'{', line.as_bytes()).is_some()
    }

    fn parse(&self, line: &str) -> Result<Option<LogRecord>, ParseFailure> {
        match extract_json_block(line) {
            // `{}` carries nothing to map; let the next format try the line
            Some(object) if !object.is_empty() => Self::map_object(&object, line).map(Some),
            _ => Ok(None),
        }
    }
}
