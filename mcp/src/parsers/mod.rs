pub mod apache;
pub mod diagnose;
pub mod json;
pub mod timestamp;

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use std::sync::LazyLock;
use thiserror::Error;

pub use timestamp::LogTimestamp;

/// Why a single line could not become a record
///
/// Line failures are counted by the ingestion engine and never abort a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    #[error("line matches no supported log format")]
    UnrecognizedFormat,
    #[error("JSON record has no `time` field")]
    MissingTimestamp,
    #[error("unrecognized JSON timestamp: {0}")]
    InvalidTimestamp(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Apache,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Apache => "apache",
            LogFormat::Json => "json",
        }
    }
}

/// One normalized access-log line
///
/// Every field carries a value: `"-"` for missing request parts, `0` for
/// missing or non-numeric status and size, `None` for absent referer or
/// user agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub timestamp: LogTimestamp,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub ip: String,
    pub method: String,
    pub path: String,
    pub version: String,
    pub status_code: u32,
    pub size: u64,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
    pub raw_line: String,
}

impl LogRecord {
    /// Record with sentinels everywhere except the timestamp-derived fields
    pub fn new(timestamp: LogTimestamp, raw_line: &str) -> Self {
        Self {
            date: timestamp.date(),
            time: timestamp.time(),
            timestamp,
            ip: "-".to_string(),
            method: "-".to_string(),
            path: "-".to_string(),
            version: "-".to_string(),
            status_code: 0,
            size: 0,
            referer: None,
            user_agent: None,
            raw_line: raw_line.trim().to_string(),
        }
    }

    /// Split `"GET /path HTTP/1.1"` positionally, leaving `"-"` for missing parts
    pub fn set_request_line(&mut self, request: &str) {
        let mut parts = request.split_whitespace();
        if let Some(method) = parts.next() {
            self.method = method.to_string();
        }
        if let Some(path) = parts.next() {
            self.path = path.to_string();
        }
        if let Some(version) = parts.next() {
            self.version = version.to_string();
        }
    }
}

/// `"-"` and empty strings mean "not sent"
pub(crate) fn optional_field(value: &str) -> Option<String> {
    if value.is_empty() || value == "-" {
        None
    } else {
        Some(value.to_string())
    }
}

/// Digits-only text as a number, anything else (including `"-"`) as 0
pub(crate) fn numeric_or_zero(value: &str) -> u64 {
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        value.parse().unwrap_or(0)
    } else {
        0
    }
}

/// One strategy in the format cascade
pub trait LineParser: Send + Sync {
    fn format(&self) -> LogFormat;

    /// Cheap pre-check; a `false` skips this parser entirely
    fn can_parse(&self, line: &str) -> bool;

    /// `Ok(None)` means the line is not in this format and the next parser
    /// should try; `Err` means it is, but the record is rejected.
    fn parse(&self, line: &str) -> Result<Option<LogRecord>, ParseFailure>;
}

/// Ordered list of parsers; the first one that produces a record wins
pub struct ParserChain {
    parsers: Vec<Box<dyn LineParser>>,
}

impl Default for ParserChain {
    fn default() -> Self {
        Self::new(vec![
            Box::new(json::JsonLineParser),
            Box::new(apache::ApacheParser),
        ])
    }
}

impl ParserChain {
    pub fn new(parsers: Vec<Box<dyn LineParser>>) -> Self {
        Self { parsers }
    }

    pub fn parse(&self, raw: &str) -> Result<LogRecord, ParseFailure> {
        self.parse_with_format(raw).map(|(record, _)| record)
    }

    /// Like [`ParserChain::parse`], also reporting which format matched
    pub fn parse_with_format(&self, raw: &str) -> Result<(LogRecord, LogFormat), ParseFailure> {
        for parser in self.parsers.iter().filter(|p| p.can_parse(raw)) {
            if let Some(record) = parser.parse(raw)? {
                return Ok((record, parser.format()));
            }
        }
        Err(ParseFailure::UnrecognizedFormat)
    }
}

static DEFAULT_CHAIN: LazyLock<ParserChain> = LazyLock::new(ParserChain::default);

/// Detect the format of one raw line and normalize it: JSON first, then
/// Apache/Nginx combined log
pub fn parse_line(raw: &str) -> Result<LogRecord, ParseFailure> {
    DEFAULT_CHAIN.parse(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_prefers_json() {
        let line = r#"{"time": "2025-05-26 10:00:00", "remote_addr": "10.0.0.1", "code": 404}"#;
        let (record, format) = DEFAULT_CHAIN.parse_with_format(line).expect("json line");
        assert_eq!(format, LogFormat::Json);
        assert_eq!(record.ip, "10.0.0.1");
        assert_eq!(record.status_code, 404);
    }

    #[test]
    fn test_dispatch_falls_back_to_apache() {
        let line = r#"203.0.113.5 - - [26/May/2025:00:01:08 +0000] "GET /api/{id} HTTP/1.1" 200 512 "-" "Mozilla/5.0""#;
        let (record, format) = DEFAULT_CHAIN.parse_with_format(line).expect("apache line");
        assert_eq!(format, LogFormat::Apache);
        assert_eq!(record.path, "/api/{id}");
    }

    #[test]
    fn test_json_rejection_does_not_fall_back() {
        // a JSON object without `time` is rejected outright
        let line = r#"{"remote_addr": "10.0.0.1", "code": 200}"#;
        assert_eq!(parse_line(line), Err(ParseFailure::MissingTimestamp));
    }

    #[test]
    fn test_unrecognized_lines() {
        assert_eq!(parse_line(""), Err(ParseFailure::UnrecognizedFormat));
        assert_eq!(parse_line("hello world"), Err(ParseFailure::UnrecognizedFormat));
        assert_eq!(parse_line("{not json"), Err(ParseFailure::UnrecognizedFormat));
    }

    #[test]
    fn test_request_line_split() {
        let ts = timestamp::parse_clf_lenient("26/May/2025:00:01:08 +0000");
        let mut record = LogRecord::new(ts, "  raw  ");
        assert_eq!(record.raw_line, "raw");
        record.set_request_line("GET");
        assert_eq!((record.method.as_str(), record.path.as_str(), record.version.as_str()), ("GET", "-", "-"));
    }

    #[test]
    fn test_numeric_or_zero() {
        assert_eq!(numeric_or_zero("512"), 512);
        assert_eq!(numeric_or_zero("-"), 0);
        assert_eq!(numeric_or_zero("12a"), 0);
        assert_eq!(numeric_or_zero(""), 0);
    }
}
