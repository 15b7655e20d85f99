use regex::Regex;
use std::sync::LazyLock;

use super::timestamp::parse_clf_lenient;
use super::{LineParser, LogFormat, LogRecord, ParseFailure, numeric_or_zero, optional_field};

/// Apache/Nginx Combined Log Format parser
///
/// Format: %h %l %u %t "%r" %>s %b "%{Referer}i" "%{User-agent}i"
/// Example: 192.168.1.1 - - [10/Oct/2024:13:55:36 +0000] "GET /index.html HTTP/1.1" 200 2326 "-" "Mozilla/5.0"
///
/// Lines without the trailing referer/user-agent pair (Common Log Format)
/// are accepted by a reduced pattern and get `None` for both.
pub struct ApacheParser;

static COMBINED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\S+) \S+ \S+ \[([^\]]+)\] "([^"]*)" (\S+) (\S+) "([^"]*)" "([^"]*)""#)
        .expect("combined log pattern is valid")
});

static COMMON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\S+) \S+ \S+ \[([^\]]+)\] "([^"]*)" (\S+) (\S+)"#)
        .expect("common log pattern is valid")
});

impl LineParser for ApacheParser {
    fn format(&self) -> LogFormat {
        LogFormat::Apache
    }

    fn can_parse(&self, _line: &str) -> bool {
        true
    }

    fn parse(&self, line: &str) -> Result<Option<LogRecord>, ParseFailure> {
        let line = line.trim();
        let Some(caps) = COMBINED.captures(line).or_else(|| COMMON.captures(line)) else {
            return Ok(None);
        };

        let field = |i: usize| caps.get(i).map(|m| m.as_str()).unwrap_or("");

        let mut record = LogRecord::new(parse_clf_lenient(field(2)), line);
        record.ip = field(1).to_string();
        record.set_request_line(field(3));
        record.status_code = u32::try_from(numeric_or_zero(field(4))).unwrap_or(0);
        record.size = numeric_or_zero(field(5));
        record.referer = optional_field(field(6));
        record.user_agent = optional_field(field(7));
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    fn parse(line: &str) -> LogRecord {
        ApacheParser.parse(line).unwrap().expect("Should parse")
    }

    #[test]
    fn test_combined_line() {
        let record = parse(r#"203.0.113.5 - - [26/May/2025:00:01:08 +0000] "GET /index.html HTTP/1.1" 200 512 "-" "Mozilla/5.0""#);
        assert_eq!(record.ip, "203.0.113.5");
        assert_eq!(record.method, "GET");
        assert_eq!(record.path, "/index.html");
        assert_eq!(record.version, "HTTP/1.1");
        assert_eq!(record.status_code, 200);
        assert_eq!(record.size, 512);
        assert_eq!(record.referer, None);
        assert_eq!(record.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2025, 5, 26).unwrap());
        assert_eq!(record.time.second(), 8);
        assert!(record.timestamp.is_aware());
    }

    #[test]
    fn test_common_line_without_agent() {
        let record = parse(r#"192.168.1.1 - frank [10/Oct/2024:13:55:36 +0000] "POST /api/users HTTP/1.1" 201 100"#);
        assert_eq!(record.method, "POST");
        assert_eq!(record.path, "/api/users");
        assert_eq!(record.status_code, 201);
        assert_eq!(record.referer, None);
        assert_eq!(record.user_agent, None);
    }

    #[test]
    fn test_dash_status_and_size() {
        let record = parse(r#"10.0.0.1 - - [10/Oct/2024:13:55:36 +0000] "GET / HTTP/1.0" - - "http://ref.example/" "UA""#);
        assert_eq!(record.status_code, 0);
        assert_eq!(record.size, 0);
        assert_eq!(record.referer.as_deref(), Some("http://ref.example/"));
    }

    #[test]
    fn test_no_false_positives() {
        // 404 in the path must not leak into the status
        let record = parse(r#"192.168.1.1 - - [10/Oct/2024:13:55:36 +0000] "GET /error/404/page HTTP/1.1" 200 100"#);
        assert_eq!(record.status_code, 200);
    }

    #[test]
    fn test_bad_timestamp_is_lenient() {
        let record = parse(r#"10.0.0.1 - - [sometime] "GET / HTTP/1.1" 200 1 "-" "-""#);
        assert!(!record.timestamp.is_aware());
        assert_eq!(record.status_code, 200);
    }

    #[test]
    fn test_empty_request_defaults() {
        let record = parse(r#"10.0.0.1 - - [10/Oct/2024:13:55:36 +0000] "" 400 0 "-" "-""#);
        assert_eq!(record.method, "-");
        assert_eq!(record.path, "-");
        assert_eq!(record.version, "-");
    }

    #[test]
    fn test_non_matching_line() {
        assert_eq!(ApacheParser.parse("Dec 10 10:45:23 myhost sshd[1]: hello"), Ok(None));
    }
}
