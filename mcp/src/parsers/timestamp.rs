//! Timestamp decoding shared by the line parsers
//!
//! Two policies live here:
//! - combined-log timestamps are lenient: offset form, then the bare
//!   `day/Mon/Year:H:M:S` prefix, then the current wall clock
//! - JSON `time` fields are strict: the first matching format wins and
//!   anything else is rejected by the caller

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

/// `26/May/2025:00:01:08 +0000`
pub const CLF_WITH_OFFSET: &str = "%d/%b/%Y:%H:%M:%S %z";
/// `26/May/2025:00:01:08`
pub const CLF_NAIVE: &str = "%d/%b/%Y:%H:%M:%S";

/// Naive formats tried for JSON `time` values once the offset form failed
const JSON_NAIVE_FORMATS: [&str; 3] = [CLF_NAIVE, "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// A parsed request time, keeping whether the source carried an offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum LogTimestamp {
    Aware(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

impl LogTimestamp {
    /// Wall-clock time as written in the log line
    pub fn wall_clock(&self) -> NaiveDateTime {
        match self {
            LogTimestamp::Aware(dt) => dt.naive_local(),
            LogTimestamp::Naive(ndt) => *ndt,
        }
    }

    /// Absolute instant; naive timestamps are read as UTC
    pub fn instant(&self) -> NaiveDateTime {
        match self {
            LogTimestamp::Aware(dt) => dt.naive_utc(),
            LogTimestamp::Naive(ndt) => *ndt,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.wall_clock().date()
    }

    pub fn time(&self) -> NaiveTime {
        self.wall_clock().time()
    }

    /// Offset east of UTC in seconds, `None` for naive timestamps
    pub fn utc_offset_seconds(&self) -> Option<i32> {
        match self {
            LogTimestamp::Aware(dt) => Some(dt.offset().local_minus_utc()),
            LogTimestamp::Naive(_) => None,
        }
    }

    pub fn is_aware(&self) -> bool {
        matches!(self, LogTimestamp::Aware(_))
    }
}

/// Parse a bracketed combined-log timestamp, never failing
///
/// Falls back to the local wall clock when neither form matches so a
/// malformed time never costs the rest of the line.
pub fn parse_clf_lenient(s: &str) -> LogTimestamp {
    if let Ok(dt) = DateTime::parse_from_str(s, CLF_WITH_OFFSET) {
        return LogTimestamp::Aware(dt);
    }
    let head = s.split_whitespace().next().unwrap_or("");
    if let Ok(ndt) = NaiveDateTime::parse_from_str(head, CLF_NAIVE) {
        return LogTimestamp::Naive(ndt);
    }
    LogTimestamp::Naive(Local::now().naive_local())
}

/// Parse a JSON `time` value, `None` when no known format matches
pub fn parse_json_time(s: &str) -> Option<LogTimestamp> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_str(s, CLF_WITH_OFFSET) {
        return Some(LogTimestamp::Aware(dt));
    }
    JSON_NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(LogTimestamp::Naive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_clf_with_offset_is_aware() {
        let ts = parse_clf_lenient("26/May/2025:00:01:08 +0200");
        assert!(ts.is_aware());
        assert_eq!(ts.utc_offset_seconds(), Some(7200));
        assert_eq!(ts.date(), NaiveDate::from_ymd_opt(2025, 5, 26).unwrap());
        // instant is shifted back to UTC, wall clock is kept as written
        assert_eq!(ts.instant().day(), 25);
        assert_eq!(ts.instant().hour(), 22);
        assert_eq!(ts.time().second(), 8);
    }

    #[test]
    fn test_clf_without_offset_uses_first_token() {
        let ts = parse_clf_lenient("26/May/2025:00:01:08 bogus");
        assert!(!ts.is_aware());
        assert_eq!(ts.wall_clock().minute(), 1);
    }

    #[test]
    fn test_clf_garbage_falls_back_to_now() {
        let before = Local::now().naive_local();
        let ts = parse_clf_lenient("not a time");
        assert!(!ts.is_aware());
        assert!(ts.wall_clock() >= before);
    }

    #[test]
    fn test_json_formats_in_order() {
        assert!(parse_json_time("26/May/2025:00:01:08 +0000").unwrap().is_aware());
        assert!(!parse_json_time("26/May/2025:00:01:08").unwrap().is_aware());
        assert!(parse_json_time("2025-05-26 10:00:00").is_some());
        assert!(parse_json_time("2025-05-26T10:00:00").is_some());
    }

    #[test]
    fn test_json_rejects_unknown_and_empty() {
        assert_eq!(parse_json_time(""), None);
        assert_eq!(parse_json_time("2025-05-26T10:00:00.123Z"), None);
        assert_eq!(parse_json_time("yesterday"), None);
    }
}
