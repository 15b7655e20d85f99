use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::bots::filter_bots;
use super::query::{QueryBuilder, QueryError};
use super::sessions::{DEFAULT_SESSION_TIMEOUT_MINUTES, SessionStats, build_sessions, session_stats};
use super::stats::{LogStats, compute_stats};
use super::table::LogTable;

/// Inclusive calendar-date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, QueryError> {
        if start > end {
            return Err(QueryError::InvalidQuery(format!(
                "period start {start} is after its end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Rows whose `date` falls in the range, as a new table
    pub fn slice(&self, table: &LogTable) -> Result<LogTable, QueryError> {
        let frame = QueryBuilder::new(table.lazy())
            .filter_date_range(Some(self.start), Some(self.end))
            .collect()?;
        Ok(LogTable::from_frame(frame))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompareOptions {
    pub exclude_bots: bool,
    pub use_sessions: bool,
    pub session_timeout_minutes: u32,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            exclude_bots: true,
            use_sessions: false,
            session_timeout_minutes: DEFAULT_SESSION_TIMEOUT_MINUTES,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodSummary {
    pub range: DateRange,
    /// Requests, or sessions in session mode
    pub requests: u64,
    /// Distinct ips, or distinct session users in session mode
    pub visitors: u64,
    pub errors: u64,
    pub size: u64,
    pub bots_removed: usize,
    pub stats: LogStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sessions: Option<SessionStats>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricDelta {
    pub absolute: i64,
    /// Relative change in percent; 0 when the first period's value is 0
    pub percent: f64,
}

impl MetricDelta {
    pub fn between(before: u64, after: u64) -> Self {
        let absolute = after as i64 - before as i64;
        let percent = if before > 0 {
            absolute as f64 / before as f64 * 100.0
        } else {
            0.0
        };
        Self { absolute, percent }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodComparison {
    pub period1: PeriodSummary,
    pub period2: PeriodSummary,
    pub requests: MetricDelta,
    pub visitors: MetricDelta,
    pub errors: MetricDelta,
    pub size: MetricDelta,
    pub used_sessions: bool,
}

/// Compare traffic between two date ranges of the same table
///
/// Session counts replace request counts only when both periods have rows;
/// otherwise both periods report requests so the deltas stay comparable.
pub fn compare_periods(
    table: &LogTable,
    period1: DateRange,
    period2: DateRange,
    options: CompareOptions,
) -> Result<PeriodComparison, QueryError> {
    let mut first = summarize(table, period1, options)?;
    let mut second = summarize(table, period2, options)?;

    let used_sessions = first.sessions.is_some() && second.sessions.is_some();
    if !used_sessions {
        for period in [&mut first, &mut second] {
            period.requests = period.stats.total_requests as u64;
            period.visitors = period.stats.unique_ips as u64;
        }
    }

    tracing::info!(
        start1 = %period1.start,
        end1 = %period1.end,
        start2 = %period2.start,
        end2 = %period2.end,
        requests1 = first.requests,
        requests2 = second.requests,
        used_sessions,
        "compared periods"
    );

    Ok(PeriodComparison {
        requests: MetricDelta::between(first.requests, second.requests),
        visitors: MetricDelta::between(first.visitors, second.visitors),
        errors: MetricDelta::between(first.errors, second.errors),
        size: MetricDelta::between(first.size, second.size),
        period1: first,
        period2: second,
        used_sessions,
    })
}

fn summarize(
    table: &LogTable,
    range: DateRange,
    options: CompareOptions,
) -> Result<PeriodSummary, QueryError> {
    let slice = range.slice(table)?;
    let (slice, bots_removed) = filter_bots(&slice, options.exclude_bots)?;
    let stats = compute_stats(&slice)?;

    let sessions = if options.use_sessions && !slice.is_empty() {
        let annotated = build_sessions(&slice, options.session_timeout_minutes)?;
        Some(session_stats(&annotated)?)
    } else {
        None
    };

    let (requests, visitors) = match &sessions {
        Some(s) => (s.total_sessions as u64, s.unique_users as u64),
        None => (stats.total_requests as u64, stats.unique_ips as u64),
    };

    Ok(PeriodSummary {
        range,
        requests,
        visitors,
        errors: stats.errors as u64,
        size: stats.total_size,
        bots_removed,
        stats,
        sessions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::table::build_table;
    use crate::parsers::parse_line;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, d).unwrap()
    }

    fn table() -> LogTable {
        let rows = [
            ("10.0.0.1", "25", "10:00:00", 200, 100, "Mozilla/5.0"),
            ("10.0.0.1", "25", "10:05:00", 200, 100, "Mozilla/5.0"),
            ("10.0.0.9", "25", "10:06:00", 200, 50, "Googlebot/2.1"),
            ("10.0.0.1", "27", "10:00:00", 404, 100, "Mozilla/5.0"),
            ("10.0.0.2", "27", "10:00:00", 500, 100, "Mozilla/5.0"),
            ("10.0.0.1", "27", "12:00:00", 200, 100, "Mozilla/5.0"),
        ];
        let records = rows
            .iter()
            .map(|(ip, d, t, status, size, ua)| {
                let line = format!(
                    r#"{ip} - - [{d}/May/2025:{t} +0000] "GET / HTTP/1.1" {status} {size} "-" "{ua}""#
                );
                parse_line(&line).unwrap()
            })
            .collect();
        build_table(records).unwrap()
    }

    #[test]
    fn test_request_comparison() {
        let result = compare_periods(
            &table(),
            DateRange::new(day(25), day(25)).unwrap(),
            DateRange::new(day(26), day(27)).unwrap(),
            CompareOptions::default(),
        )
        .unwrap();

        assert!(!result.used_sessions);
        assert_eq!(result.period1.requests, 2);
        assert_eq!(result.period1.bots_removed, 1);
        assert_eq!(result.period2.requests, 3);
        assert_eq!(result.requests, MetricDelta { absolute: 1, percent: 50.0 });
        assert_eq!(result.visitors, MetricDelta { absolute: 1, percent: 100.0 });
        assert_eq!(result.errors, MetricDelta { absolute: 2, percent: 0.0 });
        assert_eq!(result.size.absolute, 100);
    }

    #[test]
    fn test_session_comparison() {
        let options = CompareOptions {
            use_sessions: true,
            ..CompareOptions::default()
        };
        let result = compare_periods(
            &table(),
            DateRange::new(day(25), day(25)).unwrap(),
            DateRange::new(day(27), day(27)).unwrap(),
            options,
        )
        .unwrap();

        assert!(result.used_sessions);
        assert_eq!(result.period1.requests, 1);
        assert_eq!(result.period2.requests, 3);
        assert_eq!(result.period2.visitors, 2);
    }

    #[test]
    fn test_sessions_fall_back_when_a_period_is_empty() {
        let options = CompareOptions {
            use_sessions: true,
            exclude_bots: false,
            ..CompareOptions::default()
        };
        let result = compare_periods(
            &table(),
            DateRange::new(day(20), day(21)).unwrap(),
            DateRange::new(day(25), day(25)).unwrap(),
            options,
        )
        .unwrap();
        assert!(!result.used_sessions);
        assert_eq!(result.period2.requests, 3);
        assert_eq!(result.requests.percent, 0.0);
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert!(DateRange::new(day(3), day(1)).is_err());
    }
}
