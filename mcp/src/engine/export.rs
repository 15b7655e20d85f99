use polars::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::sessions::SessionStats;
use super::table::LogTable;

const TIME_FORMAT: &str = "%H:%M:%S";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const SESSION_COLUMNS: [&str; 7] = [
    "session_id",
    "session_start",
    "session_end",
    "pageviews",
    "ip",
    "date",
    "duration_minutes",
];

/// Write a record table as CSV with a header row, in column order
pub fn write_table_csv<W: Write>(table: &LogTable, writer: W) -> PolarsResult<()> {
    write_csv(table.frame(), writer)
}

/// Write one row per session
pub fn write_sessions_csv<W: Write>(stats: &SessionStats, writer: W) -> PolarsResult<()> {
    let frame = stats.details.select(SESSION_COLUMNS)?;
    write_csv(&frame, writer)
}

/// Create (or truncate) `path` and write the table into it
pub fn export_table_csv(table: &LogTable, path: &Path) -> PolarsResult<usize> {
    let file = File::create(path)?;
    write_table_csv(table, BufWriter::new(file))?;
    tracing::info!(path = %path.display(), rows = table.height(), "exported table");
    Ok(table.height())
}

pub fn export_sessions_csv(stats: &SessionStats, path: &Path) -> PolarsResult<usize> {
    let file = File::create(path)?;
    write_sessions_csv(stats, BufWriter::new(file))?;
    tracing::info!(path = %path.display(), sessions = stats.total_sessions, "exported sessions");
    Ok(stats.total_sessions)
}

fn write_csv<W: Write>(frame: &DataFrame, writer: W) -> PolarsResult<()> {
    // dictionary-encoded columns are written through their string values
    let columns = frame
        .get_columns()
        .iter()
        .map(|c| match c.dtype() {
            DataType::Categorical(_, _) => c.cast(&DataType::String),
            _ => Ok(c.clone()),
        })
        .collect::<PolarsResult<Vec<_>>>()?;
    let mut frame = DataFrame::new(columns)?;

    CsvWriter::new(writer)
        .include_header(true)
        .with_time_format(Some(TIME_FORMAT.to_string()))
        .with_datetime_format(Some(DATETIME_FORMAT.to_string()))
        .finish(&mut frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::sessions::{build_sessions, session_stats};
    use crate::engine::table::build_table;
    use crate::parsers::parse_line;

    fn table() -> LogTable {
        let lines = [
            r#"10.0.0.1 - - [26/May/2025:10:00:00 +0200] "GET /a HTTP/1.1" 200 10 "http://ref/" "Mozilla/5.0""#,
            r#"10.0.0.1 - - [26/May/2025:10:20:00 +0200] "GET /b HTTP/1.1" 404 - "-" "-""#,
        ];
        build_table(lines.iter().map(|l| parse_line(l).unwrap()).collect()).unwrap()
    }

    fn render(table: &LogTable) -> String {
        let mut buf = Vec::new();
        write_table_csv(table, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_table_header_order() {
        let csv = render(&table());
        let header = csv.lines().next().unwrap();
        assert_eq!(
            header,
            "timestamp,date,time,ip,method,path,version,status_code,size,referer,user_agent,raw_line,utc_offset"
        );
        let first = csv.lines().nth(1).unwrap();
        // instant is UTC, wall clock keeps the source offset
        assert!(first.starts_with("2025-05-26 08:00:00,2025-05-26,10:00:00,10.0.0.1,GET,/a,HTTP/1.1,200,10,http://ref/,Mozilla/5.0,"));
        assert!(first.ends_with(",7200"));
    }

    #[test]
    fn test_session_columns_appended() {
        let sessions = build_sessions(&table(), 30).unwrap();
        let csv = render(&sessions);
        assert!(csv.lines().next().unwrap().ends_with(",utc_offset,session_seq,session_id"));
        assert!(csv.lines().nth(2).unwrap().ends_with(",1,10.0.0.1_1"));
    }

    #[test]
    fn test_sessions_csv() {
        let stats = session_stats(&build_sessions(&table(), 30).unwrap()).unwrap();
        let mut buf = Vec::new();
        write_sessions_csv(&stats, &mut buf).unwrap();
        let csv = String::from_utf8(buf).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(SESSION_COLUMNS.join(",").as_str()));
        assert_eq!(
            lines.next(),
            Some("10.0.0.1_1,2025-05-26 08:00:00,2025-05-26 08:20:00,2,10.0.0.1,2025-05-26,20.0")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        assert_eq!(export_table_csv(&table(), &path).unwrap(), 2);
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.lines().count(), 3);
    }
}
