//! Session inference from per-client inactivity gaps
//!
//! Rows are grouped by `ip` and ordered by request instant; a row opens a
//! new session when it is the first for its ip or when more than the
//! timeout has passed since the previous request from the same ip.

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use super::query::QueryError;
use super::table::{COL_DATE, COL_IP, COL_SESSION_ID, COL_SESSION_SEQ, COL_TIMESTAMP, LogTable};

pub const DEFAULT_SESSION_TIMEOUT_MINUTES: u32 = 30;

const MILLIS_PER_MINUTE: i64 = 60_000;

/// Annotate every row with its session
///
/// The result is sorted by `(ip, timestamp)`; rows with equal timestamps for
/// one ip keep their input order. Adds `session_seq` (1-based per ip) and
/// `session_id` (`"{ip}_{seq}"`). Existing session columns are replaced,
/// so annotating twice with the same timeout gives the same ids.
pub fn build_sessions(table: &LogTable, timeout_minutes: u32) -> PolarsResult<LogTable> {
    let mut frame = table.frame().clone();
    for name in [COL_SESSION_SEQ, COL_SESSION_ID] {
        if frame.column(name).is_ok() {
            frame = frame.drop(name)?;
        }
    }
    let base = LogTable::from_frame(frame);

    let ips = base.string_values(COL_IP)?;
    let instants = base.instant_millis()?;

    let mut order: Vec<usize> = (0..base.height()).collect();
    order.sort_by(|&a, &b| ips[a].cmp(&ips[b]).then(instants[a].cmp(&instants[b])));

    let timeout_ms = i64::from(timeout_minutes) * MILLIS_PER_MINUTE;
    let mut seqs = Vec::with_capacity(order.len());
    let mut ids = Vec::with_capacity(order.len());
    let mut previous: Option<usize> = None;
    let mut seq = 0u32;

    for &row in &order {
        let new_session = match previous {
            Some(prev) if ips[prev] == ips[row] => instants[row] - instants[prev] > timeout_ms,
            _ => {
                seq = 0;
                true
            }
        };
        if new_session {
            seq += 1;
        }
        seqs.push(seq);
        ids.push(format!("{}_{}", ips[row].as_deref().unwrap_or("-"), seq));
        previous = Some(row);
    }

    let indices: Vec<IdxSize> = order.iter().map(|&i| i as IdxSize).collect();
    let mut sorted = base
        .frame()
        .take(&IdxCa::from_vec("idx".into(), indices))?;
    sorted.with_column(Column::new(COL_SESSION_SEQ.into(), seqs))?;
    sorted.with_column(Column::new(COL_SESSION_ID.into(), ids))?;

    let sessions = sorted.column(COL_SESSION_ID)?.n_unique()?;
    tracing::debug!(rows = sorted.height(), sessions, timeout_minutes, "built sessions");
    Ok(LogTable::from_frame(sorted))
}

/// One inferred session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub ip: String,
    pub session_start: NaiveDateTime,
    pub session_end: NaiveDateTime,
    pub pageviews: u64,
    pub date: NaiveDate,
    pub duration_minutes: f64,
}

/// Aggregates over the sessions of an annotated table
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub total_sessions: usize,
    pub unique_users: usize,
    /// `None` when there are no sessions
    pub avg_pageviews_per_session: Option<f64>,
    pub avg_session_duration_minutes: Option<f64>,
    pub sessions_by_date: BTreeMap<NaiveDate, u64>,
    pub sessions: Vec<SessionSummary>,
    /// Per-session frame: session_id, session_start, session_end, pageviews,
    /// ip, date, duration_minutes
    #[serde(skip)]
    pub details: DataFrame,
}

/// Per-session and overall statistics for a table from [`build_sessions`]
pub fn session_stats(table: &LogTable) -> Result<SessionStats, QueryError> {
    if !table.has_sessions() {
        return Err(QueryError::InvalidQuery(
            "table has no session columns; run build_sessions first".to_string(),
        ));
    }

    let details = table
        .lazy()
        .group_by_stable([col(COL_SESSION_ID)])
        .agg([
            col(COL_TIMESTAMP).min().alias("session_start"),
            col(COL_TIMESTAMP).max().alias("session_end"),
            len().cast(DataType::UInt64).alias("pageviews"),
            col(COL_IP).first().cast(DataType::String).alias(COL_IP),
            col(COL_DATE).first().alias(COL_DATE),
        ])
        .with_columns([((col("session_end").cast(DataType::Int64)
            - col("session_start").cast(DataType::Int64))
        .cast(DataType::Float64)
            / lit(MILLIS_PER_MINUTE as f64))
        .alias("duration_minutes")])
        .collect()?;

    let sessions = summaries(&details)?;
    let total_sessions = sessions.len();
    let unique_users = sessions
        .iter()
        .map(|s| s.ip.as_str())
        .collect::<HashSet<_>>()
        .len();

    let mut sessions_by_date = BTreeMap::new();
    for session in &sessions {
        *sessions_by_date.entry(session.date).or_insert(0u64) += 1;
    }

    let (avg_pageviews_per_session, avg_session_duration_minutes) = if total_sessions == 0 {
        (None, None)
    } else {
        let n = total_sessions as f64;
        let pageviews: u64 = sessions.iter().map(|s| s.pageviews).sum();
        let minutes: f64 = sessions.iter().map(|s| s.duration_minutes).sum();
        (Some(pageviews as f64 / n), Some(minutes / n))
    };

    Ok(SessionStats {
        total_sessions,
        unique_users,
        avg_pageviews_per_session,
        avg_session_duration_minutes,
        sessions_by_date,
        sessions,
        details,
    })
}

fn summaries(details: &DataFrame) -> Result<Vec<SessionSummary>, QueryError> {
    let ids = details.column(COL_SESSION_ID)?.cast(&DataType::String)?;
    let ips = details.column(COL_IP)?.cast(&DataType::String)?;
    let starts = details.column("session_start")?.datetime()?.as_datetime_iter();
    let ends = details.column("session_end")?.datetime()?.as_datetime_iter();
    let pageviews = details.column("pageviews")?.u64()?.into_iter();
    let dates = details.column(COL_DATE)?.date()?.as_date_iter();
    let durations = details.column("duration_minutes")?.f64()?.into_iter();

    let rows = ids
        .str()?
        .into_iter()
        .zip(ips.str()?)
        .zip(starts.zip(ends))
        .zip(pageviews.zip(dates))
        .zip(durations);

    let mut sessions = Vec::with_capacity(details.height());
    for ((((id, ip), (start, end)), (views, date)), duration) in rows {
        let (Some(start), Some(end), Some(date)) = (start, end, date) else {
            return Err(QueryError::InvalidQuery(format!(
                "session {} has no timestamp",
                id.unwrap_or("-")
            )));
        };
        sessions.push(SessionSummary {
            session_id: id.unwrap_or("-").to_string(),
            ip: ip.unwrap_or("-").to_string(),
            session_start: start,
            session_end: end,
            pageviews: views.unwrap_or(0),
            date,
            duration_minutes: duration.unwrap_or(0.0),
        });
    }
    Ok(sessions)
}
