use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use super::query::{QueryBuilder, QueryError, value_counts};
use super::table::{COL_DATE, COL_IP, COL_METHOD, COL_SIZE, COL_STATUS, LogTable};

/// Summary of one table; recomputed on demand, never cached
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LogStats {
    pub total_requests: usize,
    pub unique_ips: usize,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub status_codes: BTreeMap<u32, u64>,
    pub methods: BTreeMap<String, u64>,
    pub total_size: u64,
    /// Undefined for an empty table
    pub avg_size: Option<f64>,
    /// Rows with status >= 400
    pub errors: usize,
}

pub fn compute_stats(table: &LogTable) -> Result<LogStats, QueryError> {
    if table.is_empty() {
        return Ok(LogStats::default());
    }

    let frame = table.frame();
    let unique_ips = frame.column(COL_IP)?.n_unique()?;

    let dates = frame.column(COL_DATE)?.date()?;
    let date_range = dates
        .as_date_iter()
        .flatten()
        .fold(None, |range: Option<(NaiveDate, NaiveDate)>, d| match range {
            None => Some((d, d)),
            Some((lo, hi)) => Some((lo.min(d), hi.max(d))),
        });

    let mut status_codes = BTreeMap::new();
    for (code, count) in value_counts(table.lazy(), COL_STATUS)? {
        let code = code
            .parse::<u32>()
            .map_err(|_| QueryError::InvalidQuery(format!("non-numeric status {code}")))?;
        status_codes.insert(code, count);
    }
    let methods = value_counts(table.lazy(), COL_METHOD)?.into_iter().collect();

    let total_size: u64 = table.u64_values(COL_SIZE)?.iter().sum();
    let errors = QueryBuilder::new(table.lazy())
        .filter_status(">=400")?
        .collect()?
        .height();

    Ok(LogStats {
        total_requests: table.height(),
        unique_ips,
        date_range,
        status_codes,
        methods,
        total_size,
        avg_size: Some(total_size as f64 / table.height() as f64),
        errors,
    })
}
