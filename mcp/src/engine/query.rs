use chrono::NaiveDate;
use polars::prelude::*;
use thiserror::Error;

use super::table::{COL_DATE, COL_STATUS};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// Query builder for constructing Polars queries over a log table
pub struct QueryBuilder {
    lf: LazyFrame,
}

impl QueryBuilder {
    pub fn new(lf: LazyFrame) -> Self {
        Self { lf }
    }

    /// Filter by text pattern in a column (case-insensitive by default)
    ///
    /// Categorical columns are compared through their string values.
    pub fn filter_text(mut self, column: &str, pattern: &str, case_sensitive: bool) -> Self {
        let text = col(column).cast(DataType::String);
        let expr = if case_sensitive {
            text.str().contains_literal(lit(pattern))
        } else {
            text.str()
                .to_lowercase()
                .str()
                .contains_literal(lit(pattern.to_lowercase()))
        };
        self.lf = self.lf.filter(expr);
        self
    }

    /// Filter by regex pattern
    pub fn filter_regex(mut self, column: &str, pattern: &str) -> Self {
        self.lf = self
            .lf
            .filter(col(column).cast(DataType::String).str().contains(lit(pattern), true));
        self
    }

    /// Filter by status code (supports ranges like ">=400", "4xx", "500")
    pub fn filter_status(mut self, status_filter: &str) -> Result<Self, QueryError> {
        let expr = parse_status_filter(status_filter).ok_or_else(|| {
            QueryError::InvalidQuery(format!("unsupported status filter: {status_filter}"))
        })?;
        self.lf = self.lf.filter(expr);
        Ok(self)
    }

    /// Keep rows whose `date` falls in `[start, end]`; either bound may be open
    pub fn filter_date_range(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        if let Some(start) = start {
            self.lf = self.lf.filter(col(COL_DATE).gt_eq(lit(start)));
        }
        if let Some(end) = end {
            self.lf = self.lf.filter(col(COL_DATE).lt_eq(lit(end)));
        }
        self
    }

    /// Group by a column
    pub fn group_by(self, column: &str) -> GroupByBuilder {
        GroupByBuilder {
            lf: self.lf,
            group_col: column.to_string(),
        }
    }

    /// Sort by a column
    pub fn sort(mut self, column: &str, descending: bool) -> Self {
        self.lf = self.lf.sort(
            [column],
            SortMultipleOptions::default()
                .with_order_descending(descending)
                .with_maintain_order(true),
        );
        self
    }

    /// Limit results
    pub fn limit(mut self, n: u32) -> Self {
        self.lf = self.lf.limit(n);
        self
    }

    /// Execute the query and return results
    pub fn collect(self) -> Result<DataFrame, QueryError> {
        self.lf.collect().map_err(QueryError::from)
    }
}

pub struct GroupByBuilder {
    lf: LazyFrame,
    group_col: String,
}

impl GroupByBuilder {
    /// Rows per group, most frequent first (ties keep first-seen order)
    pub fn count(self) -> QueryBuilder {
        let lf = self
            .lf
            .group_by_stable([col(&self.group_col)])
            .agg([len().alias("count")])
            .sort(
                ["count"],
                SortMultipleOptions::default()
                    .with_order_descending(true)
                    .with_maintain_order(true),
            );
        QueryBuilder { lf }
    }
}


/// Parse status filter expressions like ">=400", "4xx", "500", "!=200"
fn parse_status_filter(filter: &str) -> Option<Expr> {
    let filter = filter.trim();
    let status = || col(COL_STATUS).cast(DataType::Int64);

    // Handle range patterns like "4xx", "5xx"
    if filter.len() == 3 && filter.to_ascii_lowercase().ends_with("xx") {
        let prefix = filter.chars().next().and_then(|c| c.to_digit(10))?;
        let min = i64::from(prefix) * 100;
        return Some(status().gt_eq(lit(min)).and(status().lt_eq(lit(min + 99))));
    }

    let value = |rest: &str| rest.trim().parse::<i64>().ok();
    if let Some(rest) = filter.strip_prefix(">=") {
        Some(status().gt_eq(lit(value(rest)?)))
    } else if let Some(rest) = filter.strip_prefix("<=") {
        Some(status().lt_eq(lit(value(rest)?)))
    } else if let Some(rest) = filter.strip_prefix("!=") {
        Some(status().neq(lit(value(rest)?)))
    } else if let Some(rest) = filter.strip_prefix('>') {
        Some(status().gt(lit(value(rest)?)))
    } else if let Some(rest) = filter.strip_prefix('<') {
        Some(status().lt(lit(value(rest)?)))
    } else {
        // Exact match
        Some(status().eq(lit(value(filter)?)))
    }
}

/// `(value, count)` pairs for a column, most frequent first
pub fn value_counts(lf: LazyFrame, column: &str) -> Result<Vec<(String, u64)>, QueryError> {
    let df = QueryBuilder::new(lf).group_by(column).count().collect()?;
    let keys = df.column(column)?.cast(&DataType::String)?;
    let counts = df.column("count")?.cast(&DataType::UInt64)?;
    let pairs = keys
        .str()?
        .into_iter()
        .zip(counts.u64()?)
        .map(|(k, c)| (k.unwrap_or("-").to_string(), c.unwrap_or(0)))
        .collect();
    Ok(pairs)
}

/// Requests per day, oldest first
pub fn daily_counts(lf: LazyFrame) -> Result<Vec<(NaiveDate, u64)>, QueryError> {
    let df = QueryBuilder::new(lf)
        .group_by(COL_DATE)
        .count()
        .sort(COL_DATE, false)
        .collect()?;
    let dates = df.column(COL_DATE)?.date()?;
    let counts = df.column("count")?.cast(&DataType::UInt64)?;
    let pairs = dates
        .as_date_iter()
        .zip(counts.u64()?)
        .filter_map(|(d, c)| Some((d?, c.unwrap_or(0))))
        .collect();
    Ok(pairs)
}

/// Convert DataFrame to JSON string
pub fn dataframe_to_json(df: &DataFrame) -> Result<String, QueryError> {
    let mut buf = Vec::new();
    JsonWriter::new(&mut buf)
        .with_json_format(JsonFormat::Json)
        .finish(&mut df.clone())?;
    String::from_utf8(buf).map_err(|e| QueryError::InvalidQuery(e.to_string()))
}

/// Get schema information from a DataFrame
pub fn get_schema_info(df: &DataFrame) -> Vec<(String, String)> {
    df.schema()
        .iter()
        .map(|(name, dtype)| (name.to_string(), dtype.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::table::{LogTable, build_table};
    use crate::parsers::parse_line;

    fn table() -> LogTable {
        let lines = [
            r#"10.0.0.1 - - [25/May/2025:10:00:00 +0000] "GET /a HTTP/1.1" 200 10 "-" "UA""#,
            r#"10.0.0.2 - - [26/May/2025:10:00:00 +0000] "POST /Login HTTP/1.1" 404 20 "-" "UA""#,
            r#"10.0.0.1 - - [26/May/2025:11:00:00 +0000] "GET /b HTTP/1.1" 500 30 "-" "UA""#,
            r#"10.0.0.3 - - [27/May/2025:10:00:00 +0000] "GET /a HTTP/1.1" 301 40 "-" "UA""#,
        ];
        build_table(lines.iter().map(|l| parse_line(l).unwrap()).collect()).unwrap()
    }

    #[test]
    fn test_status_filters() {
        let cases = [(">=400", 2), ("4xx", 1), ("5XX", 1), ("500", 1), ("!=200", 3), ("<300", 1), (">301", 2)];
        for (filter, expected) in cases {
            let df = QueryBuilder::new(table().lazy())
                .filter_status(filter)
                .unwrap()
                .collect()
                .unwrap();
            assert_eq!(df.height(), expected, "filter {filter}");
        }
        assert!(QueryBuilder::new(table().lazy()).filter_status("lots").is_err());
    }

    #[test]
    fn test_text_filter_on_strings() {
        let df = QueryBuilder::new(table().lazy())
            .filter_text("path", "login", false)
            .collect()
            .unwrap();
        assert_eq!(df.height(), 1);
        let df = QueryBuilder::new(table().lazy())
            .filter_text("path", "login", true)
            .collect()
            .unwrap();
        assert_eq!(df.height(), 0);
        let df = QueryBuilder::new(table().lazy())
            .filter_regex("method", "^P")
            .collect()
            .unwrap();
        assert_eq!(df.height(), 1);
    }

    #[test]
    fn test_date_range() {
        let day = |d| NaiveDate::from_ymd_opt(2025, 5, d).unwrap();
        let df = QueryBuilder::new(table().lazy())
            .filter_date_range(Some(day(26)), Some(day(26)))
            .collect()
            .unwrap();
        assert_eq!(df.height(), 2);
        let df = QueryBuilder::new(table().lazy())
            .filter_date_range(Some(day(26)), None)
            .collect()
            .unwrap();
        assert_eq!(df.height(), 3);
    }

    #[test]
    fn test_value_counts() {
        let counts = value_counts(table().lazy(), "method").unwrap();
        assert_eq!(counts, vec![("GET".to_string(), 3), ("POST".to_string(), 1)]);
        let ips = value_counts(table().lazy(), "ip").unwrap();
        assert_eq!(ips[0], ("10.0.0.1".to_string(), 2));
    }

    #[test]
    fn test_daily_counts() {
        let day = |d| NaiveDate::from_ymd_opt(2025, 5, d).unwrap();
        let counts = daily_counts(table().lazy()).unwrap();
        assert_eq!(counts, vec![(day(25), 1), (day(26), 2), (day(27), 1)]);

        let errors = QueryBuilder::new(table().lazy())
            .filter_status(">=400")
            .unwrap()
            .collect()
            .unwrap();
        let counts = daily_counts(LogTable::from_frame(errors).lazy()).unwrap();
        assert_eq!(counts, vec![(day(26), 2)]);
    }

    #[test]
    fn test_dataframe_to_json() {
        let df = QueryBuilder::new(table().lazy())
            .sort("size", true)
            .limit(1)
            .collect()
            .unwrap();
        let json = dataframe_to_json(&df).unwrap();
        assert!(json.contains("/a"));
        assert!(!json.contains("/Login"));
    }
}
