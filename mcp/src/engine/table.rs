use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;

use crate::parsers::LogRecord;

pub const COL_TIMESTAMP: &str = "timestamp";
pub const COL_DATE: &str = "date";
pub const COL_TIME: &str = "time";
pub const COL_IP: &str = "ip";
pub const COL_METHOD: &str = "method";
pub const COL_PATH: &str = "path";
pub const COL_VERSION: &str = "version";
pub const COL_STATUS: &str = "status_code";
pub const COL_SIZE: &str = "size";
pub const COL_REFERER: &str = "referer";
pub const COL_USER_AGENT: &str = "user_agent";
pub const COL_RAW_LINE: &str = "raw_line";
pub const COL_UTC_OFFSET: &str = "utc_offset";
pub const COL_SESSION_SEQ: &str = "session_seq";
pub const COL_SESSION_ID: &str = "session_id";

/// Time zone tag of the `timestamp` column
pub const UTC: &str = "UTC";

/// Column-wise accumulator for parsed records
///
/// Records are moved in chunk by chunk; [`TableBuilder::finish`] compacts the
/// columns into a [`LogTable`] without ever looking at the source file again.
#[derive(Debug, Default)]
pub struct TableBuilder {
    instants: Vec<NaiveDateTime>,
    offsets: Vec<Option<i32>>,
    dates: Vec<NaiveDate>,
    times: Vec<NaiveTime>,
    ips: Vec<String>,
    methods: Vec<String>,
    paths: Vec<String>,
    versions: Vec<String>,
    status_codes: Vec<u64>,
    sizes: Vec<u64>,
    referers: Vec<Option<String>>,
    user_agents: Vec<Option<String>>,
    raw_lines: Vec<String>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ips.is_empty()
    }

    pub fn push(&mut self, record: LogRecord) {
        self.instants.push(record.timestamp.instant());
        self.offsets.push(record.timestamp.utc_offset_seconds());
        self.dates.push(record.date);
        self.times.push(record.time);
        self.ips.push(record.ip);
        self.methods.push(record.method);
        self.paths.push(record.path);
        self.versions.push(record.version);
        self.status_codes.push(u64::from(record.status_code));
        self.sizes.push(record.size);
        self.referers.push(record.referer);
        self.user_agents.push(record.user_agent);
        self.raw_lines.push(record.raw_line);
    }

    pub fn extend<I: IntoIterator<Item = LogRecord>>(&mut self, records: I) {
        for record in records {
            self.push(record);
        }
    }

    pub fn finish(self) -> PolarsResult<LogTable> {
        // instants are stored in UTC whatever offset the source line carried
        let mut timestamps = DatetimeChunked::from_naive_datetime(
            COL_TIMESTAMP.into(),
            self.instants,
            TimeUnit::Milliseconds,
        );
        timestamps.set_time_zone(UTC.into())?;

        let columns = vec![
            timestamps.into_column(),
            DateChunked::from_naive_date(COL_DATE.into(), self.dates).into_column(),
            TimeChunked::from_naive_time(COL_TIME.into(), self.times).into_column(),
            categorical(COL_IP, self.ips)?,
            categorical(COL_METHOD, self.methods)?,
            Column::new(COL_PATH.into(), self.paths),
            categorical(COL_VERSION, self.versions)?,
            compact_unsigned(COL_STATUS, self.status_codes)?,
            compact_unsigned(COL_SIZE, self.sizes)?,
            Column::new(COL_REFERER.into(), self.referers),
            Column::new(COL_USER_AGENT.into(), self.user_agents),
            Column::new(COL_RAW_LINE.into(), self.raw_lines),
            Column::new(COL_UTC_OFFSET.into(), self.offsets),
        ];
        Ok(LogTable::from_frame(DataFrame::new(columns)?))
    }
}

/// Build a table from an already collected record set
pub fn build_table(records: Vec<LogRecord>) -> PolarsResult<LogTable> {
    let mut builder = TableBuilder::new();
    builder.extend(records);
    builder.finish()
}

/// Dictionary-encode a low-cardinality string column
fn categorical(name: &str, values: Vec<String>) -> PolarsResult<Column> {
    Column::new(name.into(), values)
        .cast(&DataType::Categorical(None, CategoricalOrdering::Lexical))
}

/// Smallest unsigned integer type holding every value
fn compact_unsigned(name: &str, values: Vec<u64>) -> PolarsResult<Column> {
    let max = values.iter().copied().max().unwrap_or(0);
    let dtype = if max <= u64::from(u8::MAX) {
        DataType::UInt8
    } else if max <= u64::from(u16::MAX) {
        DataType::UInt16
    } else if max <= u64::from(u32::MAX) {
        DataType::UInt32
    } else {
        DataType::UInt64
    };
    Column::new(name.into(), values).cast(&dtype)
}

/// Ordered, column-oriented set of parsed records
///
/// Tables are never mutated after construction: filtering and session
/// annotation return new tables.
#[derive(Debug, Clone)]
pub struct LogTable {
    frame: DataFrame,
}

impl LogTable {
    /// Table with the full record schema and no rows
    pub fn empty() -> PolarsResult<Self> {
        TableBuilder::new().finish()
    }

    pub(crate) fn from_frame(frame: DataFrame) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn lazy(&self) -> LazyFrame {
        self.frame.clone().lazy()
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.column(name).is_ok()
    }

    pub fn has_sessions(&self) -> bool {
        self.has_column(COL_SESSION_ID)
    }

    /// Rows where `mask` is true, as a new table
    pub fn filter(&self, mask: &BooleanChunked) -> PolarsResult<Self> {
        Ok(Self::from_frame(self.frame.filter(mask)?))
    }

    /// Any string-like column (plain or categorical) materialized as owned strings
    pub fn string_values(&self, name: &str) -> PolarsResult<Vec<Option<String>>> {
        let column = self.frame.column(name)?.cast(&DataType::String)?;
        let values = column
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect();
        Ok(values)
    }

    /// Integer column widened to u64, missing values read as 0
    pub fn u64_values(&self, name: &str) -> PolarsResult<Vec<u64>> {
        let column = self.frame.column(name)?.cast(&DataType::UInt64)?;
        let values = column.u64()?.into_iter().map(|v| v.unwrap_or(0)).collect();
        Ok(values)
    }

    /// Request instants as milliseconds since the epoch (UTC)
    pub fn instant_millis(&self) -> PolarsResult<Vec<i64>> {
        let column = self.frame.column(COL_TIMESTAMP)?.cast(&DataType::Int64)?;
        let values = column.i64()?.into_iter().map(|v| v.unwrap_or(0)).collect();
        Ok(values)
    }

    pub fn dates(&self) -> PolarsResult<Vec<Option<NaiveDate>>> {
        Ok(self.frame.column(COL_DATE)?.date()?.as_date_iter().collect())
    }
}
