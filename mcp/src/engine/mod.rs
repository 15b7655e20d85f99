pub mod bots;
pub mod compare;
pub mod export;
pub mod ingest;
pub mod query;
pub mod sessions;
pub mod stats;
pub mod table;

pub use bots::{filter_bots, is_bot};
pub use compare::{CompareOptions, DateRange, MetricDelta, PeriodComparison, compare_periods};
pub use export::{export_sessions_csv, export_table_csv, write_sessions_csv, write_table_csv};
pub use ingest::{
    CancellationToken, IngestError, IngestMode, IngestProgress, IngestSummary, Ingested, Ingester,
    ingest,
};
pub use query::{QueryBuilder, QueryError};
pub use sessions::{SessionStats, SessionSummary, build_sessions, session_stats};
pub use stats::{LogStats, compute_stats};
pub use table::{LogTable, TableBuilder, build_table};
