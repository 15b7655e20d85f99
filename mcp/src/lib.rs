//! Web access-log analysis: format detection and parsing, streaming
//! ingestion into Polars tables, bot filtering, session inference and
//! traffic statistics, exposed over MCP by the `access-log-mcp` binary.

pub mod config;
pub mod engine;
pub mod parsers;
pub mod tools;

pub use config::{AnalyzerConfig, ConfigError};
pub use engine::{
    IngestError, IngestMode, LogStats, LogTable, SessionStats, build_sessions, compute_stats,
    filter_bots, ingest, is_bot, session_stats,
};
pub use parsers::{LogRecord, ParseFailure, parse_line};
