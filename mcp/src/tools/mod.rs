use rmcp::{ServerHandler, model::*, tool, tool_router, handler::server::tool::ToolRouter};
use rmcp::handler::server::tool::ToolCallContext;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::service::{RequestContext, RoleServer};
use rmcp::ErrorData as McpError;
use chrono::NaiveDate;
use polars::prelude::IntoLazy;
use serde::Deserialize;
use schemars::JsonSchema;
use std::fmt::Display;
use std::future::Future;
use std::path::Path;

use crate::config::AnalyzerConfig;
use crate::engine::query::{daily_counts, dataframe_to_json, get_schema_info, value_counts};
use crate::engine::table::{COL_IP, COL_PATH};
use crate::engine::{
    CompareOptions, DateRange, IngestMode, Ingested, Ingester, LogTable, QueryBuilder,
    build_sessions, compare_periods, compute_stats, export_sessions_csv, export_table_csv,
    filter_bots, session_stats,
};
use crate::parsers::diagnose::{self, DEFAULT_DIAGNOSE_LINES, Recommendation, format_bytes};

#[derive(Clone)]
pub struct AccessLogServer {
    config: AnalyzerConfig,
    tool_router: ToolRouter<Self>,
}

// Tool parameter structures
#[derive(Debug, Deserialize, JsonSchema)]
pub struct AnalyzeLogsParams {
    /// Path to an access log (Apache/Nginx combined or JSON lines)
    pub path: String,
    /// Ingestion mode: "prefix" (first lines) or "sample" (random lines)
    pub mode: Option<String>,
    /// Read only the first N lines (prefix mode)
    pub limit: Option<usize>,
    /// Number of random lines to read (sample mode)
    pub sample_size: Option<usize>,
    /// Remove crawler and HTTP-library traffic (default true)
    #[serde(default = "default_true")]
    pub exclude_bots: bool,
    /// Filter by status code (e.g., ">=400", "500", "4xx", "!=200")
    pub filter_status: Option<String>,
    /// Case-insensitive text that the request path must contain
    pub filter_path: Option<String>,
    /// Regular expression the request path must match
    pub path_pattern: Option<String>,
    /// First date to include (YYYY-MM-DD)
    pub date_start: Option<String>,
    /// Last date to include (YYYY-MM-DD)
    pub date_end: Option<String>,
    /// Number of top IPs and paths to list (default 10)
    #[serde(default = "default_top")]
    pub top: u32,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SessionAnalysisParams {
    /// Path to an access log
    pub path: String,
    /// Ingestion mode: "prefix" or "sample"
    pub mode: Option<String>,
    /// Read only the first N lines (prefix mode)
    pub limit: Option<usize>,
    /// Number of random lines to read (sample mode)
    pub sample_size: Option<usize>,
    /// Remove bot traffic before building sessions (default true)
    #[serde(default = "default_true")]
    pub exclude_bots: bool,
    /// Inactivity gap in minutes that ends a session (default from config, 30)
    pub timeout_minutes: Option<u32>,
    /// Number of longest sessions to include (default 10)
    #[serde(default = "default_top")]
    pub top: u32,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ComparePeriodsParams {
    /// Path to an access log
    pub path: String,
    /// Ingestion mode: "prefix" or "sample"
    pub mode: Option<String>,
    /// Read only the first N lines (prefix mode)
    pub limit: Option<usize>,
    /// Number of random lines to read (sample mode)
    pub sample_size: Option<usize>,
    /// First period start (YYYY-MM-DD)
    pub period1_start: String,
    /// First period end, inclusive (YYYY-MM-DD)
    pub period1_end: String,
    /// Second period start (YYYY-MM-DD)
    pub period2_start: String,
    /// Second period end, inclusive (YYYY-MM-DD)
    pub period2_end: String,
    /// Remove bot traffic in both periods (default true)
    #[serde(default = "default_true")]
    pub exclude_bots: bool,
    /// Compare sessions instead of raw requests
    #[serde(default)]
    pub use_sessions: bool,
    /// Session inactivity gap in minutes
    pub timeout_minutes: Option<u32>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DiagnoseLogParams {
    /// Path to the log file
    pub path: String,
    /// Number of leading lines to inspect (default 10)
    #[serde(default = "default_diagnose_lines")]
    pub lines: usize,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExportCsvParams {
    /// Path to an access log
    pub path: String,
    /// Destination CSV file (created or truncated)
    pub output: String,
    /// What to export: "records" (default) or "sessions"
    #[serde(default = "default_export_kind")]
    pub kind: String,
    /// Ingestion mode: "prefix" or "sample"
    pub mode: Option<String>,
    /// Read only the first N lines (prefix mode)
    pub limit: Option<usize>,
    /// Number of random lines to read (sample mode)
    pub sample_size: Option<usize>,
    /// Remove bot traffic before exporting (default true)
    #[serde(default = "default_true")]
    pub exclude_bots: bool,
    /// Add session columns to exported records, or set the gap for "sessions"
    pub timeout_minutes: Option<u32>,
}

fn default_true() -> bool { true }
fn default_top() -> u32 { 10 }
fn default_diagnose_lines() -> usize { DEFAULT_DIAGNOSE_LINES }
fn default_export_kind() -> String { "records".to_string() }

fn tool_error(message: impl Display) -> CallToolResult {
    CallToolResult::error(vec![Content::text(message.to_string())])
}

fn parse_date(value: &str, field: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| format!("{field} must be YYYY-MM-DD, got {value:?}: {e}"))
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}

#[tool_router]
impl AccessLogServer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            config,
            tool_router: Self::tool_router(),
        }
    }

    /// Ingest with the server configuration; with no mode, limit or sample
    /// size the whole file is read
    fn load(
        &self,
        path: &str,
        mode: Option<&str>,
        limit: Option<usize>,
        sample_size: Option<usize>,
    ) -> Result<Ingested, String> {
        let mode = mode.or((limit.is_none() && sample_size.is_none()).then_some("prefix"));
        let mode = IngestMode::resolve(mode, limit, sample_size).map_err(|e| e.to_string())?;
        Ingester::new(self.config.clone())
            .ingest(Path::new(path), mode)
            .map_err(|e| format!("Error ingesting logs: {}", e))
    }

    fn ingest_summary(ingested: &Ingested) -> String {
        let summary = ingested.summary();
        let mut out = format!(
            "Parsed {} of {} lines ({} errors)",
            summary.rows, summary.lines_processed, summary.error_count
        );
        if let Some(rate) = summary.success_rate {
            out.push_str(&format!(", success rate {:.1}%", rate * 100.0));
        }
        if let Some(estimate) = &summary.estimate {
            out.push_str(&format!(", estimated file size {} lines", estimate.estimated_lines));
        }
        out.push('\n');
        for sample in &summary.error_samples {
            out.push_str(&format!(
                "  line {}: {} ({})\n",
                sample.line_number + 1,
                sample.line,
                sample.reason
            ));
        }
        out
    }

    #[tool(description = "Ingest an access log (Apache/Nginx combined or JSON lines), optionally drop bots and filter by status, path or date, and report traffic statistics with the top IPs and paths.")]
    async fn analyze_logs(&self, Parameters(params): Parameters<AnalyzeLogsParams>) -> Result<CallToolResult, McpError> {
        let ingested = match self.load(&params.path, params.mode.as_deref(), params.limit, params.sample_size) {
            Ok(i) => i,
            Err(e) => return Ok(tool_error(e)),
        };
        let (table, bots) = match filter_bots(&ingested.table, params.exclude_bots) {
            Ok(r) => r,
            Err(e) => return Ok(tool_error(format!("Bot filter error: {}", e))),
        };

        let start = match params.date_start.as_deref().map(|d| parse_date(d, "date_start")).transpose() {
            Ok(d) => d,
            Err(e) => return Ok(tool_error(e)),
        };
        let end = match params.date_end.as_deref().map(|d| parse_date(d, "date_end")).transpose() {
            Ok(d) => d,
            Err(e) => return Ok(tool_error(e)),
        };

        let mut qb = QueryBuilder::new(table.lazy()).filter_date_range(start, end);
        if let Some(status_filter) = &params.filter_status {
            qb = match qb.filter_status(status_filter) {
                Ok(qb) => qb,
                Err(e) => return Ok(tool_error(e)),
            };
        }
        if let Some(text) = &params.filter_path {
            qb = qb.filter_text(COL_PATH, text, false);
        }
        if let Some(pattern) = &params.path_pattern {
            if let Err(e) = regex::Regex::new(pattern) {
                return Ok(tool_error(format!("Invalid path_pattern: {}", e)));
            }
            qb = qb.filter_regex(COL_PATH, pattern);
        }
        let table = match qb.collect() {
            Ok(df) => LogTable::from_frame(df),
            Err(e) => return Ok(tool_error(format!("Query error: {}", e))),
        };

        let stats = match compute_stats(&table) {
            Ok(s) => s,
            Err(e) => return Ok(tool_error(format!("Stats error: {}", e))),
        };
        let top = params.top as usize;
        let top_ips = value_counts(table.lazy(), COL_IP)
            .map(|v| v.into_iter().take(top).collect::<Vec<_>>())
            .unwrap_or_default();
        let top_paths = value_counts(table.lazy(), COL_PATH)
            .map(|v| v.into_iter().take(top).collect::<Vec<_>>())
            .unwrap_or_default();
        let per_date: Vec<_> = daily_counts(table.lazy())
            .unwrap_or_default()
            .into_iter()
            .map(|(date, requests)| serde_json::json!({ "date": date.to_string(), "requests": requests }))
            .collect();

        let mut output = Self::ingest_summary(&ingested);
        if params.exclude_bots {
            output.push_str(&format!("Bots removed: {}\n", bots));
        }
        output.push_str(&format!(
            "\n## Stats ({} requests, {} transferred)\n\n{}\n",
            stats.total_requests,
            format_bytes(stats.total_size),
            to_json(&stats)
        ));
        output.push_str(&format!("\n## Top IPs\n\n{}\n", to_json(&top_ips)));
        output.push_str(&format!("\n## Top paths\n\n{}\n", to_json(&top_paths)));
        output.push_str(&format!("\n## Requests per day\n\n{}\n", to_json(&per_date)));
        output.push_str("\n## Schema\n\n| Column | Type |\n|--------|------|\n");
        for (name, dtype) in get_schema_info(table.frame()) {
            output.push_str(&format!("| {} | {} |\n", name, dtype));
        }

        Ok(CallToolResult::success(vec![Content::text(output)]))
    }

    #[tool(description = "Group requests into per-IP sessions split by an inactivity timeout (default 30 minutes) and report session counts, unique users, average pageviews and duration, sessions per day, and the longest sessions.")]
    async fn session_analysis(&self, Parameters(params): Parameters<SessionAnalysisParams>) -> Result<CallToolResult, McpError> {
        let ingested = match self.load(&params.path, params.mode.as_deref(), params.limit, params.sample_size) {
            Ok(i) => i,
            Err(e) => return Ok(tool_error(e)),
        };
        let (table, bots) = match filter_bots(&ingested.table, params.exclude_bots) {
            Ok(r) => r,
            Err(e) => return Ok(tool_error(format!("Bot filter error: {}", e))),
        };

        let timeout = params.timeout_minutes.unwrap_or(self.config.session_timeout_minutes);
        let stats = match build_sessions(&table, timeout)
            .map_err(|e| e.to_string())
            .and_then(|t| session_stats(&t).map_err(|e| e.to_string()))
        {
            Ok(s) => s,
            Err(e) => return Ok(tool_error(format!("Session error: {}", e))),
        };

        let longest = QueryBuilder::new(stats.details.clone().lazy())
            .sort("pageviews", true)
            .limit(params.top)
            .collect()
            .and_then(|df| dataframe_to_json(&df))
            .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e));

        let summary = serde_json::json!({
            "timeout_minutes": timeout,
            "bots_removed": bots,
            "total_sessions": stats.total_sessions,
            "unique_users": stats.unique_users,
            "avg_pageviews_per_session": stats.avg_pageviews_per_session,
            "avg_session_duration_minutes": stats.avg_session_duration_minutes,
            "sessions_by_date": stats.sessions_by_date,
        });

        let output = format!(
            "{}\n## Sessions\n\n{}\n\n## Longest sessions\n\n{}",
            Self::ingest_summary(&ingested),
            to_json(&summary),
            longest
        );
        Ok(CallToolResult::success(vec![Content::text(output)]))
    }

    #[tool(description = "Compare two inclusive date ranges of an access log: requests (or sessions), unique visitors, errors and bytes, with absolute and percent changes.")]
    async fn compare_periods(&self, Parameters(params): Parameters<ComparePeriodsParams>) -> Result<CallToolResult, McpError> {
        let ranges = (|| -> Result<(DateRange, DateRange), String> {
            let first = DateRange::new(
                parse_date(&params.period1_start, "period1_start")?,
                parse_date(&params.period1_end, "period1_end")?,
            )
            .map_err(|e| e.to_string())?;
            let second = DateRange::new(
                parse_date(&params.period2_start, "period2_start")?,
                parse_date(&params.period2_end, "period2_end")?,
            )
            .map_err(|e| e.to_string())?;
            Ok((first, second))
        })();
        let (first, second) = match ranges {
            Ok(r) => r,
            Err(e) => return Ok(tool_error(e)),
        };

        let ingested = match self.load(&params.path, params.mode.as_deref(), params.limit, params.sample_size) {
            Ok(i) => i,
            Err(e) => return Ok(tool_error(e)),
        };
        let options = CompareOptions {
            exclude_bots: params.exclude_bots,
            use_sessions: params.use_sessions,
            session_timeout_minutes: params
                .timeout_minutes
                .unwrap_or(self.config.session_timeout_minutes),
        };

        match compare_periods(&ingested.table, first, second, options) {
            Ok(comparison) => {
                let unit = if comparison.used_sessions { "sessions" } else { "requests" };
                let output = format!(
                    "{}\n{}: {} -> {} ({:+} / {:+.1}%)\nBytes: {} -> {}\n\n{}",
                    Self::ingest_summary(&ingested),
                    unit,
                    comparison.period1.requests,
                    comparison.period2.requests,
                    comparison.requests.absolute,
                    comparison.requests.percent,
                    format_bytes(comparison.period1.size),
                    format_bytes(comparison.period2.size),
                    to_json(&comparison)
                );
                Ok(CallToolResult::success(vec![Content::text(output)]))
            }
            Err(e) => Ok(tool_error(format!("Comparison error: {}", e))),
        }
    }

    #[tool(description = "Inspect the first lines of a log file, report which lines look like JSON or Apache/Nginx combined log, and recommend a parser. Use this first on an unfamiliar file.")]
    async fn diagnose_log(&self, Parameters(params): Parameters<DiagnoseLogParams>) -> Result<CallToolResult, McpError> {
        let path = Path::new(&params.path);
        let info = match diagnose::file_info(path) {
            Ok(i) => i,
            Err(e) => return Ok(tool_error(format!("Error reading {}: {}", params.path, e))),
        };
        let report = match diagnose::diagnose(path, params.lines) {
            Ok(r) => r,
            Err(e) => return Ok(tool_error(format!("Error reading {}: {}", params.path, e))),
        };

        let verdict = match report.recommendation {
            Recommendation::Apache => "Use the Apache/Nginx combined log parser",
            Recommendation::Json => "Use the JSON parser",
            Recommendation::Unknown => "No known format detected",
        };
        let output = format!(
            "File: {} ({}, {}{} lines)\nJSON lines: {}\nApache lines: {}\nRecommendation: {}\n\n{}",
            params.path,
            format_bytes(info.size_bytes),
            if info.estimated { "~" } else { "" },
            info.line_count,
            report.json_count,
            report.apache_count,
            verdict,
            to_json(&report.lines)
        );
        Ok(CallToolResult::success(vec![Content::text(output)]))
    }

    #[tool(description = "Export parsed records (optionally with session columns) or per-session summaries to a CSV file with a header row.")]
    async fn export_csv(&self, Parameters(params): Parameters<ExportCsvParams>) -> Result<CallToolResult, McpError> {
        let ingested = match self.load(&params.path, params.mode.as_deref(), params.limit, params.sample_size) {
            Ok(i) => i,
            Err(e) => return Ok(tool_error(e)),
        };
        let (table, _) = match filter_bots(&ingested.table, params.exclude_bots) {
            Ok(r) => r,
            Err(e) => return Ok(tool_error(format!("Bot filter error: {}", e))),
        };
        let output = Path::new(&params.output);

        let written = match params.kind.to_lowercase().as_str() {
            "records" => {
                let table = match params.timeout_minutes {
                    Some(timeout) => match build_sessions(&table, timeout) {
                        Ok(t) => t,
                        Err(e) => return Ok(tool_error(format!("Session error: {}", e))),
                    },
                    None => table,
                };
                export_table_csv(&table, output).map_err(|e| e.to_string())
            }
            "sessions" => {
                let timeout = params.timeout_minutes.unwrap_or(self.config.session_timeout_minutes);
                build_sessions(&table, timeout)
                    .map_err(|e| e.to_string())
                    .and_then(|t| session_stats(&t).map_err(|e| e.to_string()))
                    .and_then(|stats| export_sessions_csv(&stats, output).map_err(|e| e.to_string()))
            }
            other => return Ok(tool_error(format!("Unknown export kind: {} (expected \"records\" or \"sessions\")", other))),
        };

        match written {
            Ok(rows) => Ok(CallToolResult::success(vec![Content::text(format!(
                "Wrote {} {} rows to {}",
                rows, params.kind, params.output
            ))])),
            Err(e) => Ok(tool_error(format!("Export error: {}", e))),
        }
    }
}

impl ServerHandler for AccessLogServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Web access log analysis powered by Polars. Use diagnose_log first on an unfamiliar \
                 file, then analyze_logs for traffic statistics, session_analysis for visitor \
                 sessions, compare_periods to compare date ranges, and export_csv to save results. \
                 Supports Apache/Nginx combined log and JSON-per-line formats; pass sample_size to \
                 analyze a random subset of very large files.".to_string()
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        async move {
            Ok(ListToolsResult {
                tools: self.tool_router.list_all(),
                next_cursor: None,
                meta: None,
            })
        }
    }

    fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        let ctx = ToolCallContext::new(self, request, context);
        self.tool_router.call(ctx)
    }
}
