//! Streaming ingestion of access-log files into a [`LogTable`]
//!
//! Two mutually exclusive strategies:
//! 1. Prefix - parse the first N lines (or the whole file) in order
//! 2. Sample - draw N distinct line indices uniformly from an *estimated*
//!    line count, then parse only those lines in one sequential pass
//!
//! Lines that fail to parse are counted and a few are kept for
//! diagnostics; only I/O failures abort a run.

use polars::prelude::PolarsError;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

use super::table::{LogTable, TableBuilder};
use crate::config::AnalyzerConfig;
use crate::parsers::{LogRecord, ParserChain};

/// Characters of a failing line kept in an [`ErrorSample`]
const ERROR_SAMPLE_CHARS: usize = 100;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid ingestion request: {0}")]
    Config(String),
    #[error("failed to read {}: {source} ({errors} line errors before failure)", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
        errors: usize,
    },
    #[error("ingestion cancelled after {lines} lines ({errors} line errors)")]
    Cancelled { lines: usize, errors: usize },
    #[error("failed to build table: {0}")]
    Table(#[from] PolarsError),
}

impl IngestError {
    /// Line errors counted before the run stopped
    pub fn error_count(&self) -> usize {
        match self {
            IngestError::Io { errors, .. } | IngestError::Cancelled { errors, .. } => *errors,
            IngestError::Config(_) | IngestError::Table(_) => 0,
        }
    }
}

/// Which lines of the file become rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum IngestMode {
    /// First `limit` lines in file order; `None` reads to end of file
    Prefix { limit: Option<usize> },
    /// `sample_size` lines drawn uniformly at random
    Sample { sample_size: usize },
}

impl IngestMode {
    pub fn prefix(limit: usize) -> Self {
        IngestMode::Prefix { limit: Some(limit) }
    }

    pub fn whole_file() -> Self {
        IngestMode::Prefix { limit: None }
    }

    pub fn sample(sample_size: usize) -> Self {
        IngestMode::Sample { sample_size }
    }

    /// Validate a loosely specified request before any I/O happens
    ///
    /// Without an explicit mode exactly one of `limit` / `sample_size` must be
    /// given. An explicit `prefix` with no limit reads the whole file.
    pub fn resolve(
        mode: Option<&str>,
        limit: Option<usize>,
        sample_size: Option<usize>,
    ) -> Result<Self, IngestError> {
        if limit.is_some() && sample_size.is_some() {
            return Err(IngestError::Config(
                "limit and sample_size are mutually exclusive".to_string(),
            ));
        }
        if limit == Some(0) || sample_size == Some(0) {
            return Err(IngestError::Config("limit and sample_size must be positive".to_string()));
        }

        match mode.map(|m| m.trim().to_lowercase()).as_deref() {
            Some("prefix") | Some("head") => Ok(IngestMode::Prefix { limit }),
            Some("sample") | Some("random") => match (limit, sample_size) {
                (None, Some(n)) => Ok(IngestMode::sample(n)),
                _ => Err(IngestError::Config("sample mode requires sample_size".to_string())),
            },
            Some(other) => Err(IngestError::Config(format!(
                "unknown mode {other:?} (expected \"prefix\" or \"sample\")"
            ))),
            None => match (limit, sample_size) {
                (Some(n), None) => Ok(IngestMode::prefix(n)),
                (None, Some(n)) => Ok(IngestMode::sample(n)),
                _ => Err(IngestError::Config(
                    "one of limit or sample_size is required".to_string(),
                )),
            },
        }
    }
}

/// Advisory progress, reported after each flushed chunk
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IngestProgress {
    /// Estimated completion in `[0, 1]`
    pub fraction: f64,
    /// Lines read from the file so far
    pub lines_processed: usize,
}

/// A failing line surfaced for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorSample {
    /// Zero-based line index in the file
    pub line_number: usize,
    pub line: String,
    pub reason: String,
}

/// Cooperative stop flag, checked at chunk boundaries
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Line-count estimate extrapolated from a prefix probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineEstimate {
    pub file_size: u64,
    pub probe_bytes: usize,
    pub probe_lines: usize,
    pub estimated_lines: usize,
}

/// Estimate the number of lines from the newline density of the first
/// `probe_bytes` bytes; `fallback` when the probe holds no newline
pub fn estimate_line_count(
    path: &Path,
    probe_bytes: usize,
    fallback: usize,
) -> std::io::Result<LineEstimate> {
    let file = File::open(path)?;
    let file_size = file.metadata()?.len();
    let mut probe = Vec::with_capacity(probe_bytes);
    file.take(probe_bytes as u64).read_to_end(&mut probe)?;

    let probe_lines = memchr::memchr_iter(b'\n', &probe).count();
    let estimated_lines = if probe_lines == 0 {
        fallback
    } else {
        (file_size as f64 / probe.len() as f64 * probe_lines as f64) as usize
    };

    Ok(LineEstimate {
        file_size,
        probe_bytes: probe.len(),
        probe_lines,
        estimated_lines,
    })
}

/// Outcome of one ingestion run
#[derive(Debug, Clone)]
pub struct Ingested {
    pub table: LogTable,
    /// Lines handed to the parser that produced no record
    pub error_count: usize,
    /// Lines handed to the parser
    pub lines_processed: usize,
    /// Lines read from the file, selected or not
    pub lines_scanned: usize,
    /// Strategy actually used (sample mode may fall back to prefix)
    pub mode: IngestMode,
    pub estimate: Option<LineEstimate>,
    pub error_samples: Vec<ErrorSample>,
}

impl Ingested {
    pub fn success_rate(&self) -> Option<f64> {
        (self.lines_processed > 0)
            .then(|| self.table.height() as f64 / self.lines_processed as f64)
    }

    pub fn summary(&self) -> IngestSummary {
        IngestSummary {
            rows: self.table.height(),
            error_count: self.error_count,
            lines_processed: self.lines_processed,
            lines_scanned: self.lines_scanned,
            success_rate: self.success_rate(),
            mode: self.mode,
            estimate: self.estimate,
            error_samples: self.error_samples.clone(),
        }
    }
}

/// Serializable run report, without the table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestSummary {
    pub rows: usize,
    pub error_count: usize,
    pub lines_processed: usize,
    pub lines_scanned: usize,
    pub success_rate: Option<f64>,
    pub mode: IngestMode,
    pub estimate: Option<LineEstimate>,
    pub error_samples: Vec<ErrorSample>,
}

/// Owned staging buffer between the parser and the table columns
///
/// Records collect here until a chunk is full, then move into the
/// [`TableBuilder`]; the buffer keeps its allocation for the next chunk.
struct RecordBuffer {
    pending: Vec<LogRecord>,
    chunk_size: usize,
}

impl RecordBuffer {
    fn new(chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            pending: Vec::with_capacity(chunk_size),
            chunk_size,
        }
    }

    /// Returns true once the chunk is full
    fn push(&mut self, record: LogRecord) -> bool {
        self.pending.push(record);
        self.pending.len() >= self.chunk_size
    }

    fn flush_into(&mut self, builder: &mut TableBuilder) {
        builder.extend(self.pending.drain(..));
    }
}

/// Which lines the scan hands to the parser
enum Selection {
    Prefix(Option<usize>),
    /// Sorted, distinct line indices
    Indices(Vec<usize>),
}

impl Selection {
    fn exhausted(&self, line_number: usize, cursor: usize) -> bool {
        match self {
            Selection::Prefix(Some(limit)) => line_number >= *limit,
            Selection::Prefix(None) => false,
            Selection::Indices(indices) => cursor >= indices.len(),
        }
    }
}

/// Decode one raw line, dropping invalid UTF-8 and the line terminator
fn decode_line(bytes: &[u8]) -> Cow<'_, str> {
    let text = match String::from_utf8_lossy(bytes) {
        Cow::Borrowed(s) => Cow::Borrowed(s),
        Cow::Owned(s) => Cow::Owned(s.replace(char::REPLACEMENT_CHARACTER, "")),
    };
    match text {
        Cow::Borrowed(s) => Cow::Borrowed(s.trim_end_matches(['\n', '\r'])),
        Cow::Owned(s) => Cow::Owned(s.trim_end_matches(['\n', '\r']).to_string()),
    }
}

/// Ingestion engine with optional progress reporting and cancellation
pub struct Ingester<'a> {
    config: AnalyzerConfig,
    chain: ParserChain,
    progress: Option<Box<dyn FnMut(IngestProgress) + 'a>>,
    cancel: Option<CancellationToken>,
}

impl<'a> Ingester<'a> {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            config,
            chain: ParserChain::default(),
            progress: None,
            cancel: None,
        }
    }

    pub fn with_parsers(mut self, chain: ParserChain) -> Self {
        self.chain = chain;
        self
    }

    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(IngestProgress) + 'a,
    {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn ingest(&mut self, path: &Path, mode: IngestMode) -> Result<Ingested, IngestError> {
        match mode {
            IngestMode::Prefix { limit } => {
                if limit == Some(0) {
                    return Err(IngestError::Config("limit must be positive".to_string()));
                }
                self.ingest_prefix(path, limit, None)
            }
            IngestMode::Sample { sample_size } => {
                if sample_size == 0 {
                    return Err(IngestError::Config("sample_size must be positive".to_string()));
                }
                self.ingest_sample(path, sample_size)
            }
        }
    }

    fn ingest_prefix(
        &mut self,
        path: &Path,
        limit: Option<usize>,
        estimate: Option<LineEstimate>,
    ) -> Result<Ingested, IngestError> {
        tracing::info!(path = %path.display(), ?limit, "ingesting log prefix");
        let max_samples = self.config.prefix_error_samples;
        let mut ingested = self.scan(path, Selection::Prefix(limit), None, max_samples)?;
        ingested.mode = IngestMode::Prefix { limit };
        ingested.estimate = estimate;
        Ok(ingested)
    }

    fn ingest_sample(&mut self, path: &Path, sample_size: usize) -> Result<Ingested, IngestError> {
        let estimate = estimate_line_count(
            path,
            self.config.probe_bytes,
            self.config.fallback_line_estimate,
        )
        .map_err(|source| io_error(path, source, 0))?;
        tracing::info!(
            path = %path.display(),
            estimated_lines = estimate.estimated_lines,
            sample_size,
            "estimated line count"
        );

        if estimate.estimated_lines <= sample_size {
            tracing::info!("file smaller than sample, ingesting every estimated line");
            return self.ingest_prefix(path, Some(estimate.estimated_lines), Some(estimate));
        }

        let mut rng = match self.config.sample_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut indices =
            rand::seq::index::sample(&mut rng, estimate.estimated_lines, sample_size).into_vec();
        indices.sort_unstable();

        let max_samples = self.config.sample_error_samples;
        let mut ingested = self.scan(
            path,
            Selection::Indices(indices),
            Some(estimate.estimated_lines),
            max_samples,
        )?;
        if ingested.lines_processed < sample_size {
            tracing::info!(
                requested = sample_size,
                sampled = ingested.lines_processed,
                "file shorter than estimated, sampled fewer lines than requested"
            );
        }
        ingested.mode = IngestMode::sample(sample_size);
        ingested.estimate = Some(estimate);
        Ok(ingested)
    }

    fn scan(
        &mut self,
        path: &Path,
        selection: Selection,
        estimated_total: Option<usize>,
        max_samples: usize,
    ) -> Result<Ingested, IngestError> {
        let file = File::open(path).map_err(|source| io_error(path, source, 0))?;
        let file_size = file
            .metadata()
            .map_err(|source| io_error(path, source, 0))?
            .len();
        let mut reader = BufReader::new(file);

        let chunk_size = self.config.chunk_size.max(1);
        let mut buffer = RecordBuffer::new(chunk_size);
        let mut builder = TableBuilder::new();
        let mut error_samples = Vec::new();
        let mut errors = 0usize;
        let mut processed = 0usize;
        let mut line_number = 0usize;
        let mut cursor = 0usize;
        let mut bytes_read = 0u64;
        let mut raw = Vec::new();

        while !selection.exhausted(line_number, cursor) {
            raw.clear();
            let n = reader
                .read_until(b'\n', &mut raw)
                .map_err(|source| io_error(path, source, errors))?;
            if n == 0 {
                break;
            }
            bytes_read += n as u64;

            let selected = match &selection {
                Selection::Prefix(_) => true,
                Selection::Indices(indices) => {
                    let hit = indices[cursor] == line_number;
                    if hit {
                        cursor += 1;
                    }
                    hit
                }
            };

            if selected {
                processed += 1;
                let line = decode_line(&raw);
                match self.chain.parse(&line) {
                    Ok(record) => {
                        if buffer.push(record) {
                            buffer.flush_into(&mut builder);
                            tracing::debug!(records = builder.len(), "chunk flushed");
                            let fraction = match (&selection, estimated_total) {
                                (Selection::Prefix(Some(limit)), _) => line_number as f64 / *limit as f64,
                                (_, Some(total)) => line_number as f64 / total as f64,
                                _ if file_size > 0 => bytes_read as f64 / file_size as f64,
                                _ => 1.0,
                            };
                            self.report(fraction, line_number + 1);
                        }
                    }
                    Err(failure) => {
                        errors += 1;
                        if error_samples.len() < max_samples {
                            let line: String = line.chars().take(ERROR_SAMPLE_CHARS).collect();
                            tracing::warn!(line_number, %failure, "unparseable line: {}", line);
                            error_samples.push(ErrorSample {
                                line_number,
                                line,
                                reason: failure.to_string(),
                            });
                        }
                    }
                }
            }

            line_number += 1;
            if line_number % chunk_size == 0 && self.is_cancelled() {
                return Err(IngestError::Cancelled {
                    lines: line_number,
                    errors,
                });
            }
        }

        buffer.flush_into(&mut builder);
        let table = builder.finish()?;
        let parsed = table.height();
        tracing::info!(
            lines_scanned = line_number,
            lines_processed = processed,
            parsed,
            errors,
            success_rate = if processed > 0 { parsed as f64 / processed as f64 * 100.0 } else { 0.0 },
            "ingestion finished"
        );

        Ok(Ingested {
            table,
            error_count: errors,
            lines_processed: processed,
            lines_scanned: line_number,
            mode: IngestMode::Prefix { limit: None },
            estimate: None,
            error_samples,
        })
    }

    fn report(&mut self, fraction: f64, lines_processed: usize) {
        if let Some(callback) = self.progress.as_mut() {
            callback(IngestProgress {
                fraction: fraction.clamp(0.0, 1.0),
                lines_processed,
            });
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

fn io_error(path: &Path, source: std::io::Error, errors: usize) -> IngestError {
    tracing::error!(path = %path.display(), %source, "log file unreadable");
    IngestError::Io {
        path: path.to_path_buf(),
        source,
        errors,
    }
}

/// Ingest `path` with the default configuration
pub fn ingest(path: &Path, mode: IngestMode) -> Result<Ingested, IngestError> {
    Ingester::new(AnalyzerConfig::default()).ingest(path, mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn apache_line(i: usize) -> String {
        format!(
            r#"10.0.0.{} - - [26/May/2025:10:{:02}:00 +0000] "GET /page/{} HTTP/1.1" 200 {} "-" "Mozilla/5.0""#,
            i % 7,
            i % 60,
            i,
            100 + i
        )
    }

    fn write_log(lines: &[String]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_resolve_mode() {
        assert_eq!(IngestMode::resolve(None, Some(10), None).unwrap(), IngestMode::prefix(10));
        assert_eq!(IngestMode::resolve(None, None, Some(5)).unwrap(), IngestMode::sample(5));
        assert_eq!(IngestMode::resolve(Some("prefix"), None, None).unwrap(), IngestMode::whole_file());
        assert!(matches!(IngestMode::resolve(None, Some(1), Some(1)), Err(IngestError::Config(_))));
        assert!(matches!(IngestMode::resolve(None, None, None), Err(IngestError::Config(_))));
        assert!(matches!(IngestMode::resolve(Some("sample"), None, None), Err(IngestError::Config(_))));
        assert!(matches!(IngestMode::resolve(Some("tail"), Some(1), None), Err(IngestError::Config(_))));
        assert!(matches!(IngestMode::resolve(None, Some(0), None), Err(IngestError::Config(_))));
    }

    #[test]
    fn test_prefix_limit_and_errors() {
        let mut lines: Vec<String> = (0..20).map(apache_line).collect();
        lines.insert(3, "garbage".to_string());
        lines.insert(5, String::new());
        let file = write_log(&lines);

        let ingested = ingest(file.path(), IngestMode::prefix(10)).unwrap();
        assert_eq!(ingested.lines_processed, 10);
        assert_eq!(ingested.error_count, 2);
        assert_eq!(ingested.table.height(), 8);
        assert_eq!(ingested.error_samples.len(), 2);
        assert_eq!(ingested.error_samples[0].line_number, 3);
        assert_eq!(ingested.error_samples[0].line, "garbage");

        let summary = ingested.summary();
        assert_eq!(summary.rows, 8);
        assert_eq!(summary.success_rate, Some(0.8));
        assert_eq!(summary.error_samples, ingested.error_samples);
    }

    #[test]
    fn test_error_samples_are_capped() {
        let lines: Vec<String> = (0..12).map(|i| format!("junk {i}")).collect();
        let file = write_log(&lines);
        let ingested = ingest(file.path(), IngestMode::whole_file()).unwrap();
        assert_eq!(ingested.error_count, 12);
        assert_eq!(ingested.error_samples.len(), 5);
        assert!(ingested.table.is_empty());
    }

    #[test]
    fn test_progress_after_each_chunk() {
        let lines: Vec<String> = (0..25).map(apache_line).collect();
        let file = write_log(&lines);
        let mut reports = Vec::new();
        {
            let mut ingester = Ingester::new(AnalyzerConfig::default().with_chunk_size(10))
                .with_progress(|p| reports.push(p));
            let ingested = ingester.ingest(file.path(), IngestMode::whole_file()).unwrap();
            assert_eq!(ingested.table.height(), 25);
        }
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].lines_processed, 10);
        assert!(reports.iter().all(|p| (0.0..=1.0).contains(&p.fraction)));
        assert!(reports[1].fraction > reports[0].fraction);
    }

    #[test]
    fn test_cancellation_at_chunk_boundary() {
        let lines: Vec<String> = (0..30).map(apache_line).collect();
        let file = write_log(&lines);
        let token = CancellationToken::new();
        token.cancel();
        let mut ingester = Ingester::new(AnalyzerConfig::default().with_chunk_size(10))
            .with_cancellation(token);
        let err = ingester.ingest(file.path(), IngestMode::whole_file()).unwrap_err();
        assert!(matches!(err, IngestError::Cancelled { lines: 10, errors: 0 }));
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let err = ingest(Path::new("/definitely/not/here.log"), IngestMode::prefix(5)).unwrap_err();
        assert!(matches!(err, IngestError::Io { errors: 0, .. }));
        assert_eq!(err.error_count(), 0);
    }

    #[test]
    fn test_invalid_utf8_is_ignored() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"10.0.0.1 - - [26/May/2025:10:00:00 +0000] \"GET /caf\xff\xfe HTTP/1.1\" 200 5 \"-\" \"UA\"\n")
            .unwrap();
        file.flush().unwrap();
        let ingested = ingest(file.path(), IngestMode::whole_file()).unwrap();
        assert_eq!(ingested.table.height(), 1);
        assert_eq!(
            ingested.table.string_values("path").unwrap()[0].as_deref(),
            Some("/caf")
        );
    }

    #[test]
    fn test_estimate_line_count() {
        let lines: Vec<String> = (0..50).map(apache_line).collect();
        let file = write_log(&lines);
        let whole = estimate_line_count(file.path(), 1_000_000, 100).unwrap();
        assert_eq!(whole.estimated_lines, 50);
        let empty = tempfile::NamedTempFile::new().unwrap();
        let fallback = estimate_line_count(empty.path(), 1000, 123).unwrap();
        assert_eq!(fallback.estimated_lines, 123);
        assert_eq!(fallback.file_size, 0);
    }

    #[test]
    fn test_sample_small_file_falls_back_to_prefix() {
        let lines: Vec<String> = (0..20).map(apache_line).collect();
        let file = write_log(&lines);
        let ingested = ingest(file.path(), IngestMode::sample(100)).unwrap();
        assert_eq!(ingested.mode, IngestMode::prefix(20));
        assert_eq!(ingested.table.height(), 20);
    }

    #[test]
    fn test_record_buffer_flushes_full_chunks() {
        let mut buffer = RecordBuffer::new(3);
        let mut builder = TableBuilder::default();
        let records: Vec<LogRecord> = (0..7)
            .map(|i| crate::parsers::parse_line(&apache_line(i)).unwrap())
            .collect();

        let mut flushes = 0;
        for record in records {
            if buffer.push(record) {
                buffer.flush_into(&mut builder);
                flushes += 1;
                assert!(buffer.pending.is_empty());
                assert!(buffer.pending.capacity() >= 3);
            }
        }
        assert_eq!(flushes, 2);
        assert_eq!(builder.len(), 6);
        buffer.flush_into(&mut builder);
        assert_eq!(builder.len(), 7);
    }

    #[test]
    fn test_sample_overestimate_returns_fewer_rows() {
        // dense short lines up front inflate the estimate
        let mut lines: Vec<String> = (0..2000).map(apache_line).collect();
        let long_path = format!("/long/{}", "x".repeat(2000));
        lines.extend((0..200).map(|i| {
            format!(
                r#"10.9.0.{} - - [27/May/2025:10:00:00 +0000] "GET {} HTTP/1.1" 200 1 "-" "Mozilla/5.0""#,
                i % 250,
                long_path
            )
        }));
        let file = write_log(&lines);

        let mut config = AnalyzerConfig::default().with_seed(11);
        config.probe_bytes = 20_000;
        let ingested = Ingester::new(config)
            .ingest(file.path(), IngestMode::sample(2100))
            .unwrap();

        let estimate = ingested.estimate.unwrap();
        assert!(estimate.estimated_lines > 2200);
        assert_eq!(ingested.mode, IngestMode::sample(2100));
        assert!(ingested.lines_processed > 0);
        assert!(ingested.lines_processed < 2100);
        assert_eq!(ingested.table.height(), ingested.lines_processed);
        assert_eq!(ingested.error_count, 0);
        assert_eq!(ingested.lines_scanned, 2200);
    }

    #[test]
    fn test_sample_draws_distinct_lines() {
        let lines: Vec<String> = (0..200).map(apache_line).collect();
        let file = write_log(&lines);
        let config = AnalyzerConfig::default().with_seed(42);
        let ingested = Ingester::new(config.clone())
            .ingest(file.path(), IngestMode::sample(30))
            .unwrap();
        assert_eq!(ingested.mode, IngestMode::sample(30));
        assert_eq!(ingested.lines_processed, 30);
        assert_eq!(ingested.table.height(), 30);

        let mut paths: Vec<String> = ingested
            .table
            .string_values("path")
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        paths.dedup();
        assert_eq!(paths.len(), 30);

        // same seed, same sample
        let again = Ingester::new(config).ingest(file.path(), IngestMode::sample(30)).unwrap();
        assert_eq!(again.table.string_values("path").unwrap(), ingested.table.string_values("path").unwrap());
    }
}
