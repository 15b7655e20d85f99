//! Format detection report for the head of a log file

use serde::Serialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use super::LineParser;
use super::apache::ApacheParser;
use super::json::extract_json_block;

pub const DEFAULT_DIAGNOSE_LINES: usize = 10;

/// Files above this size get an estimated rather than exact line count
const EXACT_COUNT_LIMIT: u64 = 100 * 1024 * 1024;
const ESTIMATE_PROBE_BYTES: u64 = 10_000;
const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApacheMatch {
    pub ip: String,
    pub method: String,
    pub path: String,
    pub status_code: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineDiagnosis {
    /// 1-based
    pub line_number: usize,
    pub preview: String,
    pub has_brace: bool,
    /// Keys of the extracted JSON object, if one was found
    pub json_keys: Option<Vec<String>>,
    pub apache: Option<ApacheMatch>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Apache,
    Json,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnosis {
    pub lines: Vec<LineDiagnosis>,
    pub json_count: usize,
    pub apache_count: usize,
    pub recommendation: Recommendation,
}

/// Inspect the first `max_lines` lines and recommend a parser
pub fn diagnose(path: &Path, max_lines: usize) -> io::Result<Diagnosis> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut raw = Vec::new();
    let mut lines = Vec::new();

    while lines.len() < max_lines {
        raw.clear();
        if reader.read_until(b'\n', &mut raw)? == 0 {
            break;
        }
        let text = String::from_utf8_lossy(&raw).replace(char::REPLACEMENT_CHARACTER, "");
        lines.push(diagnose_line(lines.len() + 1, text.trim()));
    }

    let json_count = lines.iter().filter(|l| l.json_keys.is_some()).count();
    let apache_count = lines.iter().filter(|l| l.apache.is_some()).count();
    let recommendation = if apache_count > json_count {
        Recommendation::Apache
    } else if json_count > 0 {
        Recommendation::Json
    } else {
        Recommendation::Unknown
    };

    tracing::debug!(
        path = %path.display(),
        lines = lines.len(),
        json_count,
        apache_count,
        ?recommendation,
        "diagnosed log file"
    );

    Ok(Diagnosis {
        lines,
        json_count,
        apache_count,
        recommendation,
    })
}

fn diagnose_line(line_number: usize, line: &str) -> LineDiagnosis {
    let has_brace = line.contains('{');
    let json_keys = has_brace
        .then(|| extract_json_block(line))
        .flatten()
        .map(|object| object.keys().cloned().collect());
    let apache = ApacheParser
        .parse(line)
        .ok()
        .flatten()
        .map(|record| ApacheMatch {
            ip: record.ip,
            method: record.method,
            path: record.path,
            status_code: record.status_code,
        });

    LineDiagnosis {
        line_number,
        preview: line.chars().take(PREVIEW_CHARS).collect(),
        has_brace,
        json_keys,
        apache,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub size_bytes: u64,
    /// Never below 1
    pub line_count: u64,
    pub estimated: bool,
}

/// Size and line count; large files are estimated from a short probe
pub fn file_info(path: &Path) -> io::Result<FileInfo> {
    let mut file = File::open(path)?;
    let size_bytes = file.metadata()?.len();

    let (line_count, estimated) = if size_bytes > EXACT_COUNT_LIMIT {
        let mut probe = Vec::with_capacity(ESTIMATE_PROBE_BYTES as usize);
        (&mut file).take(ESTIMATE_PROBE_BYTES).read_to_end(&mut probe)?;
        let probe_lines = memchr::memchr_iter(b'\n', &probe).count() as u64;
        let estimate = if probe_lines > 0 {
            (size_bytes as f64 / ESTIMATE_PROBE_BYTES as f64 * probe_lines as f64) as u64
        } else {
            size_bytes / 100
        };
        (estimate, true)
    } else {
        let mut count = 0u64;
        let mut last = b'\n';
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            count += memchr::memchr_iter(b'\n', &buf[..n]).count() as u64;
            last = buf[n - 1];
        }
        // a final line without a terminator still counts
        if last != b'\n' {
            count += 1;
        }
        (count, false)
    };

    Ok(FileInfo {
        size_bytes,
        line_count: line_count.max(1),
        estimated,
    })
}

/// Human-readable size: `0 B`, `512.00 B`, `1.50 KB`, ...
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if value < 1024.0 {
            return format!("{value:.2} {unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.2} TB")
}
