// OutageSnap - core/model.rs
//
// Core data model types. Pure data definitions with no I/O.
//
// These types are the shared vocabulary across all layers.

use crate::util::constants;
use crate::util::error::ConfigError;
use chrono::NaiveDateTime;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

// =============================================================================
// Time window
// =============================================================================

/// The outage window, in the server's local wall-clock time.
///
/// Log timestamps are tested with [`TimeWindow::contains`] (both ends
/// inclusive) while file modification times are tested with
/// [`TimeWindow::contains_modified`] (end exclusive). Callers must use the
/// one matching what they test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    /// Build a window, rejecting `start > end`.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, ConfigError> {
        if start > end {
            return Err(ConfigError::InvalidWindow {
                start: start.format(constants::WINDOW_FORMAT).to_string(),
                end: end.format(constants::WINDOW_FORMAT).to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Parse `YYYY-MM-DD HH:MM:SS` start and end strings into a window.
    pub fn parse(start: &str, end: &str) -> Result<Self, ConfigError> {
        let start = parse_window_bound("start", start)?;
        let end = parse_window_bound("end", end)?;
        Self::new(start, end)
    }

    /// Log-line test: `start <= t <= end`.
    pub fn contains(&self, t: NaiveDateTime) -> bool {
        self.start <= t && t <= self.end
    }

    /// Modification-time test: `start <= t < end`.
    pub fn contains_modified(&self, t: NaiveDateTime) -> bool {
        self.start <= t && t < self.end
    }
}

fn parse_window_bound(field: &'static str, value: &str) -> Result<NaiveDateTime, ConfigError> {
    NaiveDateTime::parse_from_str(value.trim(), constants::WINDOW_FORMAT).map_err(|_| {
        ConfigError::InvalidTimestamp {
            field,
            value: value.to_string(),
            expected: "YYYY-MM-DD HH:MM:SS",
        }
    })
}

// =============================================================================
// Log sources
// =============================================================================

/// A compiled, immutable matching rule for one logical log.
///
/// One rule expands into one [`LogSource`] per candidate path once the path
/// templates are rendered for a given application.
#[derive(Debug, Clone)]
pub struct SourceRule {
    /// Logical log name (e.g. `nginx_access`).
    pub name: String,

    /// Free-form description from the source table.
    pub description: String,

    /// Candidate path templates, tried independently.
    pub path_templates: Vec<String>,

    /// Regex locating the timestamp within a line.
    pub timestamp_pattern: Regex,

    /// chrono format string for the captured timestamp.
    pub timestamp_format: String,

    /// True if the rule came from the embedded table.
    pub is_builtin: bool,
}

/// One concrete file to slice.
#[derive(Debug, Clone)]
pub struct LogSource {
    /// Logical log name shared by all candidates of the same rule.
    pub name: String,

    /// Unique label used for the slice artifact and summary key.
    pub label: String,

    /// Absolute path of the log file.
    pub path: PathBuf,

    pub timestamp_pattern: Regex,

    pub timestamp_format: String,
}

// =============================================================================
// Log slices
// =============================================================================

/// The lines of one log file that fell inside the window, byte-for-byte,
/// in file order and with their original terminators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSlice {
    bytes: Vec<u8>,
    line_count: usize,
}

impl LogSlice {
    pub(crate) fn new() -> Self {
        Self {
            bytes: Vec::new(),
            line_count: 0,
        }
    }

    pub(crate) fn push_line(&mut self, raw: &[u8]) {
        self.bytes.extend_from_slice(raw);
        self.line_count += 1;
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn line_count(&self) -> usize {
        self.line_count
    }

    pub fn is_empty(&self) -> bool {
        self.line_count == 0
    }
}

/// Result of slicing one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SliceOutcome {
    /// The file does not exist (no data, not an error).
    Missing,
    /// The file was read but no line fell inside the window.
    NoMatches,
    /// At least one line fell inside the window.
    Matched(LogSlice),
}

impl SliceOutcome {
    /// Collapse to the "absent or slice" view: `None` unless lines matched.
    pub fn into_slice(self) -> Option<LogSlice> {
        match self {
            Self::Matched(slice) => Some(slice),
            Self::Missing | Self::NoMatches => None,
        }
    }
}

/// Per-source status recorded in the summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SliceStatus {
    Saved,
    NoMatches,
    Missing,
    Failed,
}

// =============================================================================
// Modified-file collection
// =============================================================================

/// A regular file whose modification time fell inside the window.
#[derive(Debug, Clone)]
pub struct ModifiedFile {
    /// Absolute path under the collection root.
    pub path: PathBuf,

    /// Path relative to the collection root.
    pub relative_path: PathBuf,

    /// Modification time in local wall-clock time.
    pub modified: NaiveDateTime,

    /// File size in bytes.
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyStatus {
    Copied,
    Failed,
}

/// The collection outcome of one discovered file; one manifest line each.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub source_path: PathBuf,
    pub dest_path: PathBuf,
    pub status: CopyStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl FileRecord {
    pub fn copied(source_path: PathBuf, dest_path: PathBuf) -> Self {
        Self {
            source_path,
            dest_path,
            status: CopyStatus::Copied,
            reason: None,
        }
    }

    pub fn failed(source_path: PathBuf, dest_path: PathBuf, reason: String) -> Self {
        Self {
            source_path,
            dest_path,
            status: CopyStatus::Failed,
            reason: Some(reason),
        }
    }

    /// The manifest line for this record, without the trailing newline.
    pub fn manifest_line(&self) -> String {
        match self.status {
            CopyStatus::Copied => self.source_path.display().to_string(),
            CopyStatus::Failed => format!(
                "{} {} - REASON: {}",
                constants::MANIFEST_FAILURE_MARKER,
                self.source_path.display(),
                self.reason.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

/// Aggregate outcome of one modified-file collection run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectionResult {
    /// Number of files selected by the window.
    pub total_found: usize,

    /// Destination paths of successfully copied files, in processing order.
    #[serde(rename = "copied_files")]
    pub copied: Vec<PathBuf>,

    /// Records of files that could not be copied.
    #[serde(rename = "failed_files")]
    pub failed: Vec<FileRecord>,

    /// Manifest location; `None` when nothing was found or collection failed
    /// before the manifest was created.
    pub manifest_path: Option<PathBuf>,

    /// Non-fatal traversal and manifest warnings.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    /// Stage-level failure (e.g. the root does not exist).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CollectionResult {
    pub(crate) fn failed_with(error: String) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }

    /// Files a copy was attempted for.
    pub fn attempted(&self) -> usize {
        self.copied.len() + self.failed.len()
    }

    pub fn copied_count(&self) -> usize {
        self.copied.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

// =============================================================================
// Snapshot summary
// =============================================================================

/// The machine-readable summary written as `summary.json`, keyed by stage.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotSummary {
    pub report_directory: PathBuf,

    pub window: TimeWindow,

    /// Source label -> slice path or human-readable reason.
    pub logs: BTreeMap<String, String>,

    /// Source label -> machine-readable status.
    pub log_status: BTreeMap<String, SliceStatus>,

    pub modified_files_data: CollectionResult,

    /// Metric key -> output path or error text.
    pub sar_data: BTreeMap<String, String>,

    /// Config key -> copied path or "Not found".
    pub configs: BTreeMap<String, String>,
}
