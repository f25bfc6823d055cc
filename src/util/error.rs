// OutageSnap - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// Every variant keeps the path it concerns and the underlying cause so a
// stage failure can be logged and summarised without losing detail.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Errors that end a run.
///
/// Source, slice and collection errors are per-stage: they are logged and
/// recorded in the summary, never propagated this far.
#[derive(Debug)]
pub enum SnapshotError {
    /// The command-line arguments are invalid; nothing was written.
    Config(ConfigError),

    /// The report directory or summary could not be written.
    Report(ReportError),
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "Configuration error: {e}"),
            Self::Report(e) => write!(f, "Report error: {e}"),
        }
    }
}

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Report(e) => Some(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Log source table errors
// ---------------------------------------------------------------------------

/// Errors related to loading and validating the log source table.
#[derive(Debug)]
pub enum SourceError {
    /// TOML table could not be parsed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Table file exceeds the maximum allowed size.
    FileTooLarge {
        path: PathBuf,
        size: u64,
        max_size: u64,
    },

    /// A required field is missing or empty.
    MissingField {
        source_name: String,
        field: &'static str,
    },

    /// The source name contains characters unusable in a file name.
    InvalidName { name: String },

    /// A candidate label is already used by an earlier source.
    LabelCollision {
        name: String,
        label: String,
        path: PathBuf,
    },

    /// The timestamp regex is invalid.
    InvalidRegex {
        source_name: String,
        pattern: String,
        source: regex::Error,
    },

    /// The timestamp regex exceeds the maximum allowed length.
    RegexTooLong {
        source_name: String,
        length: usize,
        max_length: usize,
    },

    /// The timestamp regex has no group to extract the timestamp from.
    MissingCaptureGroup {
        source_name: String,
        pattern: String,
    },

    /// Two entries in the same table share a name.
    DuplicateName { name: String, path: PathBuf },

    /// Maximum number of sources exceeded.
    TooManySources { count: usize, max: usize },

    /// I/O error reading a table file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(f, "Failed to parse TOML '{}': {source}", path.display())
            }
            Self::FileTooLarge {
                path,
                size,
                max_size,
            } => write!(
                f,
                "Source table '{}' is {size} bytes, exceeds maximum of {max_size} bytes",
                path.display()
            ),
            Self::MissingField { source_name, field } => {
                write!(f, "Source '{source_name}': missing required field '{field}'")
            }
            Self::InvalidName { name } => write!(
                f,
                "Source name '{name}' is invalid: use only letters, digits, '_' and '-'"
            ),
            Self::LabelCollision { name, label, path } => write!(
                f,
                "Source '{name}' in '{}' reuses label '{label}' of an earlier source",
                path.display()
            ),
            Self::InvalidRegex {
                source_name,
                pattern,
                source,
            } => write!(
                f,
                "Source '{source_name}': invalid timestamp_regex ('{pattern}'): {source}"
            ),
            Self::RegexTooLong {
                source_name,
                length,
                max_length,
            } => write!(
                f,
                "Source '{source_name}': timestamp_regex is {length} chars, \
                 exceeds maximum of {max_length}"
            ),
            Self::MissingCaptureGroup {
                source_name,
                pattern,
            } => write!(
                f,
                "Source '{source_name}': timestamp_regex '{pattern}' has no capture group"
            ),
            Self::DuplicateName { name, path } => write!(
                f,
                "Duplicate source name '{name}' in '{}'",
                path.display()
            ),
            Self::TooManySources { count, max } => {
                write!(f, "Too many log sources loaded ({count}), maximum is {max}")
            }
            Self::Io { path, source } => write!(
                f,
                "I/O error reading source table '{}': {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::InvalidRegex { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Slice errors
// ---------------------------------------------------------------------------

/// Errors raised while slicing a log file.
///
/// A missing file is not an error (see `SliceOutcome::Missing`), and lines
/// with unparsable timestamps are skipped, so the only failure is an I/O
/// error on a file that exists.
#[derive(Debug)]
pub enum SliceError {
    /// The file exists but could not be opened or read.
    Read { path: PathBuf, source: io::Error },
}

impl fmt::Display for SliceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "Error reading '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for SliceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
        }
    }
}

// ---------------------------------------------------------------------------
// Collection errors
// ---------------------------------------------------------------------------

/// Errors that stop the modified-file collection stage.
///
/// Per-file copy failures are never raised as errors; they are recorded in
/// the manifest instead.
#[derive(Debug)]
pub enum CollectError {
    /// The collection root does not exist.
    RootNotFound { path: PathBuf },

    /// The collection root is not a directory.
    NotADirectory { path: PathBuf },

    /// Permission denied accessing the root path.
    PermissionDenied { path: PathBuf, source: io::Error },

    /// The mirrored destination directory could not be created.
    CreateDir { path: PathBuf, source: io::Error },

    /// The manifest could not be created or written.
    Manifest { path: PathBuf, source: io::Error },
}

impl fmt::Display for CollectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RootNotFound { path } => {
                write!(f, "Application path '{}' does not exist", path.display())
            }
            Self::NotADirectory { path } => {
                write!(f, "Application path '{}' is not a directory", path.display())
            }
            Self::PermissionDenied { path, source } => write!(
                f,
                "Permission denied accessing '{}': {source}",
                path.display()
            ),
            Self::CreateDir { path, source } => write!(
                f,
                "Cannot create directory '{}': {source}",
                path.display()
            ),
            Self::Manifest { path, source } => {
                write!(f, "Cannot write manifest '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for CollectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::PermissionDenied { source, .. } => Some(source),
            Self::CreateDir { source, .. } => Some(source),
            Self::Manifest { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors in the command-line arguments.
///
/// config.toml problems are never errors; they become warnings and defaults.
#[derive(Debug)]
pub enum ConfigError {
    /// A `--start` / `--end` value does not match the expected format.
    InvalidTimestamp {
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    /// The window start is after its end.
    InvalidWindow { start: String, end: String },

    /// A numeric flag is outside its allowed range.
    ValueOutOfRange {
        field: &'static str,
        value: String,
        expected: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTimestamp {
                field,
                value,
                expected,
            } => write!(
                f,
                "Invalid {field} time '{value}'. Use '{expected}'."
            ),
            Self::InvalidWindow { start, end } => {
                write!(f, "Window start '{start}' is after window end '{end}'")
            }
            Self::ValueOutOfRange {
                field,
                value,
                expected,
            } => write!(f, "{field} {value} is out of range ({expected})"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for SnapshotError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Report errors
// ---------------------------------------------------------------------------

/// Errors writing the report directory and its top-level artifacts.
#[derive(Debug)]
pub enum ReportError {
    /// The report directory could not be created.
    CreateDir { path: PathBuf, source: io::Error },

    /// An artifact could not be written.
    Write { path: PathBuf, source: io::Error },

    /// The summary could not be serialised.
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateDir { path, source } => write!(
                f,
                "Could not create report directory '{}': {source}",
                path.display()
            ),
            Self::Write { path, source } => {
                write!(f, "Could not write '{}': {source}", path.display())
            }
            Self::Json { path, source } => {
                write!(f, "JSON summary error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::CreateDir { source, .. } => Some(source),
            Self::Write { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
        }
    }
}

impl From<ReportError> for SnapshotError {
    fn from(e: ReportError) -> Self {
        Self::Report(e)
    }
}

/// Convenience type alias for OutageSnap results.
pub type Result<T> = std::result::Result<T, SnapshotError>;
