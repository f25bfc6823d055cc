// OutageSnap - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "OutageSnap";

/// Application identifier used for config directories.
pub const APP_ID: &str = "OutageSnap";

/// Current application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Time window
// =============================================================================

/// Format of `--start` / `--end` and of the manifest header.
pub const WINDOW_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format of the timestamp suffix in the report directory name.
pub const REPORT_DIR_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Format passed to `sar -s` / `sar -e`.
pub const SAR_TIME_FORMAT: &str = "%H:%M:%S";

// =============================================================================
// Default locations (overridable via config.toml and CLI)
// =============================================================================

/// Base directory under which report directories are created.
pub const DEFAULT_OUTPUT_DIR: &str = "/home/runcloud/outage_reports";

/// Base directory holding per-application nginx logs.
pub const DEFAULT_LOG_DIR: &str = "/home/runcloud/logs";

/// Directory holding per-application nginx configuration files.
pub const DEFAULT_NGINX_CONF_DIR: &str = "/etc/nginx-rc/conf.d";

/// Base directory of the per-version PHP-FPM configuration trees.
pub const DEFAULT_PHP_CONF_BASE: &str = "/etc/php-rc";

/// PHP version assumed when none is given.
pub const DEFAULT_PHP_VERSION: &str = "8.2";

/// Name of the sysstat reporting binary.
pub const DEFAULT_SAR_BINARY: &str = "sar";

// =============================================================================
// Report artifacts
// =============================================================================

/// Subdirectory of the report that mirrors the modified-file tree.
pub const MODIFIED_FILES_DIR_NAME: &str = "modified_files";

/// Manifest of the modified-file collection.
pub const MANIFEST_FILE_NAME: &str = "modified_files_manifest.txt";

/// Final machine-readable summary.
pub const SUMMARY_FILE_NAME: &str = "summary.json";

/// Suffix appended to a log source label for its slice artifact.
pub const SLICE_FILE_SUFFIX: &str = ".slice.log";

/// Prefix of manifest lines recording a failed copy.
pub const MANIFEST_FAILURE_MARKER: &str = "# FAILED TO COPY:";

/// Summary value for a log source that produced no slice.
pub const NO_LOG_ENTRIES_MESSAGE: &str = "No relevant entries or file missing.";

/// Summary value for a configuration file that does not exist.
pub const CONFIG_NOT_FOUND_MESSAGE: &str = "Not found";

// =============================================================================
// Collector limits
// =============================================================================

/// Default maximum directory recursion depth for the modified-file walk.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Hard upper bound on walk depth (prevents configuration mistakes).
pub const ABSOLUTE_MAX_DEPTH: usize = 256;

/// Number of files handed to the copy pool per batch when copying in
/// parallel. The manifest is flushed after every batch.
pub const COPY_BATCH_SIZE: usize = 64;

/// Default copy workers. 1 means sequential copying.
pub const DEFAULT_COPY_WORKERS: usize = 1;

/// Upper bound on copy workers.
pub const MAX_COPY_WORKERS: usize = 64;

// =============================================================================
// Log source table limits
// =============================================================================

/// Maximum regex pattern length to prevent ReDoS.
pub const MAX_REGEX_PATTERN_LENGTH: usize = 4_096;

/// Maximum size of a log source table file in bytes.
pub const MAX_SOURCES_FILE_SIZE: u64 = 64 * 1024;

/// Maximum number of log sources (built-in + user).
pub const MAX_SOURCES: usize = 100;

/// Name of the capture group preferred over group 1 when present.
pub const TIMESTAMP_GROUP_NAME: &str = "timestamp";

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Maximum length of a log line included in trace output.
pub const DEBUG_MAX_LINE_PREVIEW: usize = 200;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";
