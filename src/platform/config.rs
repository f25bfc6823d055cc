// OutageSnap - platform/config.rs
//
// Config directory resolution and config.toml loading with startup
// validation.
//
// Uses the `directories` crate for XDG (Linux), AppData (Windows),
// Library (macOS) compliance.

use crate::util::constants;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Resolved platform paths for OutageSnap configuration.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Configuration directory (e.g. ~/.config/outagesnap/)
    pub config_dir: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// Falls back to the current directory if platform dirs cannot be
    /// determined.
    pub fn resolve() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("", "", constants::APP_ID) {
            let config_dir = proj_dirs.config_dir().to_path_buf();
            tracing::debug!(config = %config_dir.display(), "Platform paths resolved");
            Self { config_dir }
        } else {
            tracing::warn!("Could not determine platform directories, using current directory");
            Self {
                config_dir: PathBuf::from("."),
            }
        }
    }

    /// Default location of config.toml.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(constants::CONFIG_FILE_NAME)
    }
}

// =============================================================================
// config.toml loading and validation
// =============================================================================

/// Raw deserialisable shape of config.toml.
///
/// Unknown keys are silently ignored for forward compatibility.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// `[paths]` section.
    pub paths: PathsSection,
    /// `[logs]` section.
    pub logs: LogsSection,
    /// `[collector]` section.
    pub collector: CollectorSection,
    /// `[metrics]` section.
    pub metrics: MetricsSection,
    /// `[logging]` section.
    pub logging: LoggingSection,
}

/// `[paths]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct PathsSection {
    pub output_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub nginx_conf_dir: Option<PathBuf>,
    pub php_conf_base: Option<PathBuf>,
    pub php_version: Option<String>,
}

/// `[logs]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LogsSection {
    /// Additional log source table merged over the built-in one.
    pub sources_file: Option<PathBuf>,
}

/// `[collector]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct CollectorSection {
    pub max_depth: Option<usize>,
    pub exclude_patterns: Option<Vec<String>>,
    pub copy_workers: Option<usize>,
}

/// `[metrics]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct MetricsSection {
    pub enabled: Option<bool>,
    pub sar_binary: Option<String>,
}

/// `[logging]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: Option<String>,
}

/// Validated application configuration derived from `config.toml`.
///
/// Invalid values produce actionable warnings and fall back to defaults.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // -- Paths --
    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
    pub nginx_conf_dir: PathBuf,
    pub php_conf_base: PathBuf,
    pub php_version: String,

    // -- Logs --
    pub sources_file: Option<PathBuf>,

    // -- Collector --
    pub max_depth: usize,
    pub exclude_patterns: Vec<String>,
    pub copy_workers: usize,

    // -- Metrics --
    pub metrics_enabled: bool,
    pub sar_binary: String,

    // -- Logging --
    pub log_level: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(constants::DEFAULT_OUTPUT_DIR),
            log_dir: PathBuf::from(constants::DEFAULT_LOG_DIR),
            nginx_conf_dir: PathBuf::from(constants::DEFAULT_NGINX_CONF_DIR),
            php_conf_base: PathBuf::from(constants::DEFAULT_PHP_CONF_BASE),
            php_version: constants::DEFAULT_PHP_VERSION.to_string(),
            sources_file: None,
            max_depth: constants::DEFAULT_MAX_DEPTH,
            exclude_patterns: Vec::new(),
            copy_workers: constants::DEFAULT_COPY_WORKERS,
            metrics_enabled: true,
            sar_binary: constants::DEFAULT_SAR_BINARY.to_string(),
            log_level: None,
        }
    }
}

/// Load and validate the config file at `config_path`.
///
/// Returns `AppConfig` with validated values and a list of non-fatal warnings.
/// A missing file yields defaults with no warnings; an unreadable or
/// unparseable one yields defaults with a warning.
pub fn load_config(config_path: &Path) -> (AppConfig, Vec<String>) {
    let mut warnings: Vec<String> = Vec::new();

    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "No config.toml found; using defaults");
        return (AppConfig::default(), warnings);
    }

    let content = match std::fs::read_to_string(config_path) {
        Ok(c) => c,
        Err(e) => {
            let msg = format!(
                "Could not read config file '{}': {e}. Using defaults.",
                config_path.display()
            );
            tracing::warn!("{}", msg);
            warnings.push(msg);
            return (AppConfig::default(), warnings);
        }
    };

    let (config, parse_warnings) = parse_config(&content, config_path);
    warnings.extend(parse_warnings);
    (config, warnings)
}

/// Parse and validate config.toml content. `config_path` is used in messages only.
pub fn parse_config(content: &str, config_path: &Path) -> (AppConfig, Vec<String>) {
    let mut warnings: Vec<String> = Vec::new();

    let raw: RawConfig = match toml::from_str(content) {
        Ok(r) => r,
        Err(e) => {
            let msg = format!(
                "Failed to parse config file '{}': {e}. Using defaults. \
                 See config.example.toml for the expected format.",
                config_path.display()
            );
            tracing::warn!("{}", msg);
            warnings.push(msg);
            return (AppConfig::default(), warnings);
        }
    };

    tracing::info!(path = %config_path.display(), "Loaded config.toml");

    let mut config = AppConfig::default();

    // -- Paths --
    if let Some(dir) = raw.paths.output_dir {
        config.output_dir = dir;
    }
    if let Some(dir) = raw.paths.log_dir {
        config.log_dir = dir;
    }
    if let Some(dir) = raw.paths.nginx_conf_dir {
        config.nginx_conf_dir = dir;
    }
    if let Some(dir) = raw.paths.php_conf_base {
        config.php_conf_base = dir;
    }
    if let Some(version) = raw.paths.php_version {
        if version.trim().is_empty() {
            warnings.push(format!(
                "[paths] php_version is empty. Using default ({}).",
                constants::DEFAULT_PHP_VERSION
            ));
        } else {
            config.php_version = version;
        }
    }

    // -- Logs --
    config.sources_file = raw.logs.sources_file;

    // -- Collector: max_depth --
    if let Some(depth) = raw.collector.max_depth {
        if (1..=constants::ABSOLUTE_MAX_DEPTH).contains(&depth) {
            config.max_depth = depth;
        } else {
            warnings.push(format!(
                "[collector] max_depth = {depth} is out of range (1-{}). Using default ({}).",
                constants::ABSOLUTE_MAX_DEPTH,
                constants::DEFAULT_MAX_DEPTH,
            ));
        }
    }

    // -- Collector: copy_workers --
    if let Some(workers) = raw.collector.copy_workers {
        if (1..=constants::MAX_COPY_WORKERS).contains(&workers) {
            config.copy_workers = workers;
        } else {
            warnings.push(format!(
                "[collector] copy_workers = {workers} is out of range (1-{}). Using default ({}).",
                constants::MAX_COPY_WORKERS,
                constants::DEFAULT_COPY_WORKERS,
            ));
        }
    }

    if let Some(patterns) = raw.collector.exclude_patterns {
        config.exclude_patterns = patterns;
    }

    // -- Metrics --
    if let Some(enabled) = raw.metrics.enabled {
        config.metrics_enabled = enabled;
    }
    if let Some(binary) = raw.metrics.sar_binary {
        if !binary.trim().is_empty() {
            config.sar_binary = binary;
        }
    }

    // -- Logging: level --
    if let Some(ref level) = raw.logging.level {
        let valid = ["error", "warn", "info", "debug", "trace"];
        if valid.contains(&level.to_lowercase().as_str()) {
            config.log_level = Some(level.to_lowercase());
        } else {
            warnings.push(format!(
                "[logging] level = \"{level}\" is not recognised. \
                 Valid values: error, warn, info, debug, trace. Using default (info).",
            ));
        }
    }

    if !warnings.is_empty() {
        tracing::warn!(count = warnings.len(), "Config validation produced warnings");
    }

    (config, warnings)
}
