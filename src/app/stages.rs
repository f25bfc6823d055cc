// OutageSnap - app/stages.rs
//
// The individual collection stages. Each stage reports its own outcome and
// never aborts the run; only report-directory and summary failures are fatal
// (see app::snapshot).

use crate::core::model::{SliceOutcome, SliceStatus, SourceRule, TimeWindow};
use crate::core::slicer;
use crate::core::sources::PathVars;
use crate::platform::command::run_command;
use crate::platform::fs::{copy_preserving_metadata, write_artifact};
use crate::util::constants;
use std::collections::BTreeMap;
use std::path::Path;

// =============================================================================
// Log slices
// =============================================================================

/// Per-source outcome of the log stage, keyed by source label.
#[derive(Debug, Default)]
pub struct LogStageReport {
    /// Slice path, or a human-readable reason when there is no slice.
    pub logs: BTreeMap<String, String>,
    pub status: BTreeMap<String, SliceStatus>,
}

/// Slice every candidate of every rule and write non-empty slices to
/// `<report_dir>/<label>.slice.log`.
pub fn run_log_stage(
    rules: &[SourceRule],
    vars: &PathVars<'_>,
    window: &TimeWindow,
    report_dir: &Path,
) -> LogStageReport {
    tracing::info!(sources = rules.len(), "Collecting application log slices");
    let mut report = LogStageReport::default();

    for source in rules.iter().flat_map(|rule| rule.candidates(vars)) {
        let (value, status) = match slicer::slice_log(&source, window) {
            Ok(SliceOutcome::Matched(slice)) => {
                let out = report_dir.join(format!("{}{}", source.label, constants::SLICE_FILE_SUFFIX));
                match write_artifact(&out, slice.as_bytes()) {
                    Ok(()) => {
                        tracing::info!(
                            source = %source.name,
                            label = %source.label,
                            lines = slice.line_count(),
                            file = %out.display(),
                            "Saved log slice"
                        );
                        (out.display().to_string(), SliceStatus::Saved)
                    }
                    Err(e) => {
                        tracing::warn!(source = %source.label, error = %e, "Could not write log slice");
                        (format!("Error: could not write '{}': {e}", out.display()), SliceStatus::Failed)
                    }
                }
            }
            Ok(SliceOutcome::NoMatches) => {
                tracing::info!(source = %source.label, path = %source.path.display(), "No log entries in window");
                (constants::NO_LOG_ENTRIES_MESSAGE.to_string(), SliceStatus::NoMatches)
            }
            Ok(SliceOutcome::Missing) => {
                tracing::warn!(source = %source.label, path = %source.path.display(), "Log file not found");
                (constants::NO_LOG_ENTRIES_MESSAGE.to_string(), SliceStatus::Missing)
            }
            Err(e) => {
                tracing::warn!(source = %source.label, error = %e, "Log slice failed");
                (format!("Error: {e}"), SliceStatus::Failed)
            }
        };

        report.logs.insert(source.label.clone(), value);
        report.status.insert(source.label, status);
    }

    report
}

// =============================================================================
// sar metrics
// =============================================================================

/// Summary key and `sar` report flag of each collected metric.
const SAR_METRICS: [(&str, &str); 3] = [
    ("cpu_usage", "-u"),
    ("memory_usage", "-r"),
    ("load_average", "-q"),
];

/// Collect historical CPU, memory and load data with `sar` for the window's
/// time of day. Successful reports are written to `sar_<key>.txt`.
pub fn run_sar_stage(sar_binary: &str, window: &TimeWindow, report_dir: &Path) -> BTreeMap<String, String> {
    tracing::info!("Collecting historical system performance data with sar");
    let start = window.start.format(constants::SAR_TIME_FORMAT).to_string();
    let end = window.end.format(constants::SAR_TIME_FORMAT).to_string();
    let mut results = BTreeMap::new();

    for (key, flag) in SAR_METRICS {
        let output = run_command(sar_binary, &[flag, "-s", &start, "-e", &end]);

        let value = if !output.success || output.stderr.contains("Cannot open") {
            tracing::warn!(metric = key, stderr = %output.stderr.trim(), "Could not collect sar metric. Is sysstat installed?");
            format!("Error: {}", output.stderr)
        } else {
            let out = report_dir.join(format!("sar_{key}.txt"));
            match write_artifact(&out, output.stdout.as_bytes()) {
                Ok(()) => {
                    tracing::info!(metric = key, file = %out.display(), "Saved sar data");
                    out.display().to_string()
                }
                Err(e) => format!("Error: could not write '{}': {e}", out.display()),
            }
        };
        results.insert(key.to_string(), value);
    }

    results
}

// =============================================================================
// Configuration files
// =============================================================================

/// Where the server keeps the application's configuration files.
#[derive(Debug, Clone)]
pub struct ConfigLocations<'a> {
    pub nginx_conf_dir: &'a Path,
    pub php_conf_base: &'a Path,
    pub app_name: &'a str,
    pub php_version: &'a str,
}

/// Copy the nginx vhost and PHP-FPM pool configuration into the report.
///
/// Both files are named `<app>.conf` on the server, so each copy is prefixed
/// with its summary key's service name: `nginx_<app>.conf` and
/// `php_fpm_<app>.conf`.
pub fn run_config_stage(locations: &ConfigLocations<'_>, report_dir: &Path) -> BTreeMap<String, String> {
    tracing::info!("Collecting configuration files");
    let conf_name = format!("{}.conf", locations.app_name);
    let candidates = [
        (
            "nginx_config",
            locations.nginx_conf_dir.join(&conf_name),
            report_dir.join(format!("nginx_{conf_name}")),
        ),
        (
            "php_fpm_config",
            locations
                .php_conf_base
                .join(locations.php_version)
                .join("fpm")
                .join("pool.d")
                .join(&conf_name),
            report_dir.join(format!("php_fpm_{conf_name}")),
        ),
    ];

    let mut results = BTreeMap::new();
    for (key, path, dest) in candidates {
        let value = if path.is_file() {
            match copy_preserving_metadata(&path, &dest) {
                Ok(_) => {
                    tracing::info!(config = key, file = %path.display(), dest = %dest.display(), "Copied configuration file");
                    dest.display().to_string()
                }
                Err(e) => {
                    tracing::warn!(config = key, error = %e, "Could not copy configuration file");
                    format!("Error: {e}")
                }
            }
        } else {
            tracing::debug!(config = key, path = %path.display(), "Configuration file not found");
            constants::CONFIG_NOT_FOUND_MESSAGE.to_string()
        };
        results.insert(key.to_string(), value);
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sources::{compile_table, parse_source_table};
    use std::fs;
    use std::path::PathBuf;

    fn window() -> TimeWindow {
        TimeWindow::parse("2024-01-01 10:01:00", "2024-01-01 10:10:00").unwrap()
    }

    fn rules(log_path: &Path) -> Vec<SourceRule> {
        let toml = format!(
            r#"
[[source]]
name = "app"
paths = ["{}", "/nonexistent/outagesnap/app.log"]
timestamp_regex = '^(\d{{4}}-\d{{2}}-\d{{2}} \d{{2}}:\d{{2}}:\d{{2}})'
timestamp_format = "%Y-%m-%d %H:%M:%S"
"#,
            log_path.display()
        );
        let table = parse_source_table(&toml, Path::new("t.toml")).unwrap();
        compile_table(table, Path::new("t.toml"), false).0
    }

    #[test]
    fn test_log_stage_reports_each_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("app.log");
        fs::write(
            &log,
            "2024-01-01 10:00:00 a\n2024-01-01 10:05:00 b\n2024-01-01 10:15:00 c\n",
        )
        .unwrap();
        let report_dir = dir.path().join("report");
        fs::create_dir(&report_dir).unwrap();

        let log_dir = PathBuf::from("/logs");
        let vars = PathVars {
            app_name: "shop",
            log_dir: &log_dir,
            php_version: "8.2",
        };
        let report = run_log_stage(&rules(&log), &vars, &window(), &report_dir);

        let slice_path = report_dir.join("app.slice.log");
        assert_eq!(report.status["app"], SliceStatus::Saved);
        assert_eq!(report.logs["app"], slice_path.display().to_string());
        assert_eq!(fs::read_to_string(slice_path).unwrap(), "2024-01-01 10:05:00 b\n");

        assert_eq!(report.status["app_alt1"], SliceStatus::Missing);
        assert_eq!(report.logs["app_alt1"], constants::NO_LOG_ENTRIES_MESSAGE);
        assert!(!report_dir.join("app_alt1.slice.log").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_log_is_failed_and_others_continue() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("locked.log");
        fs::write(&locked, "2024-01-01 10:05:00 hidden\n").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::File::open(&locked).is_ok() {
            // Running as root: permission bits are not enforced.
            return;
        }
        let readable = dir.path().join("readable.log");
        fs::write(&readable, "2024-01-01 10:05:00 visible\n").unwrap();
        let report_dir = dir.path().join("report");
        fs::create_dir(&report_dir).unwrap();

        let toml = format!(
            r#"
[[source]]
name = "locked"
path = "{}"
timestamp_regex = '^(\d{{4}}-\d{{2}}-\d{{2}} \d{{2}}:\d{{2}}:\d{{2}})'
timestamp_format = "%Y-%m-%d %H:%M:%S"

[[source]]
name = "readable"
path = "{}"
timestamp_regex = '^(\d{{4}}-\d{{2}}-\d{{2}} \d{{2}}:\d{{2}}:\d{{2}})'
timestamp_format = "%Y-%m-%d %H:%M:%S"
"#,
            locked.display(),
            readable.display()
        );
        let table = parse_source_table(&toml, Path::new("t.toml")).unwrap();
        let rules = compile_table(table, Path::new("t.toml"), false).0;

        let log_dir = PathBuf::from("/logs");
        let vars = PathVars {
            app_name: "shop",
            log_dir: &log_dir,
            php_version: "8.2",
        };
        let report = run_log_stage(&rules, &vars, &window(), &report_dir);

        assert_eq!(report.status["locked"], SliceStatus::Failed);
        assert!(report.logs["locked"].starts_with("Error: "), "{}", report.logs["locked"]);
        assert!(!report_dir.join("locked.slice.log").exists());
        assert_eq!(report.status["readable"], SliceStatus::Saved);
        assert_eq!(
            fs::read_to_string(report_dir.join("readable.slice.log")).unwrap(),
            "2024-01-01 10:05:00 visible\n"
        );
    }

    #[test]
    fn test_sar_stage_missing_binary_records_errors() {
        let dir = tempfile::tempdir().unwrap();
        let results = run_sar_stage("outagesnap-missing-sar", &window(), dir.path());
        assert_eq!(results.len(), 3);
        assert!(results.values().all(|v| v.starts_with("Error:")));
        assert!(!dir.path().join("sar_cpu_usage.txt").exists());
    }

    fn config_locations<'a>(nginx: &'a Path, php_base: &'a Path) -> ConfigLocations<'a> {
        ConfigLocations {
            nginx_conf_dir: nginx,
            php_conf_base: php_base,
            app_name: "shop",
            php_version: "8.2",
        }
    }

    #[test]
    fn test_config_stage_copies_present_and_flags_missing() {
        let dir = tempfile::tempdir().unwrap();
        let nginx = dir.path().join("nginx");
        fs::create_dir(&nginx).unwrap();
        fs::write(nginx.join("shop.conf"), "server {}").unwrap();
        let report_dir = dir.path().join("report");
        fs::create_dir(&report_dir).unwrap();

        let php_base = dir.path().join("php");
        let results = run_config_stage(&config_locations(&nginx, &php_base), &report_dir);

        let copied = report_dir.join("nginx_shop.conf");
        assert_eq!(results["nginx_config"], copied.display().to_string());
        assert_eq!(results["php_fpm_config"], "Not found");
        assert_eq!(fs::read_to_string(copied).unwrap(), "server {}");
    }

    #[test]
    fn test_config_stage_keeps_both_same_named_files() {
        let dir = tempfile::tempdir().unwrap();
        let nginx = dir.path().join("nginx");
        fs::create_dir(&nginx).unwrap();
        fs::write(nginx.join("shop.conf"), "NGINX").unwrap();
        let php_base = dir.path().join("php");
        let pool_dir = php_base.join("8.2/fpm/pool.d");
        fs::create_dir_all(&pool_dir).unwrap();
        fs::write(pool_dir.join("shop.conf"), "PHPFPM").unwrap();
        let report_dir = dir.path().join("report");
        fs::create_dir(&report_dir).unwrap();

        let results = run_config_stage(&config_locations(&nginx, &php_base), &report_dir);

        assert_ne!(results["nginx_config"], results["php_fpm_config"]);
        assert_eq!(fs::read_to_string(&results["nginx_config"]).unwrap(), "NGINX");
        assert_eq!(fs::read_to_string(&results["php_fpm_config"]).unwrap(), "PHPFPM");
        assert!(!report_dir.join("shop.conf").exists());
    }
}
