// OutageSnap - app/snapshot.rs
//
// Snapshot orchestration: creates the report directory, runs each stage in
// turn and writes summary.json.
//
// Only two failures abort a run: the report directory cannot be created, or
// the summary cannot be written. Every other problem is recorded in the
// summary under the stage that hit it.

use crate::app::stages::{self, ConfigLocations};
use crate::core::collector::{self, CollectConfig};
use crate::core::model::{SnapshotSummary, SourceRule, TimeWindow};
use crate::core::sources::PathVars;
use crate::util::constants;
use crate::util::error::{ReportError, Result};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Everything one snapshot run needs, resolved from CLI flags and config.
#[derive(Debug, Clone)]
pub struct SnapshotRequest {
    pub app_name: String,
    /// Root of the application's deployed files.
    pub app_path: PathBuf,
    pub window: TimeWindow,
    pub php_version: String,

    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
    pub nginx_conf_dir: PathBuf,
    pub php_conf_base: PathBuf,

    pub collect: CollectConfig,

    pub metrics_enabled: bool,
    pub sar_binary: String,
}

/// Create `<output_dir>/<app_name>_<start as %Y%m%d_%H%M%S>`.
///
/// An existing directory is reused, so re-running the same window overwrites
/// the earlier report in place.
pub fn create_report_dir(
    output_dir: &Path,
    app_name: &str,
    start: NaiveDateTime,
) -> std::result::Result<PathBuf, ReportError> {
    let dir = output_dir.join(format!(
        "{app_name}_{}",
        start.format(constants::REPORT_DIR_TIMESTAMP_FORMAT)
    ));
    fs::create_dir_all(&dir).map_err(|source| ReportError::CreateDir {
        path: dir.clone(),
        source,
    })?;
    tracing::info!(dir = %dir.display(), "Report directory ready");
    Ok(dir)
}

/// Serialise `summary` as pretty-printed JSON to `<report_dir>/summary.json`.
pub fn write_summary(report_dir: &Path, summary: &SnapshotSummary) -> std::result::Result<PathBuf, ReportError> {
    let path = report_dir.join(constants::SUMMARY_FILE_NAME);
    let json = serde_json::to_string_pretty(summary).map_err(|source| ReportError::Json {
        path: path.clone(),
        source,
    })?;
    fs::write(&path, json).map_err(|source| ReportError::Write {
        path: path.clone(),
        source,
    })?;
    tracing::info!(path = %path.display(), "Summary written");
    Ok(path)
}

/// Run every stage for `request` and write the summary.
///
/// Returns the summary that was written.
pub fn run(request: &SnapshotRequest, rules: &[SourceRule]) -> Result<SnapshotSummary> {
    let window = request.window;
    tracing::info!(
        app = %request.app_name,
        start = %window.start.format(constants::WINDOW_FORMAT),
        end = %window.end.format(constants::WINDOW_FORMAT),
        "Starting outage snapshot"
    );

    let report_dir = create_report_dir(&request.output_dir, &request.app_name, window.start)?;

    // -- Logs --
    let vars = PathVars {
        app_name: &request.app_name,
        log_dir: &request.log_dir,
        php_version: &request.php_version,
    };
    let log_report = stages::run_log_stage(rules, &vars, &window, &report_dir);

    // -- Modified files --
    tracing::info!(root = %request.app_path.display(), "Collecting modified application files");
    let modified_files_data =
        collector::collect_modified(&request.app_path, &window, &report_dir, &request.collect);

    // -- Metrics --
    let sar_data = if request.metrics_enabled {
        stages::run_sar_stage(&request.sar_binary, &window, &report_dir)
    } else {
        tracing::info!("Metrics collection disabled; skipping sar");
        BTreeMap::from([("status".to_string(), "Skipped".to_string())])
    };

    // -- Configs --
    let configs = stages::run_config_stage(
        &ConfigLocations {
            nginx_conf_dir: &request.nginx_conf_dir,
            php_conf_base: &request.php_conf_base,
            app_name: &request.app_name,
            php_version: &request.php_version,
        },
        &report_dir,
    );

    let summary = SnapshotSummary {
        report_directory: report_dir.clone(),
        window,
        logs: log_report.logs,
        log_status: log_report.status,
        modified_files_data,
        sar_data,
        configs,
    };
    write_summary(&report_dir, &summary)?;

    tracing::info!(dir = %report_dir.display(), "Outage snapshot complete");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::error::SnapshotError;

    fn start() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2024-01-01 10:01:00", constants::WINDOW_FORMAT).unwrap()
    }

    #[test]
    fn test_report_dir_name_uses_start() {
        let dir = tempfile::tempdir().unwrap();
        let report = create_report_dir(dir.path(), "shop", start()).unwrap();
        assert_eq!(report, dir.path().join("shop_20240101_100100"));
        assert!(report.is_dir());
        // Second call reuses the directory.
        assert_eq!(create_report_dir(dir.path(), "shop", start()).unwrap(), report);
    }

    #[test]
    fn test_report_dir_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("out");
        fs::write(&blocker, "not a directory").unwrap();

        let request = SnapshotRequest {
            app_name: "shop".to_string(),
            app_path: dir.path().to_path_buf(),
            window: TimeWindow::parse("2024-01-01 10:01:00", "2024-01-01 10:10:00").unwrap(),
            php_version: "8.2".to_string(),
            output_dir: blocker,
            log_dir: dir.path().to_path_buf(),
            nginx_conf_dir: dir.path().to_path_buf(),
            php_conf_base: dir.path().to_path_buf(),
            collect: CollectConfig::default(),
            metrics_enabled: false,
            sar_binary: "sar".to_string(),
        };
        let err = run(&request, &[]).unwrap_err();
        assert!(matches!(err, SnapshotError::Report(ReportError::CreateDir { .. })));
    }

    #[test]
    fn test_summary_is_pretty_json() {
        let dir = tempfile::tempdir().unwrap();
        let summary = SnapshotSummary {
            report_directory: dir.path().to_path_buf(),
            window: TimeWindow::parse("2024-01-01 10:01:00", "2024-01-01 10:10:00").unwrap(),
            logs: BTreeMap::new(),
            log_status: BTreeMap::new(),
            modified_files_data: Default::default(),
            sar_data: BTreeMap::new(),
            configs: BTreeMap::from([("nginx_config".to_string(), "Not found".to_string())]),
        };
        let path = write_summary(dir.path(), &summary).unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert!(text.contains("\n  \"configs\""));

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["configs"]["nginx_config"], "Not found");
        assert_eq!(value["window"]["start"], "2024-01-01T10:01:00");
        assert_eq!(value["modified_files_data"]["total_found"], 0);
    }
}
