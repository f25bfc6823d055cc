// OutageSnap - main.rs
//
// Application entry point. Handles:
// 1. CLI argument parsing
// 2. Config loading and logging initialisation (debug mode support)
// 3. Log source table loading (built-in + user-defined)
// 4. Running the snapshot and reporting where it was written

use clap::Parser;
use outagesnap::app;
use outagesnap::core::collector::CollectConfig;
use outagesnap::core::model::{SnapshotSummary, TimeWindow};
use outagesnap::platform;
use outagesnap::platform::config::AppConfig;
use outagesnap::util;
use outagesnap::util::error::{ConfigError, SnapshotError};
use std::path::PathBuf;
use std::process::ExitCode;

/// Capture a snapshot of an application's state during an outage window.
#[derive(Parser, Debug)]
#[command(name = "outagesnap", version, about)]
struct Cli {
    /// Application name, used in log and config file names.
    #[arg(long = "app-name")]
    app_name: String,

    /// Window start, "YYYY-MM-DD HH:MM:SS" (server local time).
    #[arg(long)]
    start: String,

    /// Window end, "YYYY-MM-DD HH:MM:SS" (server local time).
    #[arg(long)]
    end: String,

    /// Root directory of the application's files.
    #[arg(long = "app-path")]
    app_path: PathBuf,

    /// PHP version used for PHP-FPM log and pool paths.
    #[arg(long = "php-version")]
    php_version: Option<String>,

    /// Directory the report directory is created in.
    #[arg(short = 'o', long = "output-dir")]
    output_dir: Option<PathBuf>,

    /// Directory holding the application's nginx logs.
    #[arg(long = "log-dir")]
    log_dir: Option<PathBuf>,

    /// Config file (defaults to the platform config directory).
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Additional log source table merged over the built-in one.
    #[arg(short = 's', long = "sources")]
    sources: Option<PathBuf>,

    /// Number of threads used to copy modified files.
    #[arg(long = "copy-workers")]
    copy_workers: Option<usize>,

    /// Skip sar metric collection.
    #[arg(long = "no-metrics")]
    no_metrics: bool,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Config is loaded before logging so its level can apply; warnings are
    // emitted once the subscriber is up.
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| platform::config::PlatformPaths::resolve().config_file());
    let (config, config_warnings) = platform::config::load_config(&config_path);

    util::logging::init(cli.debug, config.log_level.as_deref());

    tracing::info!(
        version = util::constants::APP_VERSION,
        debug = cli.debug,
        "OutageSnap starting"
    );
    for warning in &config_warnings {
        tracing::warn!("{}", warning);
    }

    match run(cli, config) {
        Ok(summary) => {
            let collected = &summary.modified_files_data;
            if let Some(ref err) = collected.error {
                eprintln!("Warning: modified files not collected: {err}");
            } else if collected.failed_count() > 0 {
                eprintln!(
                    "Warning: {} of {} modified files could not be copied; see the manifest.",
                    collected.failed_count(),
                    collected.total_found
                );
            }
            println!("{}", summary.report_directory.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Snapshot failed");
            eprintln!("Error: {e}");
            match e {
                SnapshotError::Config(_) => ExitCode::from(2),
                SnapshotError::Report(_) => ExitCode::FAILURE,
            }
        }
    }
}

/// Resolve the request from CLI flags over config values and run it.
fn run(cli: Cli, config: AppConfig) -> util::error::Result<SnapshotSummary> {
    let window = TimeWindow::parse(&cli.start, &cli.end)?;

    let copy_workers = match cli.copy_workers {
        Some(n) if !(1..=util::constants::MAX_COPY_WORKERS).contains(&n) => {
            return Err(ConfigError::ValueOutOfRange {
                field: "--copy-workers",
                value: n.to_string(),
                expected: format!("1-{}", util::constants::MAX_COPY_WORKERS),
            }
            .into());
        }
        Some(n) => n,
        None => config.copy_workers,
    };

    // Source table: CLI override > config
    let sources_file = cli.sources.or(config.sources_file);
    let (rules, source_errors) = app::source_mgr::load_all_sources(sources_file.as_deref());
    for err in &source_errors {
        tracing::warn!(error = %err, "Log source loading warning");
    }

    let request = app::snapshot::SnapshotRequest {
        app_name: cli.app_name,
        app_path: cli.app_path,
        window,
        php_version: cli.php_version.unwrap_or(config.php_version),
        output_dir: cli.output_dir.unwrap_or(config.output_dir),
        log_dir: cli.log_dir.unwrap_or(config.log_dir),
        nginx_conf_dir: config.nginx_conf_dir,
        php_conf_base: config.php_conf_base,
        collect: CollectConfig {
            max_depth: config.max_depth,
            exclude_patterns: config.exclude_patterns,
            copy_workers,
        },
        metrics_enabled: config.metrics_enabled && !cli.no_metrics,
        sar_binary: config.sar_binary,
    };

    app::snapshot::run(&request, &rules)
}
