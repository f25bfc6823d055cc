// OutageSnap - util/logging.rs
//
// Structured logging with runtime-selectable debug mode.
//
// Activation:
//   - Environment variable: RUST_LOG=debug (or trace)
//   - CLI flag: --debug (sets the filter to debug)
//   - Config file: [logging] level = "debug"
//
// Output: stderr, so stdout carries only the report directory path for
// scripts. Report artifacts go to the report directory, never here.

use super::constants;
use tracing_subscriber::EnvFilter;

/// Pick the filter directive.
///
/// Priority: RUST_LOG env var > CLI --debug flag > config level > default "info".
fn filter_directive(rust_log: Option<String>, debug_flag: bool, config_level: Option<&str>) -> String {
    match (rust_log, debug_flag, config_level) {
        (Some(env), _, _) if !env.trim().is_empty() => env,
        (_, true, _) => "debug".to_string(),
        (_, false, Some(level)) => level.to_string(),
        _ => constants::DEFAULT_LOG_LEVEL.to_string(),
    }
}

/// Initialise the logging subsystem.
///
/// Normal runs print short operator-facing lines; `--debug` adds the module
/// and source location of every event.
pub fn init(debug_flag: bool, config_level: Option<&str>) {
    let directive = filter_directive(std::env::var("RUST_LOG").ok(), debug_flag, config_level);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|e| {
        eprintln!("Ignoring invalid log filter '{directive}': {e}");
        EnvFilter::new(constants::DEFAULT_LOG_LEVEL)
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(debug_flag)
        .with_file(debug_flag)
        .with_line_number(debug_flag)
        .compact()
        .init();

    tracing::debug!(
        app = constants::APP_NAME,
        version = constants::APP_VERSION,
        filter = %directive,
        "Logging initialised"
    );
}
