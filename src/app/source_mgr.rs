// OutageSnap - app/source_mgr.rs
//
// Loads the log source table: the built-in table embedded in the binary,
// optionally merged with a user-defined table file on disk.
// User sources override built-in sources with the same name.

use crate::core::model::SourceRule;
use crate::core::sources;
use crate::util::constants;
use crate::util::error::SourceError;
use std::path::Path;

/// Load all available sources: built-in first, then user-defined overrides.
///
/// Invalid user entries are logged and skipped (non-fatal).
///
/// Returns the merged list and any non-fatal errors encountered.
pub fn load_all_sources(user_table: Option<&Path>) -> (Vec<SourceRule>, Vec<SourceError>) {
    let mut rules = sources::load_builtin_rules();
    let mut errors = Vec::new();

    tracing::info!(builtin_count = rules.len(), "Loaded built-in log sources");

    if let Some(path) = user_table {
        match load_user_table(path) {
            Ok((user_rules, user_errors)) => {
                errors.extend(user_errors);
                for user_rule in user_rules {
                    if let Some(pos) = rules.iter().position(|r| r.name == user_rule.name) {
                        tracing::info!(source = %user_rule.name, "User source overrides built-in");
                        rules[pos] = user_rule;
                    } else {
                        tracing::info!(source = %user_rule.name, "Loaded user-defined source");
                        rules.push(user_rule);
                    }
                }
            }
            Err(e) => errors.push(e),
        }
    }

    if rules.len() > constants::MAX_SOURCES {
        tracing::warn!(
            count = rules.len(),
            max = constants::MAX_SOURCES,
            "Too many log sources loaded, truncating"
        );
        errors.push(SourceError::TooManySources {
            count: rules.len(),
            max: constants::MAX_SOURCES,
        });
        rules.truncate(constants::MAX_SOURCES);
    }

    tracing::info!(total = rules.len(), "Log source loading complete");

    (rules, errors)
}

/// Read, size-check, and compile one user table file.
fn load_user_table(path: &Path) -> Result<(Vec<SourceRule>, Vec<SourceError>), SourceError> {
    let metadata = std::fs::metadata(path).map_err(|e| SourceError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    if metadata.len() > constants::MAX_SOURCES_FILE_SIZE {
        return Err(SourceError::FileTooLarge {
            path: path.to_path_buf(),
            size: metadata.len(),
            max_size: constants::MAX_SOURCES_FILE_SIZE,
        });
    }

    let content = std::fs::read_to_string(path).map_err(|e| SourceError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let table = sources::parse_source_table(&content, path)?;
    Ok(sources::compile_table(table, path, false))
}
