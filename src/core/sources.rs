// OutageSnap - core/sources.rs
//
// Log source table loading, validation, and expansion into concrete sources.
// Core layer: accepts TOML strings, never touches the filesystem.
// I/O is handled by app::source_mgr which feeds content here.

use crate::core::model::{LogSource, SourceRule};
use crate::util::constants;
use crate::util::error::SourceError;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

// =============================================================================
// TOML deserialization structures (raw input)
// =============================================================================

/// Raw source table as deserialized from a .toml file.
#[derive(Debug, Deserialize)]
pub struct SourceTable {
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceDefinition>,
}

/// One `[[source]]` entry.
#[derive(Debug, Deserialize)]
pub struct SourceDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Single-path shorthand, prepended to `paths` when both are present.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub paths: Vec<String>,
    pub timestamp_regex: String,
    pub timestamp_format: String,
}

// =============================================================================
// Path templates
// =============================================================================

/// Values substituted into path templates.
#[derive(Debug, Clone)]
pub struct PathVars<'a> {
    pub app_name: &'a str,
    pub log_dir: &'a Path,
    pub php_version: &'a str,
}

/// Substitute `{app_name}`, `{log_dir}` and `{php_version}` in `template`.
pub fn render_path(template: &str, vars: &PathVars<'_>) -> PathBuf {
    let log_dir = vars.log_dir.display().to_string();
    let log_dir = log_dir.trim_end_matches('/');
    PathBuf::from(
        template
            .replace("{app_name}", vars.app_name)
            .replace("{log_dir}", log_dir)
            .replace("{php_version}", vars.php_version),
    )
}

impl SourceRule {
    /// Expand this rule into one concrete source per candidate path.
    ///
    /// The first candidate is labelled with the rule name; later candidates
    /// get `<name>_alt<N>` so each produces its own artifact.
    pub fn candidates(&self, vars: &PathVars<'_>) -> Vec<LogSource> {
        self.path_templates
            .iter()
            .enumerate()
            .map(|(i, template)| LogSource {
                name: self.name.clone(),
                label: candidate_label(&self.name, i),
                path: render_path(template, vars),
                timestamp_pattern: self.timestamp_pattern.clone(),
                timestamp_format: self.timestamp_format.clone(),
            })
            .collect()
    }

    /// Labels of this rule's candidates, in path order.
    pub fn labels(&self) -> Vec<String> {
        (0..self.path_templates.len())
            .map(|i| candidate_label(&self.name, i))
            .collect()
    }
}

fn candidate_label(name: &str, index: usize) -> String {
    if index == 0 {
        name.to_string()
    } else {
        format!("{name}_alt{index}")
    }
}

/// Source names become artifact file names, so only `[A-Za-z0-9_-]` is allowed.
fn is_valid_name(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

// =============================================================================
// Validation and compilation
// =============================================================================

/// Parse a TOML string into a `SourceTable`.
///
/// `source_path` is used for error messages only (not for I/O).
pub fn parse_source_table(toml_content: &str, source_path: &Path) -> Result<SourceTable, SourceError> {
    toml::from_str(toml_content).map_err(|e| SourceError::TomlParse {
        path: source_path.to_path_buf(),
        source: e,
    })
}

/// Validate a `SourceDefinition` and compile it into a `SourceRule`.
///
/// Validates:
/// - name, regex, format and at least one path are present and non-empty
/// - the name is usable as a file name (`[A-Za-z0-9_-]`)
/// - the regex is within size limits, compiles, and has a capture group
pub fn validate_and_compile(def: SourceDefinition, is_builtin: bool) -> Result<SourceRule, SourceError> {
    let name = def.name.trim().to_string();
    if name.is_empty() {
        return Err(SourceError::MissingField {
            source_name: "(empty)".to_string(),
            field: "name",
        });
    }
    if !is_valid_name(&name) {
        return Err(SourceError::InvalidName { name });
    }
    if def.timestamp_regex.is_empty() {
        return Err(SourceError::MissingField {
            source_name: name,
            field: "timestamp_regex",
        });
    }
    if def.timestamp_format.is_empty() {
        return Err(SourceError::MissingField {
            source_name: name,
            field: "timestamp_format",
        });
    }

    let mut path_templates: Vec<String> = def.path.into_iter().collect();
    path_templates.extend(def.paths);
    path_templates.retain(|p| !p.trim().is_empty());
    if path_templates.is_empty() {
        return Err(SourceError::MissingField {
            source_name: name,
            field: "paths",
        });
    }

    let timestamp_pattern = compile_regex(&name, &def.timestamp_regex)?;

    // captures_len() counts the implicit whole-match group.
    if timestamp_pattern.captures_len() < 2 {
        return Err(SourceError::MissingCaptureGroup {
            source_name: name,
            pattern: def.timestamp_regex,
        });
    }

    Ok(SourceRule {
        name,
        description: def.description,
        path_templates,
        timestamp_pattern,
        timestamp_format: def.timestamp_format,
        is_builtin,
    })
}

/// Compile a regex pattern with length validation to prevent ReDoS.
fn compile_regex(source_name: &str, pattern: &str) -> Result<Regex, SourceError> {
    if pattern.len() > constants::MAX_REGEX_PATTERN_LENGTH {
        return Err(SourceError::RegexTooLong {
            source_name: source_name.to_string(),
            length: pattern.len(),
            max_length: constants::MAX_REGEX_PATTERN_LENGTH,
        });
    }

    Regex::new(pattern).map_err(|e| SourceError::InvalidRegex {
        source_name: source_name.to_string(),
        pattern: pattern.to_string(),
        source: e,
    })
}

/// Compile every entry of a table, skipping invalid, duplicate and
/// label-colliding entries.
///
/// Returns the compiled rules in table order and the errors for the
/// entries that were skipped.
pub fn compile_table(
    table: SourceTable,
    source_path: &Path,
    is_builtin: bool,
) -> (Vec<SourceRule>, Vec<SourceError>) {
    let mut rules = Vec::new();
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for def in table.sources {
        match validate_and_compile(def, is_builtin) {
            Ok(rule) => {
                if !seen.insert(rule.name.clone()) {
                    errors.push(SourceError::DuplicateName {
                        name: rule.name,
                        path: source_path.to_path_buf(),
                    });
                    continue;
                }
                rules.push(rule);
            }
            Err(e) => errors.push(e),
        }
    }

    let (rules, collisions) = reject_label_collisions(rules, source_path);
    errors.extend(collisions);
    (rules, errors)
}

/// Drop every rule with a candidate label already taken by an earlier rule,
/// e.g. a source named `foo_alt1` after a two-path `foo`.
///
/// Labels name the slice artifacts, so a collision would let one slice
/// overwrite another.
pub fn reject_label_collisions(
    rules: Vec<SourceRule>,
    source_path: &Path,
) -> (Vec<SourceRule>, Vec<SourceError>) {
    let mut taken: HashSet<String> = HashSet::new();
    let mut kept = Vec::with_capacity(rules.len());
    let mut errors = Vec::new();

    for rule in rules {
        let labels = rule.labels();
        if let Some(label) = labels.iter().find(|l| taken.contains(*l)) {
            errors.push(SourceError::LabelCollision {
                name: rule.name.clone(),
                label: label.clone(),
                path: source_path.to_path_buf(),
            });
            continue;
        }
        taken.extend(labels);
        kept.push(rule);
    }

    (kept, errors)
}

// =============================================================================
// Built-in table (embedded at compile time)
// =============================================================================

/// Embedded TOML content of the built-in source table.
pub fn builtin_table_source() -> &'static str {
    include_str!("../../sources/builtin.toml")
}

/// Load and validate the built-in source table.
///
/// Invalid entries are logged and skipped (non-fatal).
pub fn load_builtin_rules() -> Vec<SourceRule> {
    let path = PathBuf::from("<builtin>/builtin.toml");
    let table = match parse_source_table(builtin_table_source(), &path) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse built-in source table");
            return Vec::new();
        }
    };

    let (rules, errors) = compile_table(table, &path, true);
    for e in &errors {
        tracing::error!(error = %e, "Invalid built-in log source");
    }
    for rule in &rules {
        tracing::debug!(source = %rule.name, description = %rule.description, "Loaded built-in log source");
    }
    rules
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_TABLE_TOML: &str = r#"
[[source]]
name = "app_log"
description = "Application log"
path = "{log_dir}/{app_name}.log"
paths = ["/var/log/{app_name}/app.log"]
timestamp_regex = '^(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})'
timestamp_format = "%Y-%m-%d %H:%M:%S"
"#;

    fn path() -> PathBuf {
        PathBuf::from("test.toml")
    }

    fn vars<'a>(log_dir: &'a Path) -> PathVars<'a> {
        PathVars {
            app_name: "shop",
            log_dir,
            php_version: "8.1",
        }
    }

    #[test]
    fn test_parse_and_compile_valid_table() {
        let table = parse_source_table(VALID_TABLE_TOML, &path()).unwrap();
        let (rules, errors) = compile_table(table, &path(), false);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name, "app_log");
        assert_eq!(rules[0].path_templates.len(), 2);
        assert!(!rules[0].is_builtin);
    }

    #[test]
    fn test_candidates_get_distinct_labels() {
        let table = parse_source_table(VALID_TABLE_TOML, &path()).unwrap();
        let (rules, _) = compile_table(table, &path(), false);
        let log_dir = PathBuf::from("/home/runcloud/logs/");
        let sources = rules[0].candidates(&vars(&log_dir));

        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].label, "app_log");
        assert_eq!(sources[0].path, PathBuf::from("/home/runcloud/logs/shop.log"));
        assert_eq!(sources[1].label, "app_log_alt1");
        assert_eq!(sources[1].path, PathBuf::from("/var/log/shop/app.log"));
        assert!(sources.iter().all(|s| s.name == "app_log"));
    }

    #[test]
    fn test_render_path_substitutes_php_version() {
        let log_dir = PathBuf::from("/logs");
        let p = render_path("/var/log/php/php{php_version}-fpm-slow.log", &vars(&log_dir));
        assert_eq!(p, PathBuf::from("/var/log/php/php8.1-fpm-slow.log"));
    }

    #[test]
    fn test_missing_paths_rejected() {
        let toml = r#"
[[source]]
name = "nowhere"
timestamp_regex = '(\d+)'
timestamp_format = "%s"
"#;
        let table = parse_source_table(toml, &path()).unwrap();
        let (rules, errors) = compile_table(table, &path(), false);
        assert!(rules.is_empty());
        match &errors[0] {
            SourceError::MissingField { field, .. } => assert_eq!(*field, "paths"),
            other => panic!("Expected MissingField, got: {other:?}"),
        }
    }

    #[test]
    fn test_regex_without_group_rejected() {
        let toml = r#"
[[source]]
name = "nogroup"
path = "/tmp/x.log"
timestamp_regex = '^\d{4}'
timestamp_format = "%Y"
"#;
        let table = parse_source_table(toml, &path()).unwrap();
        let (_, errors) = compile_table(table, &path(), false);
        assert!(matches!(errors[0], SourceError::MissingCaptureGroup { .. }));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let toml = r#"
[[source]]
name = "bad"
path = "/tmp/x.log"
timestamp_regex = '([unclosed'
timestamp_format = "%Y"
"#;
        let table = parse_source_table(toml, &path()).unwrap();
        let (_, errors) = compile_table(table, &path(), false);
        assert!(matches!(errors[0], SourceError::InvalidRegex { .. }));
    }

    #[test]
    fn test_regex_too_long() {
        let def = SourceDefinition {
            name: "long".to_string(),
            description: String::new(),
            path: Some("/tmp/x.log".to_string()),
            paths: Vec::new(),
            timestamp_regex: format!("({})", "a".repeat(constants::MAX_REGEX_PATTERN_LENGTH)),
            timestamp_format: "%Y".to_string(),
        };
        assert!(matches!(
            validate_and_compile(def, false),
            Err(SourceError::RegexTooLong { .. })
        ));
    }

    #[test]
    fn test_duplicate_names_keep_first() {
        let toml = r#"
[[source]]
name = "dup"
path = "/a.log"
timestamp_regex = '(\d+)'
timestamp_format = "%s"

[[source]]
name = "dup"
path = "/b.log"
timestamp_regex = '(\d+)'
timestamp_format = "%s"
"#;
        let table = parse_source_table(toml, &path()).unwrap();
        let (rules, errors) = compile_table(table, &path(), false);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].path_templates, vec!["/a.log"]);
        assert!(matches!(errors[0], SourceError::DuplicateName { .. }));
    }

    #[test]
    fn test_name_with_path_separator_rejected() {
        let toml = r#"
[[source]]
name = "../escaped"
path = "/tmp/x.log"
timestamp_regex = '(\d+)'
timestamp_format = "%s"

[[source]]
name = "app log"
path = "/tmp/y.log"
timestamp_regex = '(\d+)'
timestamp_format = "%s"
"#;
        let table = parse_source_table(toml, &path()).unwrap();
        let (rules, errors) = compile_table(table, &path(), false);
        assert!(rules.is_empty());
        assert_eq!(errors.len(), 2);
        match &errors[0] {
            SourceError::InvalidName { name } => assert_eq!(name, "../escaped"),
            other => panic!("Expected InvalidName, got: {other:?}"),
        }
    }

    #[test]
    fn test_label_collision_with_alt_candidate_rejected() {
        let toml = r#"
[[source]]
name = "foo"
paths = ["/a.log", "/b.log"]
timestamp_regex = '(\d+)'
timestamp_format = "%s"

[[source]]
name = "foo_alt1"
path = "/c.log"
timestamp_regex = '(\d+)'
timestamp_format = "%s"
"#;
        let table = parse_source_table(toml, &path()).unwrap();
        let (rules, errors) = compile_table(table, &path(), false);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].labels(), vec!["foo", "foo_alt1"]);
        match &errors[0] {
            SourceError::LabelCollision { name, label, .. } => {
                assert_eq!(name, "foo_alt1");
                assert_eq!(label, "foo_alt1");
            }
            other => panic!("Expected LabelCollision, got: {other:?}"),
        }
    }

    #[test]
    fn test_load_builtin_rules() {
        let rules = load_builtin_rules();
        let names: Vec<_> = rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["nginx_access", "nginx_error", "php_fpm_slow"]);
        assert!(rules.iter().all(|r| r.is_builtin));
    }
}
