// OutageSnap - core/collector.rs
//
// Modified-file discovery and collection.
//
// Discovery walks the application tree with `walkdir` and selects regular
// files whose modification time satisfies `start <= mtime < end`. Collection
// copies each selected file into `<destination>/modified_files/`, mirroring
// its path relative to the root, and appends one manifest line per file.
//
// Failure policy:
//   - Root missing / not a directory / inaccessible: the stage fails before
//     any filesystem mutation.
//   - Inaccessible entries during the walk: non-fatal warnings.
//   - Per-file copy errors: recorded in the manifest and the result; the run
//     continues with the remaining files.
//
// Symlinks are never followed and never collected; only regular files are.
// The walk stops at `max_depth`; each directory left unsearched because of
// the limit is reported as a warning.

use crate::core::model::{CollectionResult, CopyStatus, FileRecord, ModifiedFile, TimeWindow};
use crate::platform::fs::copy_preserving_metadata;
use crate::util::constants;
use crate::util::error::CollectError;
use chrono::{DateTime, Local};
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a collection run.
#[derive(Debug, Clone)]
pub struct CollectConfig {
    /// Maximum directory recursion depth.
    pub max_depth: usize,

    /// Glob patterns matched against filenames AND directory component names.
    /// Matching files are skipped; matching directories are not descended into.
    /// Empty by default so every regular file under the root is considered.
    pub exclude_patterns: Vec<String>,

    /// Number of parallel copy workers. 1 copies sequentially.
    pub copy_workers: usize,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            max_depth: constants::DEFAULT_MAX_DEPTH,
            exclude_patterns: Vec::new(),
            copy_workers: constants::DEFAULT_COPY_WORKERS,
        }
    }
}

/// Files selected by a discovery walk plus the non-fatal warnings it raised.
#[derive(Debug, Default)]
pub struct Discovery {
    pub files: Vec<ModifiedFile>,
    pub warnings: Vec<String>,
}

// =============================================================================
// Discovery
// =============================================================================

/// Find every regular file under `root` modified inside `window`
/// (`start <= mtime < end`), in file-name-sorted walk order.
///
/// # Fatal errors
/// Returns `Err` only if the root path is invalid (`RootNotFound`,
/// `NotADirectory`, `PermissionDenied`).
pub fn discover_modified(
    root: &Path,
    window: &TimeWindow,
    config: &CollectConfig,
) -> Result<Discovery, CollectError> {
    // `fs::metadata` rather than `Path::is_dir` so access-denied roots are
    // distinguishable from missing ones.
    match fs::metadata(root) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(CollectError::NotADirectory {
                path: root.to_path_buf(),
            })
        }
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            return Err(CollectError::PermissionDenied {
                path: root.to_path_buf(),
                source: e,
            })
        }
        Err(_) => {
            return Err(CollectError::RootNotFound {
                path: root.to_path_buf(),
            })
        }
    }

    let max_depth = config.max_depth.min(constants::ABSOLUTE_MAX_DEPTH);

    tracing::debug!(
        root = %root.display(),
        max_depth,
        exclude = ?config.exclude_patterns,
        start = %window.start,
        end = %window.end,
        "Modified-file discovery starting"
    );

    let exclude_pats = compile_patterns(&config.exclude_patterns);
    let mut discovery = Discovery::default();

    let walker = walkdir::WalkDir::new(root)
        .max_depth(max_depth)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 {
                return true;
            }
            let name = e.file_name().to_str().unwrap_or("");
            if e.file_type().is_dir() {
                !is_excluded_component(name, &exclude_pats)
            } else {
                !is_excluded_filename(name, &exclude_pats)
            }
        });

    for entry_result in walker {
        let entry = match entry_result {
            Ok(e) => e,
            Err(e) => {
                let path_str = e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "<unknown>".to_string());
                let msg = format!("Cannot access '{path_str}': {e}");
                tracing::debug!(warning = %msg, "Discovery warning");
                discovery.warnings.push(msg);
                continue;
            }
        };

        if entry.file_type().is_dir() && entry.depth() == max_depth {
            let msg = format!(
                "Not searching '{}': directory is at the depth limit ({max_depth})",
                entry.path().display()
            );
            tracing::warn!(warning = %msg, "Discovery warning");
            discovery.warnings.push(msg);
            continue;
        }

        // Directories, symlinks, sockets, fifos and devices are not collected.
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                let msg = format!("Cannot read metadata for '{}': {e}", path.display());
                tracing::debug!(warning = %msg, "Discovery warning");
                discovery.warnings.push(msg);
                continue;
            }
        };

        let modified = match metadata.modified() {
            Ok(st) => DateTime::<Local>::from(st).naive_local(),
            Err(e) => {
                let msg = format!("Cannot read modification time of '{}': {e}", path.display());
                tracing::debug!(warning = %msg, "Discovery warning");
                discovery.warnings.push(msg);
                continue;
            }
        };

        if !window.contains_modified(modified) {
            tracing::trace!(file = %path.display(), mtime = %modified, "Outside window");
            continue;
        }

        let relative_path = match path.strip_prefix(root) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => {
                discovery
                    .warnings
                    .push(format!("Skipping '{}': not under root", path.display()));
                continue;
            }
        };

        discovery.files.push(ModifiedFile {
            path: path.to_path_buf(),
            relative_path,
            modified,
            size: metadata.len(),
        });
    }

    tracing::debug!(
        found = discovery.files.len(),
        warnings = discovery.warnings.len(),
        "Modified-file discovery complete"
    );

    Ok(discovery)
}

// =============================================================================
// Collection
// =============================================================================

/// Discover the files modified under `root` during `window` and copy them
/// into `destination`.
///
/// Never fails: a stage-level problem is reported in `CollectionResult::error`.
/// When nothing matches, neither the mirror directory nor the manifest is
/// created.
pub fn collect_modified(
    root: &Path,
    window: &TimeWindow,
    destination: &Path,
    config: &CollectConfig,
) -> CollectionResult {
    let discovery = match discover_modified(root, window, config) {
        Ok(d) => d,
        Err(e) => {
            tracing::warn!(error = %e, "Modified-file collection failed");
            return CollectionResult::failed_with(e.to_string());
        }
    };

    let mut result = CollectionResult {
        total_found: discovery.files.len(),
        warnings: discovery.warnings,
        ..Default::default()
    };

    if discovery.files.is_empty() {
        tracing::info!("No files were modified during the outage window");
        return result;
    }

    tracing::info!(
        found = result.total_found,
        bytes = discovery.files.iter().map(|f| f.size).sum::<u64>(),
        "Copying modified files"
    );

    let dest_root = destination.join(constants::MODIFIED_FILES_DIR_NAME);
    if let Err(source) = fs::create_dir_all(&dest_root) {
        let e = CollectError::CreateDir {
            path: dest_root,
            source,
        };
        tracing::warn!(error = %e, "Modified-file collection failed");
        result.error = Some(e.to_string());
        return result;
    }

    let manifest_path = destination.join(constants::MANIFEST_FILE_NAME);
    let mut manifest = match Manifest::create(&manifest_path, window) {
        Ok(m) => m,
        Err(source) => {
            let e = CollectError::Manifest {
                path: manifest_path,
                source,
            };
            tracing::warn!(error = %e, "Modified-file collection failed");
            result.error = Some(e.to_string());
            return result;
        }
    };
    result.manifest_path = Some(manifest_path);

    match build_copy_pool(config.copy_workers, &mut result.warnings) {
        Some(pool) => {
            // Copies within a batch run concurrently; `collect` keeps
            // discovery order so manifest lines stay deterministic.
            for batch in discovery.files.chunks(constants::COPY_BATCH_SIZE) {
                let records: Vec<FileRecord> =
                    pool.install(|| batch.par_iter().map(|f| copy_one(f, &dest_root)).collect());
                for record in records {
                    record_outcome(&mut result, &mut manifest, record);
                }
            }
        }
        None => {
            for file in &discovery.files {
                let record = copy_one(file, &dest_root);
                record_outcome(&mut result, &mut manifest, record);
            }
        }
    }

    tracing::info!(
        found = result.total_found,
        copied = result.copied_count(),
        failed = result.failed_count(),
        manifest = %manifest.path.display(),
        "Modified-file collection complete"
    );

    result
}

/// Copy one file to its mirrored location under `dest_root`.
fn copy_one(file: &ModifiedFile, dest_root: &Path) -> FileRecord {
    let dest = dest_root.join(&file.relative_path);

    if let Some(parent) = dest.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            return FileRecord::failed(file.path.clone(), dest, e.to_string());
        }
    }

    match copy_preserving_metadata(&file.path, &dest) {
        Ok(bytes) => {
            tracing::debug!(file = %file.path.display(), bytes, "Copied");
            FileRecord::copied(file.path.clone(), dest)
        }
        Err(e) => FileRecord::failed(file.path.clone(), dest, e.to_string()),
    }
}

fn record_outcome(result: &mut CollectionResult, manifest: &mut Manifest, record: FileRecord) {
    if let Err(e) = manifest.append(&record) {
        let msg = format!(
            "Cannot write manifest entry for '{}': {e}",
            record.source_path.display()
        );
        tracing::warn!(warning = %msg, "Manifest warning");
        result.warnings.push(msg);
    }

    match record.status {
        CopyStatus::Copied => result.copied.push(record.dest_path),
        CopyStatus::Failed => {
            tracing::warn!(
                file = %record.source_path.display(),
                reason = record.reason.as_deref().unwrap_or(""),
                "Could not copy modified file"
            );
            result.failed.push(record);
        }
    }
}

fn build_copy_pool(workers: usize, warnings: &mut Vec<String>) -> Option<rayon::ThreadPool> {
    if workers <= 1 {
        return None;
    }
    let workers = workers.min(constants::MAX_COPY_WORKERS);
    match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
        Ok(pool) => Some(pool),
        Err(e) => {
            let msg = format!("Cannot start {workers} copy workers ({e}); copying sequentially");
            tracing::warn!(warning = %msg, "Copy pool warning");
            warnings.push(msg);
            None
        }
    }
}

// =============================================================================
// Manifest
// =============================================================================

/// Append-only manifest, flushed after every line so partial progress
/// survives a crash mid-collection.
struct Manifest {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl Manifest {
    fn create(path: &Path, window: &TimeWindow) -> io::Result<Self> {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(
            writer,
            "# Files modified between {} and {}\n",
            window.start.format(constants::WINDOW_FORMAT),
            window.end.format(constants::WINDOW_FORMAT)
        )?;
        writer.flush()?;
        Ok(Self {
            path: path.to_path_buf(),
            writer,
        })
    }

    fn append(&mut self, record: &FileRecord) -> io::Result<()> {
        writeln!(self.writer, "{}", record.manifest_line())?;
        self.writer.flush()
    }
}

// =============================================================================
// Glob helpers
// =============================================================================

/// Compile exclude glob patterns. Patterns that fail to compile are logged
/// and skipped.
fn compile_patterns(patterns: &[String]) -> Vec<glob::Pattern> {
    patterns
        .iter()
        .filter_map(|p| match glob::Pattern::new(p) {
            Ok(compiled) => Some(compiled),
            Err(e) => {
                tracing::warn!(pattern = p, error = %e, "Invalid exclude pattern, skipping");
                None
            }
        })
        .collect()
}

/// Literal patterns (no wildcards) exclude directories by name, e.g. ".git".
fn is_excluded_component(dir_name: &str, exclude_pats: &[glob::Pattern]) -> bool {
    exclude_pats.iter().any(|p| {
        let s = p.as_str();
        !s.contains('*') && !s.contains('?') && !s.contains('[') && p.matches(dir_name)
    })
}

fn is_excluded_filename(file_name: &str, exclude_pats: &[glob::Pattern]) -> bool {
    exclude_pats.iter().any(|p| p.matches(file_name))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDateTime, TimeZone};
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, constants::WINDOW_FORMAT).unwrap()
    }

    fn to_system_time(t: NaiveDateTime) -> SystemTime {
        Local
            .from_local_datetime(&t)
            .single()
            .expect("unambiguous local time")
            .into()
    }

    fn write_with_mtime(path: &Path, content: &str, mtime: NaiveDateTime) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
        let f = File::options().write(true).open(path).unwrap();
        f.set_modified(to_system_time(mtime)).unwrap();
    }

    fn window() -> TimeWindow {
        TimeWindow::parse("2024-01-15 12:00:00", "2024-01-15 12:10:00").unwrap()
    }

    fn make_boundary_tree() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let w = window();
        write_with_mtime(&root.join("before.php"), "before", w.start - Duration::seconds(1));
        write_with_mtime(&root.join("at_start.php"), "start", w.start);
        write_with_mtime(&root.join("lib/mid.php"), "mid", w.start + Duration::seconds(30));
        write_with_mtime(&root.join("at_end.php"), "end", w.end);
        dir
    }

    #[test]
    fn test_discovery_half_open_bounds() {
        let dir = make_boundary_tree();
        let found = discover_modified(dir.path(), &window(), &CollectConfig::default()).unwrap();
        let rels: Vec<_> = found
            .files
            .iter()
            .map(|f| f.relative_path.to_string_lossy().into_owned())
            .collect();
        assert_eq!(rels, vec!["at_start.php", "lib/mid.php"]);
        assert!(found.warnings.is_empty(), "unexpected warnings: {:?}", found.warnings);
    }

    #[test]
    fn test_collect_copies_and_mirrors_tree() {
        let src = make_boundary_tree();
        let out = tempfile::tempdir().unwrap();
        let result = collect_modified(src.path(), &window(), out.path(), &CollectConfig::default());

        assert_eq!(result.error, None);
        assert_eq!(result.total_found, 2);
        assert_eq!(result.copied_count(), 2);
        assert_eq!(result.failed_count(), 0);

        let mirrored = out.path().join("modified_files").join("lib").join("mid.php");
        assert_eq!(fs::read_to_string(&mirrored).unwrap(), "mid");
        let mtime = fs::metadata(&mirrored).unwrap().modified().unwrap();
        assert_eq!(mtime, to_system_time(window().start + Duration::seconds(30)));
        assert!(!out.path().join("modified_files").join("at_end.php").exists());
    }

    #[test]
    fn test_manifest_lists_each_file_once() {
        let src = make_boundary_tree();
        let out = tempfile::tempdir().unwrap();
        let result = collect_modified(src.path(), &window(), out.path(), &CollectConfig::default());

        let manifest_path = result.manifest_path.expect("manifest written");
        let manifest = fs::read_to_string(manifest_path).unwrap();
        let mut lines = manifest.lines();
        assert_eq!(
            lines.next(),
            Some("# Files modified between 2024-01-15 12:00:00 and 2024-01-15 12:10:00")
        );
        assert_eq!(lines.next(), Some(""));
        let entries: Vec<_> = lines.collect();
        assert_eq!(
            entries,
            vec![
                src.path().join("at_start.php").display().to_string(),
                src.path().join("lib/mid.php").display().to_string(),
            ]
        );
    }

    #[test]
    fn test_copy_failure_is_recorded_and_run_continues() {
        let src = tempfile::tempdir().unwrap();
        let w = window();
        write_with_mtime(&src.path().join("a.php"), "a", w.start);
        write_with_mtime(&src.path().join("sub/b.php"), "b", w.start);
        write_with_mtime(&src.path().join("z.php"), "z", w.start);

        // A plain file where the mirrored `sub/` directory must go.
        let out = tempfile::tempdir().unwrap();
        fs::create_dir_all(out.path().join("modified_files")).unwrap();
        fs::write(out.path().join("modified_files").join("sub"), "blocker").unwrap();

        let result = collect_modified(src.path(), &w, out.path(), &CollectConfig::default());
        assert_eq!(result.error, None);
        assert_eq!(result.total_found, 3);
        assert_eq!(result.copied_count(), 2);
        assert_eq!(result.failed_count(), 1);
        assert_eq!(result.attempted(), 3);
        assert!(result.failed[0].reason.as_deref().is_some_and(|r| !r.is_empty()));

        let manifest = fs::read_to_string(result.manifest_path.unwrap()).unwrap();
        let failure = format!(
            "# FAILED TO COPY: {} - REASON: ",
            src.path().join("sub/b.php").display()
        );
        assert!(manifest.contains(&failure), "manifest: {manifest}");
        assert!(manifest.contains(&src.path().join("z.php").display().to_string()));
    }

    #[test]
    fn test_root_not_found_creates_nothing() {
        let out = tempfile::tempdir().unwrap();
        let dest = out.path().join("report");
        let result = collect_modified(
            Path::new("/nonexistent/outagesnap/app"),
            &window(),
            &dest,
            &CollectConfig::default(),
        );
        assert!(result.error.is_some());
        assert_eq!(result.total_found, 0);
        assert!(result.manifest_path.is_none());
        assert!(!dest.exists());
    }

    #[test]
    fn test_root_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("app.php");
        fs::write(&file, "x").unwrap();
        let result = discover_modified(&file, &window(), &CollectConfig::default());
        assert!(matches!(result, Err(CollectError::NotADirectory { .. })));
    }

    #[test]
    fn test_zero_matches_is_success_without_artifacts() {
        let src = tempfile::tempdir().unwrap();
        write_with_mtime(&src.path().join("old.php"), "old", ts("2023-06-01 08:00:00"));
        let out = tempfile::tempdir().unwrap();

        let result = collect_modified(src.path(), &window(), out.path(), &CollectConfig::default());
        assert_eq!(result.error, None);
        assert_eq!(result.total_found, 0);
        assert_eq!(result.copied_count(), 0);
        assert!(result.manifest_path.is_none());
        assert!(!out.path().join("modified_files").exists());
        assert!(!out.path().join("modified_files_manifest.txt").exists());
    }

    #[test]
    fn test_exclude_pattern_prunes_directory() {
        let src = tempfile::tempdir().unwrap();
        let w = window();
        write_with_mtime(&src.path().join("index.php"), "i", w.start);
        write_with_mtime(&src.path().join("cache/page.html"), "c", w.start);
        write_with_mtime(&src.path().join("debug.tmp"), "t", w.start);

        let config = CollectConfig {
            exclude_patterns: vec!["cache".to_string(), "*.tmp".to_string()],
            ..Default::default()
        };
        let found = discover_modified(src.path(), &w, &config).unwrap();
        let rels: Vec<_> = found.files.iter().map(|f| f.relative_path.clone()).collect();
        assert_eq!(rels, vec![PathBuf::from("index.php")]);
    }

    #[test]
    fn test_depth_limit_is_reported() {
        let dir = make_boundary_tree();
        let config = CollectConfig {
            max_depth: 1,
            ..Default::default()
        };
        let discovery = discover_modified(dir.path(), &window(), &config).unwrap();

        assert!(discovery.files.iter().all(|f| f.relative_path != Path::new("lib/mid.php")));
        assert_eq!(discovery.warnings.len(), 1, "warnings: {:?}", discovery.warnings);
        assert!(discovery.warnings[0].contains("depth limit"));
    }

    #[test]
    fn test_parallel_copy_keeps_manifest_order() {
        let src = tempfile::tempdir().unwrap();
        let w = window();
        let count = constants::COPY_BATCH_SIZE + 5;
        for i in 0..count {
            write_with_mtime(&src.path().join(format!("f{i:03}.txt")), &i.to_string(), w.start);
        }
        let out = tempfile::tempdir().unwrap();
        let config = CollectConfig {
            copy_workers: 4,
            ..Default::default()
        };

        let result = collect_modified(src.path(), &w, out.path(), &config);
        assert_eq!(result.copied_count(), count);

        let manifest = fs::read_to_string(result.manifest_path.unwrap()).unwrap();
        let entries: Vec<_> = manifest.lines().skip(2).collect();
        let expected: Vec<_> = (0..count)
            .map(|i| src.path().join(format!("f{i:03}.txt")).display().to_string())
            .collect();
        assert_eq!(entries, expected);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_not_collected() {
        let src = tempfile::tempdir().unwrap();
        let w = window();
        write_with_mtime(&src.path().join("real.php"), "r", w.start);
        std::os::unix::fs::symlink(src.path().join("real.php"), src.path().join("link.php"))
            .unwrap();

        let found = discover_modified(src.path(), &w, &CollectConfig::default()).unwrap();
        let rels: Vec<_> = found.files.iter().map(|f| f.relative_path.clone()).collect();
        assert_eq!(rels, vec![PathBuf::from("real.php")]);
    }
}
