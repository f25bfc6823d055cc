// OutageSnap - platform/fs.rs
//
// Filesystem primitives used by the collector and the report stages.

use std::fs::{self, File, FileTimes};
use std::io::{self, Write};
use std::path::Path;

/// Copy `src` to `dest`, keeping permission bits and access/modification
/// times so the copy is forensically faithful to the original.
///
/// Times are applied before permissions so a read-only source does not stop
/// the timestamps from being written. Returns the number of bytes copied.
pub fn copy_preserving_metadata(src: &Path, dest: &Path) -> io::Result<u64> {
    let mut reader = File::open(src)?;
    let meta = reader.metadata()?;

    // A read-only copy left by an earlier run cannot be truncated in place.
    match fs::remove_file(dest) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
        _ => {}
    }

    let mut writer = File::create(dest)?;
    let bytes = io::copy(&mut reader, &mut writer)?;
    writer.flush()?;

    let mut times = FileTimes::new().set_modified(meta.modified()?);
    if let Ok(accessed) = meta.accessed() {
        times = times.set_accessed(accessed);
    }
    writer.set_times(times)?;
    writer.set_permissions(meta.permissions())?;

    Ok(bytes)
}

/// Write a report artifact, replacing any previous content.
pub fn write_artifact(path: &Path, contents: &[u8]) -> io::Result<()> {
    fs::write(path, contents)?;
    tracing::debug!(path = %path.display(), bytes = contents.len(), "Artifact written");
    Ok(())
}
