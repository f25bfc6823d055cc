// OutageSnap - core/slicer.rs
//
// Time-windowed log slicing.
//
// Streams a log file line by line and keeps, byte-for-byte, every line whose
// embedded timestamp falls inside the window. Memory use is bounded by the
// retained subset plus one line.
//
// Failure policy:
//   - Missing file: SliceOutcome::Missing, never an error.
//   - No regex match or unparsable timestamp: line skipped silently.
//   - Open/read I/O error: SliceError::Read; the caller moves on to the
//     next source.

use crate::core::model::{LogSlice, LogSource, SliceOutcome, TimeWindow};
use crate::util::constants;
use crate::util::error::SliceError;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Slice `source` to the lines whose timestamp lies in `window` (inclusive).
pub fn slice_log(source: &LogSource, window: &TimeWindow) -> Result<SliceOutcome, SliceError> {
    let path = source.path.as_path();

    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => {
            tracing::debug!(path = %path.display(), "Log path is not a regular file; treating as missing");
            return Ok(SliceOutcome::Missing);
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "Log file not found");
            return Ok(SliceOutcome::Missing);
        }
        Err(e) => return Err(read_error(path, e)),
    }

    let file = File::open(path).map_err(|e| read_error(path, e))?;
    let slice = slice_reader(
        BufReader::new(file),
        &source.timestamp_pattern,
        &source.timestamp_format,
        window,
    )
    .map_err(|e| read_error(path, e))?;

    tracing::debug!(
        source = %source.label,
        path = %path.display(),
        lines = slice.line_count(),
        "Log slice complete"
    );

    if slice.is_empty() {
        Ok(SliceOutcome::NoMatches)
    } else {
        Ok(SliceOutcome::Matched(slice))
    }
}

fn read_error(path: &Path, source: io::Error) -> SliceError {
    SliceError::Read {
        path: path.to_path_buf(),
        source,
    }
}

/// Core line filter, independent of where the bytes come from.
///
/// Each raw line (terminator included) is matched against `pattern` after a
/// lossy UTF-8 decode with the terminator stripped; the retained bytes are the
/// original ones.
pub fn slice_reader<R: BufRead>(
    mut reader: R,
    pattern: &Regex,
    format: &str,
    window: &TimeWindow,
) -> io::Result<LogSlice> {
    let mut slice = LogSlice::new();
    let mut buf = Vec::new();
    let mut line_number: u64 = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_number += 1;

        let text = String::from_utf8_lossy(strip_terminator(&buf));
        let Some(raw_ts) = extract_timestamp(pattern, &text) else {
            continue;
        };

        match parse_timestamp(raw_ts, format) {
            Some(t) if window.contains(t) => slice.push_line(&buf),
            Some(_) => {}
            None => {
                tracing::trace!(
                    line_number,
                    raw_timestamp = raw_ts,
                    format,
                    line = %preview(&text),
                    "Unparsable timestamp, line skipped"
                );
            }
        }
    }

    Ok(slice)
}

fn strip_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(constants::DEBUG_MAX_LINE_PREVIEW) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Pull the timestamp text out of a line: the `timestamp` named group if the
/// pattern has one, otherwise group 1.
fn extract_timestamp<'t>(pattern: &Regex, line: &'t str) -> Option<&'t str> {
    let caps = pattern.captures(line)?;
    caps.name(constants::TIMESTAMP_GROUP_NAME)
        .or_else(|| caps.get(1))
        .map(|m| m.as_str())
}

// =============================================================================
// Timestamp parsing
// =============================================================================

/// Parse a captured timestamp with a chrono format string.
///
/// Strategy:
///   1. `NaiveDateTime` with the format. An offset in the format (`%z`) is
///      parsed and dropped, so the written wall-clock time is compared.
///   2. Offset-aware `DateTime` with the format, reduced to its written
///      local time (covers offsets chrono only accepts in this form).
///   3. `NaiveDate` only, at midnight, for date-only formats.
///
/// Returns `None` when every strategy fails; callers skip the line.
pub fn parse_timestamp(raw: &str, format: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();

    if let Ok(ndt) = NaiveDateTime::parse_from_str(trimmed, format) {
        return Some(ndt);
    }

    if let Ok(dt) = DateTime::parse_from_str(trimmed, format) {
        return Some(dt.naive_local());
    }

    NaiveDate::parse_from_str(trimmed, format)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
