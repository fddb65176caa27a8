//! Stream reader (C1).
//!
//! Detects the shape of the input export (top-level JSON array, top-level
//! JSON object, or newline-delimited JSON) and yields [`RawRecord`]s one at a
//! time, never materializing the whole file. Array mode is the common case —
//! a ChatGPT `conversations.json` export is one big array of conversation
//! objects — so it gets a dedicated byte-level scanner rather than buffering
//! the array into a `Vec<Value>` first.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::InputError;
use crate::fs::read_to_string_lossy_bom;
use crate::types::RawRecord;

/// The detected top-level shape of an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputShape {
    Array,
    Object,
    LineDelimited,
}

/// Sniff the shape of `text` by skipping leading whitespace and looking at
/// the first non-whitespace byte. Anything that isn't `[` or `{` is treated
/// as newline-delimited JSON (one record per non-blank line).
pub fn detect_shape(text: &str) -> InputShape {
    match text.trim_start().as_bytes().first() {
        Some(b'[') => InputShape::Array,
        Some(b'{') => InputShape::Object,
        _ => InputShape::LineDelimited,
    }
}

/// Read `path`, detect its shape, and return the decoded records plus the
/// shape that was used. Loads the whole file into memory as text (exports
/// are typically tens of megabytes, not gigabytes) but never builds a
/// `serde_json::Value` for more than one top-level record at a time.
pub fn read_records(path: &Path) -> Result<(InputShape, Vec<RawRecord>), InputError> {
    let text = load_text(path)?;
    let shape = detect_shape(&text);
    let records = match shape {
        InputShape::Array => read_array(&text, path)?,
        InputShape::Object => vec![read_object(&text, path)?],
        InputShape::LineDelimited => read_lines(&text, path),
    };
    Ok((shape, records))
}

fn load_text(path: &Path) -> Result<String, InputError> {
    if !path.exists() {
        return Err(InputError::NotFound(path.to_path_buf()));
    }
    read_to_string_lossy_bom(path).map_err(|source| match source.kind() {
        std::io::ErrorKind::PermissionDenied => InputError::PermissionDenied(path.to_path_buf()),
        _ => InputError::Io {
            path: path.to_path_buf(),
            source,
        },
    })
}

fn read_object(text: &str, path: &Path) -> Result<RawRecord, InputError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|source| InputError::MalformedTopLevel {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(RawRecord::from(value))
}

fn read_lines(text: &str, path: &Path) -> Vec<RawRecord> {
    let mut out = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<serde_json::Value>(line) {
            Ok(value) => out.push(RawRecord::from(value)),
            Err(source) => warn!(
                path = %path.display(),
                line = lineno + 1,
                error = %source,
                "skipping malformed line",
            ),
        }
    }
    out
}

/// Scan a top-level JSON array's source text and decode each element
/// independently, so a single malformed element doesn't invalidate the whole
/// array the way a single `serde_json::from_str::<Vec<Value>>` call would.
fn read_array(text: &str, path: &Path) -> Result<Vec<RawRecord>, InputError> {
    let bytes = text.as_bytes();
    let mut pos = skip_ws(bytes, 0);
    if bytes.get(pos) != Some(&b'[') {
        return Err(InputError::MalformedTopLevel {
            path: path.to_path_buf(),
            source: serde_json::from_str::<serde_json::Value>("").unwrap_err(),
        });
    }
    pos += 1;
    pos = skip_ws(bytes, pos);

    let mut out = Vec::new();
    if bytes.get(pos) == Some(&b']') {
        return Ok(out);
    }

    loop {
        let start = pos;
        let end = scan_element(bytes, start, path)?;
        let slice = &text[start..end];
        match serde_json::from_str::<serde_json::Value>(slice) {
            Ok(value) if value.is_object() => out.push(RawRecord::from(value)),
            Ok(_) => warn!(
                path = %path.display(),
                byte_offset = start,
                "skipping non-object array element",
            ),
            Err(source) => warn!(
                path = %path.display(),
                byte_offset = start,
                error = %source,
                "skipping malformed array element",
            ),
        }
        pos = skip_ws(bytes, end);
        match bytes.get(pos) {
            Some(b',') => {
                pos = skip_ws(bytes, pos + 1);
                continue;
            }
            Some(b']') => break,
            _ => {
                return Err(InputError::MalformedTopLevel {
                    path: path.to_path_buf(),
                    source: serde_json::from_str::<serde_json::Value>("").unwrap_err(),
                });
            }
        }
    }
    Ok(out)
}

fn skip_ws(bytes: &[u8], mut pos: usize) -> usize {
    while let Some(b) = bytes.get(pos) {
        if b.is_ascii_whitespace() {
            pos += 1;
        } else {
            break;
        }
    }
    pos
}

/// Scan one JSON value starting at `start`, tracking bracket depth and
/// string/escape state, and return the exclusive end byte offset.
fn scan_element(bytes: &[u8], start: usize, path: &Path) -> Result<usize, InputError> {
    let mut pos = start;
    let mut depth: i64 = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut started = false;

    while pos < bytes.len() {
        let b = bytes[pos];
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
                if depth == 0 {
                    pos += 1;
                    return Ok(pos);
                }
            }
            pos += 1;
            continue;
        }

        if depth == 0 && started && (b == b',' || b == b']') {
            // A bare scalar (number/bool/null) at depth 0 ends here; the
            // caller consumes the separator or closing bracket itself.
            return Ok(pos);
        }

        match b {
            b'"' => {
                in_string = true;
                started = true;
            }
            b'{' | b'[' => {
                depth += 1;
                started = true;
            }
            b'}' | b']' => {
                depth -= 1;
                if depth == 0 {
                    pos += 1;
                    return Ok(pos);
                }
            }
            _ => {
                started = true;
            }
        }
        pos += 1;
    }

    if depth != 0 || in_string {
        return Err(InputError::MalformedTopLevel {
            path: path.to_path_buf(),
            source: serde_json::from_str::<serde_json::Value>("").unwrap_err(),
        });
    }
    Ok(pos)
}

/// Sibling helper for callers that already have an in-memory path but want a
/// friendlier not-found error without a separate `Path::exists` call.
pub fn require_exists(path: &Path) -> Result<(), InputError> {
    if path.exists() {
        Ok(())
    } else {
        Err(InputError::NotFound(PathBuf::from(path)))
    }
}
