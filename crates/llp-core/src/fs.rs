//! Filesystem / IO shim (C8).
//!
//! Every write in this crate goes through [`atomic_write`]: open
//! `<final>.tmp`, write the full contents, rename over `<final>`. Reads go
//! through [`read_to_string_lossy_bom`], which tolerates a leading UTF-8 BOM.
//! Directory creation is idempotent ([`ensure_dir`]).

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::WriteError;

/// Create `dir` and all of its parents if they don't already exist. A
/// pre-existing directory is not an error.
pub fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)
}

/// Write `contents` to `path` via the temp-then-rename discipline: a
/// `<name>.tmp` sibling is created, fully written and flushed, then renamed
/// into place. The rename is atomic on the same filesystem, so readers never
/// observe a partially-written file at `path`.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<(), WriteError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    ensure_dir(dir).map_err(|source| WriteError::TempCreate {
        dir: dir.to_path_buf(),
        source,
    })?;

    let tmp_path = tmp_sibling(path);
    let mut file = fs::File::create(&tmp_path).map_err(|source| WriteError::TempCreate {
        dir: dir.to_path_buf(),
        source,
    })?;
    file.write_all(contents)
        .and_then(|_| file.sync_all())
        .map_err(|source| WriteError::Write {
            path: tmp_path.clone(),
            source,
        })?;
    drop(file);

    fs::rename(&tmp_path, path).map_err(|source| WriteError::Rename {
        path: path.to_path_buf(),
        source,
    })
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{file_name}.tmp"))
}

/// Read a file to a `String`, stripping a leading UTF-8 BOM if present and
/// normalizing CRLF to LF. Non-UTF-8 bytes are replaced lossily — this
/// pipeline does not touch binary exports.
pub fn read_to_string_lossy_bom(path: &Path) -> std::io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(bytes_to_string_lossy_bom(&bytes))
}

pub fn bytes_to_string_lossy_bom(bytes: &[u8]) -> String {
    let bytes = strip_bom(bytes);
    let text = String::from_utf8_lossy(bytes);
    if text.contains('\r') {
        text.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        text.into_owned()
    }
}

/// Strip a leading UTF-8 BOM (`EF BB BF`) from a byte slice, if present.
pub fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(b"\xef\xbb\xbf").unwrap_or(bytes)
}
