//! Manifest store (C5).
//!
//! `manifest.json` is the single per-provider index over an archive: which
//! conversations were parsed, where each thread file lives, and the
//! timestamp span it covers. It is rewritten in full on every `parse` run
//! (never patched in place) so its content is always a pure function of the
//! current input plus the previous archive it's merged against.

use std::path::Path;

use crate::error::{PipelineError, WriteError};
use crate::fs::atomic_write;
use crate::json_fmt::to_vec_pretty_ascii;
use crate::types::{Manifest, ManifestEntry, ManifestIndex, MANIFEST_SCHEMA_VERSION};

pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Load `manifest.json` from `dir` if it exists, otherwise build a fresh
/// empty manifest for `provider`/`policy`.
pub fn load_or_init(dir: &Path, provider: &str, policy: &str, exported_at: &str) -> Manifest {
    let path = dir.join(MANIFEST_FILE_NAME);
    match std::fs::read_to_string(&path) {
        Ok(text) => serde_json::from_str(&text).unwrap_or_else(|_| {
            empty_manifest(provider, policy, exported_at)
        }),
        Err(_) => empty_manifest(provider, policy, exported_at),
    }
}

fn empty_manifest(provider: &str, policy: &str, exported_at: &str) -> Manifest {
    Manifest {
        schema_version: MANIFEST_SCHEMA_VERSION,
        provider: provider.to_string(),
        policy: policy.to_string(),
        exported_at: exported_at.to_string(),
        index: ManifestIndex { threads: Vec::new() },
    }
}

/// Merge freshly produced entries into `manifest`, replacing any existing
/// entry for the same conversation and appending new ones, then sorting the
/// whole index by conversation id for a stable, diff-friendly file.
pub fn upsert_entries(manifest: &mut Manifest, entries: Vec<ManifestEntry>) {
    for entry in entries {
        if let Some(existing) = manifest
            .index
            .threads
            .iter_mut()
            .find(|e| e.conversation_id == entry.conversation_id)
        {
            *existing = entry;
        } else {
            manifest.index.threads.push(entry);
        }
    }
    manifest
        .index
        .threads
        .sort_by(|a, b| a.conversation_id.cmp(&b.conversation_id));
}

/// Write `manifest` to `dir/manifest.json` atomically, ASCII-escaped and
/// two-space indented.
pub fn save(manifest: &Manifest, dir: &Path) -> Result<(), PipelineError> {
    let path = dir.join(MANIFEST_FILE_NAME);
    let bytes = to_vec_pretty_ascii(manifest).map_err(|source| WriteError::Serialize {
        path: path.clone(),
        source,
    })?;
    atomic_write(&path, &bytes)?;
    Ok(())
}

/// Read an existing `manifest.json`, failing with [`PipelineError::MissingParsedRoot`]
/// if it isn't there — used by `export`/`chain` to discover what `parse`
/// already produced.
pub fn load_existing(dir: &Path) -> Result<Manifest, PipelineError> {
    let path = dir.join(MANIFEST_FILE_NAME);
    let text = std::fs::read_to_string(&path).map_err(|_| {
        PipelineError::MissingParsedRoot(dir.to_path_buf())
    })?;
    serde_json::from_str(&text).map_err(|_| PipelineError::MissingParsedRoot(dir.to_path_buf()))
}
