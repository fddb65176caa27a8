//! Core types shared across the pipeline stages: the opaque [`RawRecord`],
//! the canonical [`NormalizedMessage`], and the on-disk [`Manifest`] shape.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// An opaque decoded JSON value from the input, before any schema is
/// enforced. Exists as a newtype (rather than using `serde_json::Value`
/// directly everywhere) so adapter code reads as "raw provider data in,
/// normalized data out" rather than "value in, value out".
#[derive(Debug, Clone)]
pub struct RawRecord(pub serde_json::Value);

impl RawRecord {
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_value(self) -> serde_json::Value {
        self.0
    }
}

impl From<serde_json::Value> for RawRecord {
    fn from(v: serde_json::Value) -> Self {
        RawRecord(v)
    }
}

/// `content.content_type` + `content.parts`, carried verbatim from the
/// adapter through to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageContent {
    pub content_type: String,
    pub parts: Vec<String>,
}

/// The canonical unit crossing C2 → C7. Every field but `parent_id` and
/// `model` is required after C3 has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedMessage {
    pub conversation_id: String,
    pub message_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub role: String,
    /// Epoch milliseconds, UTC. See [`crate::time::to_epoch_ms`].
    pub ts: i64,
    pub content: MessageContent,
    pub text: String,
    /// Model slug, when the provider exposes one (e.g. ChatGPT's
    /// `message.metadata.model_slug`). Not part of the distilled schema but
    /// needed by the renderer's front-matter `models` list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl NormalizedMessage {
    /// Sort/group key used by the grouper (C4) and the adapter's final
    /// re-sort: `(ts is absent, ts, message_id)`. `ts` is never actually
    /// absent on a `NormalizedMessage` (C2 drops timestamp-less nodes before
    /// construction), so the first element is always `false`; the tuple
    /// shape is kept so the comparator reads identically to the spec text.
    pub fn sort_key(&self) -> (bool, i64, &str) {
        (false, self.ts, self.message_id.as_str())
    }
}

/// First line of a per-thread output file (§3 `ThreadFileRecord`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMeta {
    pub record_type: ThreadRecordType,
    pub provider_id: String,
    pub conversation_id: String,
    pub message_count: usize,
}

/// A message line in a per-thread output file: a [`NormalizedMessage`]
/// augmented with `provider_id` and `record_type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMessageRecord {
    pub record_type: ThreadRecordType,
    pub provider_id: String,
    #[serde(flatten)]
    pub message: NormalizedMessage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadRecordType {
    Thread,
    Message,
}

/// One line of `parsed.jsonl`: either the thread meta record or a message.
#[derive(Debug, Clone)]
pub enum ThreadFileRecord {
    Thread(ThreadMeta),
    Message(ThreadMessageRecord),
}

/// One entry in `manifest.json`'s `index.threads[]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManifestEntry {
    pub conversation_id: String,
    pub path: String,
    pub count: usize,
    pub ts_min: i64,
    pub ts_max: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestIndex {
    pub threads: Vec<ManifestEntry>,
}

/// The single per-provider archive index (§3 `Manifest`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: u32,
    pub provider: String,
    pub policy: String,
    pub exported_at: String,
    pub index: ManifestIndex,
}

pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

/// Request object driving a `parse` run (C1 → C6). Mirrors the original
/// CLI's `parse` subcommand options one field at a time — see
/// `cli/cli.py`'s `parse_cmd` arguments.
#[derive(Debug, Clone)]
pub struct ParseRequest {
    pub provider: crate::provider::ProviderId,
    pub input_path: PathBuf,
    pub outdir: PathBuf,
    pub dry_run: bool,
    pub fail_fast: bool,
    pub jobs: usize,
}

/// Request object driving an `export` run (C7 reading a single thread).
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub parsed_path: PathBuf,
    pub out_path: Option<PathBuf>,
    pub policy: ExportPolicy,
}

/// Formatting + split behavior for the Markdown renderer (§4.7).
#[derive(Debug, Clone)]
pub struct ExportPolicy {
    pub formatting: Formatting,
    pub timezone: String,
    pub split: SplitSpec,
    pub split_hard: bool,
    pub soft_overflow: f64,
    pub tiny_tail_threshold: usize,
    pub preview: bool,
}

impl Default for ExportPolicy {
    fn default() -> Self {
        ExportPolicy {
            formatting: Formatting::Light,
            timezone: "UTC".to_string(),
            split: SplitSpec::None,
            split_hard: false,
            soft_overflow: 0.20,
            tiny_tail_threshold: 20,
            preview: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formatting {
    None,
    Light,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SplitSpec {
    None,
    Size(u64),
    Count(usize),
    Auto,
}

impl SplitSpec {
    /// Parse a `--split` expression: `size=<expr>`, `count=<N>`, or `auto`.
    /// `None`/absent is represented by [`SplitSpec::None`] and is never
    /// produced by this parser — callers default to it themselves.
    pub fn parse(spec: &str) -> Result<SplitSpec, crate::error::ConfigError> {
        let s = spec.trim().to_ascii_lowercase();
        if s == "auto" {
            return Ok(SplitSpec::Auto);
        }
        if let Some(rest) = s.strip_prefix("size=") {
            let bytes = crate::sizeexpr::parse_size_expr(rest)?;
            return Ok(SplitSpec::Size(bytes));
        }
        if let Some(rest) = s.strip_prefix("count=") {
            let n: usize = rest
                .parse()
                .map_err(|_| crate::error::ConfigError::InvalidSplitExpr(spec.to_string()))?;
            return Ok(SplitSpec::Count(n));
        }
        Err(crate::error::ConfigError::InvalidSplitExpr(spec.to_string()))
    }
}

/// Aggregate run counters, reported per spec §7: `(threads, messages,
/// errors, skipped)` plus a capped sample list of the errors themselves.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub threads: usize,
    pub messages: usize,
    pub adapter_errors: usize,
    pub validation_errors: usize,
    pub skipped: usize,
    pub error_samples: Vec<String>,
}

impl RunStats {
    const MAX_SAMPLES: usize = 5;

    pub fn record_error_sample(&mut self, message: String) {
        if self.error_samples.len() < Self::MAX_SAMPLES {
            self.error_samples.push(message);
        }
    }

    pub fn total_errors(&self) -> usize {
        self.adapter_errors + self.validation_errors
    }
}

/// Per-thread outcome fed into the manifest aggregator over a channel
/// (§5 "a thread-safe channel of per-thread results").
#[derive(Debug, Clone)]
pub struct ThreadOutcome {
    pub conversation_id: String,
    pub written: bool,
    pub entry: Option<ManifestEntry>,
}

/// A map from raw field names to arbitrary JSON, used only by the adapter
/// while it still holds unstructured provider data.
pub type RawFields = HashMap<String, serde_json::Value>;

/// Outcome of a `chain` run (parse, then export every resulting thread).
#[derive(Debug, Clone, Default)]
pub struct ChainStats {
    pub threads: usize,
    pub exported: usize,
    pub failed: usize,
}
