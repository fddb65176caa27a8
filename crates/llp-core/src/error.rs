//! Error kinds for the ingestion/export pipeline.
//!
//! Each stage in the pipeline (§4 of the design) has its own leaf error type;
//! [`PipelineError`] is the aggregate returned by the public entry points in
//! [`crate::pipeline`]. Per-record and per-message failures (`AdapterError`,
//! `ValidationError`) are usually *counted*, not propagated — see
//! [`crate::pipeline::RunStats`].

use std::path::PathBuf;

/// C1 — the stream reader could not produce records at all.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("input file not found: {0}")]
    NotFound(PathBuf),

    #[error("permission denied reading {0}")]
    PermissionDenied(PathBuf),

    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed top-level JSON in {path}: {source}")]
    MalformedTopLevel {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} has no `thread` meta record on its first line")]
    MissingThreadMeta(PathBuf),
}

/// C2 — a conversation-shaped record could not be normalized at all.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("record has no `mapping` field and is not conversation-shaped")]
    NotConversationShaped,
}

/// C3 — one normalized message failed a schema invariant.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("message missing required field `{field}`")]
    MissingField { field: &'static str },

    #[error("message field `{field}` must be non-empty")]
    EmptyField { field: &'static str },

    #[error("message ts is not a valid epoch-millisecond value: {ts}")]
    InvalidTimestamp { ts: i64 },
}

/// C6/C7 — failure between opening a temp file and completing the rename.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("failed to create temp file in {dir}: {source}")]
    TempCreate {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to rename temp file into {path}: {source}")]
    Rename {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize record for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Invalid split/size expressions, unknown enum values, etc. Unknown
/// timezones are *not* a `ConfigError` — per spec they fall back to UTC with
/// a warning and never abort the run.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid size expression: {0:?}")]
    InvalidSizeExpr(String),

    #[error("invalid --split expression: {0:?}")]
    InvalidSplitExpr(String),
}

/// Aggregate error returned by the public pipeline entry points.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("aborting after {count} adapter errors (fail-fast)")]
    TooManyAdapterErrors { count: usize },

    #[error("aborting on first validation error (fail-fast): {0}")]
    FailFastValidation(#[source] ValidationError),

    #[error("parsed root not found: {0}")]
    MissingParsedRoot(PathBuf),

    #[error("run cancelled; prior manifest retained")]
    Cancelled,
}
