//! Pipeline orchestration: the three public entry points (`run_parse`,
//! `run_export`, `run_chain`) that wire C1..C8 together per request.
//!
//! Per-conversation work (C6 write, optionally C7 render) is independent
//! once C1-C4 have produced the grouped threads, so it fans out over a
//! `tokio::sync::Semaphore`-bounded set of tasks sized by `jobs` — the same
//! bounded-concurrency shape used for inbound connections in network
//! services, applied here to independent per-thread jobs instead of
//! sockets. `jobs == 1` takes a plain sequential loop instead of spawning,
//! which is both simpler and the only way to guarantee the strictly
//! deterministic single-worker ordering the concurrency model calls for.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{AdapterError, PipelineError};
use crate::group::{group_by_conversation, Thread};
use crate::manifest;
use crate::normalize::normalize_and_validate;
use crate::reader::read_records;
use crate::render::export_thread_md;
use crate::types::{
    ChainStats, ExportPolicy, ExportRequest, ManifestEntry, ParseRequest, RunStats,
};
use crate::writer::write_thread;

const MAX_ADAPTER_ERRORS_FAIL_FAST: usize = 3;

/// Cooperative cancellation token, checked between threads (never mid-thread)
/// so a cancelled run never leaves a partially-written thread or manifest.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Policy identifier recorded on the manifest for a bare `parse` run — there
/// is no export policy at this stage, so the manifest records the fixed
/// normalization policy name rather than a render policy.
const PARSE_POLICY_NAME: &str = "default";

/// Run a `parse` request end to end: read, linearize, normalize, group,
/// diff against the prior manifest, write non-skipped threads, commit the
/// new manifest.
pub async fn run_parse(
    req: &ParseRequest,
    cancel: &CancelToken,
) -> Result<RunStats, PipelineError> {
    let mut stats = RunStats::default();
    let (_shape, records) = read_records(&req.input_path)?;
    let source_stem = req.input_path.file_stem().and_then(|s| s.to_str());

    let mut all_messages = Vec::new();
    for record in &records {
        match req.provider.linearize(record, source_stem) {
            Ok(messages) => all_messages.extend(messages),
            Err(err) => {
                stats.adapter_errors += 1;
                stats.record_error_sample(err.to_string());
                if req.fail_fast && stats.adapter_errors > MAX_ADAPTER_ERRORS_FAIL_FAST {
                    return Err(PipelineError::TooManyAdapterErrors {
                        count: stats.adapter_errors,
                    });
                }
                let _: &AdapterError = &err;
            }
        }
    }

    let validated = normalize_and_validate(all_messages, req.fail_fast, &mut stats)
        .map_err(PipelineError::FailFastValidation)?;

    let threads = group_by_conversation(validated);
    stats.threads = threads.len();
    stats.messages = threads.iter().map(|t| t.messages.len()).sum();

    if req.dry_run {
        info!(threads = stats.threads, messages = stats.messages, "dry run: no files written");
        return Ok(stats);
    }

    let provider_dir = req.outdir.join(req.provider.as_str());
    let exported_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let mut manifest = manifest::load_or_init(&provider_dir, req.provider.as_str(), PARSE_POLICY_NAME, &exported_at);

    let mut new_entries = Vec::new();
    let outcomes = write_threads(&provider_dir, req.provider.as_str(), threads, &manifest, req.jobs, cancel).await;

    for outcome in outcomes {
        if outcome.written {
            if let Some(entry) = outcome.entry {
                new_entries.push(entry);
            }
        } else {
            stats.skipped += 1;
        }
    }

    if cancel.is_cancelled() {
        warn!("run cancelled; retaining prior manifest");
        return Err(PipelineError::Cancelled);
    }

    manifest.exported_at = exported_at;
    manifest::upsert_entries(&mut manifest, new_entries);
    manifest::save(&manifest, &provider_dir)?;

    Ok(stats)
}

/// Per-thread skip-then-write step, shared by the sequential and
/// concurrent fan-out paths.
fn write_one(
    provider_dir: &Path,
    provider_id: &str,
    thread: &Thread,
    manifest: &crate::types::Manifest,
) -> Result<crate::types::ThreadOutcome, PipelineError> {
    let new_count = thread.messages.len();
    let prior = manifest
        .index
        .threads
        .iter()
        .find(|e| e.conversation_id == thread.conversation_id);

    if let Some(prior) = prior {
        if prior.count == new_count {
            info!(conversation_id = %thread.conversation_id, "SKIP thread (unchanged count)");
            return Ok(crate::types::ThreadOutcome {
                conversation_id: thread.conversation_id.clone(),
                written: false,
                entry: None,
            });
        }
    }

    let path = write_thread(provider_dir, provider_id, thread)?;
    let rel_path = path
        .strip_prefix(provider_dir)
        .unwrap_or(&path)
        .to_string_lossy()
        .replace('\\', "/");

    info!(conversation_id = %thread.conversation_id, messages = new_count, "wrote thread");
    Ok(crate::types::ThreadOutcome {
        conversation_id: thread.conversation_id.clone(),
        written: true,
        entry: Some(ManifestEntry {
            conversation_id: thread.conversation_id.clone(),
            path: rel_path,
            count: new_count,
            ts_min: thread.ts_min(),
            ts_max: thread.ts_max(),
        }),
    })
}

async fn write_threads(
    provider_dir: &Path,
    provider_id: &str,
    threads: Vec<Thread>,
    manifest: &crate::types::Manifest,
    jobs: usize,
    cancel: &CancelToken,
) -> Vec<crate::types::ThreadOutcome> {
    if jobs <= 1 {
        let mut out = Vec::with_capacity(threads.len());
        for thread in &threads {
            if cancel.is_cancelled() {
                break;
            }
            match write_one(provider_dir, provider_id, thread, manifest) {
                Ok(outcome) => out.push(outcome),
                Err(err) => warn!(conversation_id = %thread.conversation_id, error = %err, "thread write failed"),
            }
        }
        return out;
    }

    let semaphore = Arc::new(tokio::sync::Semaphore::new(jobs));
    let mut join_set = tokio::task::JoinSet::new();
    let provider_dir = provider_dir.to_path_buf();
    let provider_id = provider_id.to_string();
    let manifest = manifest.clone();

    for thread in threads {
        if cancel.is_cancelled() {
            break;
        }
        let semaphore = Arc::clone(&semaphore);
        let provider_dir = provider_dir.clone();
        let provider_id = provider_id.clone();
        let manifest = manifest.clone();
        join_set.spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
            write_one(&provider_dir, &provider_id, &thread, &manifest)
        });
    }

    let mut out = Vec::new();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(Ok(outcome)) => out.push(outcome),
            Ok(Err(err)) => warn!(error = %err, "thread write failed"),
            Err(err) => warn!(error = %err, "thread write task panicked"),
        }
    }
    out
}

/// Run an `export` request: render one already-parsed thread to Markdown.
pub fn run_export(req: &ExportRequest) -> Result<crate::render::RenderOutcome, PipelineError> {
    export_thread_md(&req.parsed_path, req.out_path.as_deref(), &req.policy)
}

/// Run a `chain` request: parse, then export every resulting thread's
/// `parsed.jsonl`, mirroring `cli.py`'s `chain` subcommand. `parsed_root`
/// lets the caller skip the parse phase entirely against an already-parsed
/// tree (the "missing parsed root" exit-code-4 path when it's absent).
pub async fn run_chain(
    parse_req: Option<&ParseRequest>,
    parsed_root: &Path,
    policy: &ExportPolicy,
    cancel: &CancelToken,
) -> Result<ChainStats, PipelineError> {
    if let Some(parse_req) = parse_req {
        run_parse(parse_req, cancel).await?;
    }

    let manifest = manifest::load_existing(parsed_root)?;
    let mut chain_stats = ChainStats {
        threads: manifest.index.threads.len(),
        ..ChainStats::default()
    };

    for entry in &manifest.index.threads {
        if cancel.is_cancelled() {
            break;
        }
        let parsed_path = parsed_root.join(&entry.path);
        match export_thread_md(&parsed_path, None, policy) {
            Ok(_) => chain_stats.exported += 1,
            Err(err) => {
                chain_stats.failed += 1;
                warn!(conversation_id = %entry.conversation_id, error = %err, "export failed during chain");
            }
        }
    }

    Ok(chain_stats)
}

/// Resolve the `<outdir>/<provider>` path a [`ParseRequest`] writes under.
pub fn provider_dir(req: &ParseRequest) -> PathBuf {
    req.outdir.join(req.provider.as_str())
}
