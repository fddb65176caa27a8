//! Markdown renderer (C7) — the splitter.
//!
//! Reads a thread written by [`crate::writer`], renders one Markdown "block"
//! per message, then decides where to cut those blocks into parts under two
//! simultaneous budgets (byte size and message count). The cut algorithm,
//! front-matter keys, and soft-overflow/tiny-tail escapes are grounded in
//! `original_source/.../core/exporter.py::export_thread_md`, the
//! authoritative reference for this module.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::SecondsFormat;

use crate::error::{ConfigError, InputError, PipelineError, WriteError};
use crate::fs::{atomic_write, ensure_dir, read_to_string_lossy_bom};
use crate::normalize::sanitize_text;
use crate::sizeexpr::parse_size_expr;
use crate::time::{format_local, resolve_timezone};
use crate::types::{
    ExportPolicy, Formatting, NormalizedMessage, SplitSpec, ThreadMessageRecord, ThreadMeta,
};

/// The default `auto` split budget: `size=4MiB`, `count=1500` (§4.7).
const AUTO_SIZE_BYTES: u64 = 4 * 1024 * 1024;
const AUTO_COUNT: usize = 1500;

/// Approximate front-matter overhead budgeted against in soft (non-`hard`)
/// size mode, in lieu of rendering a tentative page on every block.
const FRONT_MATTER_OVERHEAD_BYTES: u64 = 1024;

const MAX_FILENAME_LEN: usize = 120;

/// Result of one `export_thread_md` call.
#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub paths: Vec<PathBuf>,
    pub preview: Option<PreviewStats>,
}

/// Reported by preview mode (§4.7 "Preview mode") instead of writing files.
#[derive(Debug, Clone, Copy)]
pub struct PreviewStats {
    pub estimated_bytes: u64,
    pub message_count: usize,
    pub estimated_parts: Option<usize>,
}

/// Render `parsed_path`'s thread to one or more Markdown files per `policy`.
///
/// `out_path` is honored verbatim as the output file only when the policy
/// has no split configured; split mode always derives `thread-<cid>*.md`
/// names inside `out_path`'s parent directory (or `parsed_path`'s directory
/// when `out_path` is absent), matching the CLI's `export`/`chain` behavior.
pub fn export_thread_md(
    parsed_path: &Path,
    out_path: Option<&Path>,
    policy: &ExportPolicy,
) -> Result<RenderOutcome, PipelineError> {
    let (meta, messages) = read_parsed_jsonl(parsed_path)?;
    let (tz, tz_ok) = resolve_timezone(&policy.timezone);
    if !tz_ok {
        tracing::warn!(tz = %policy.timezone, "unknown timezone, falling back to UTC");
    }

    let mut models: BTreeSet<String> = BTreeSet::new();
    let mut ts_min = i64::MAX;
    let mut ts_max = i64::MIN;
    for m in &messages {
        if let Some(model) = &m.model {
            models.insert(model.clone());
        }
        ts_min = ts_min.min(m.ts);
        ts_max = ts_max.max(m.ts);
    }
    if messages.is_empty() {
        ts_min = 0;
        ts_max = 0;
    }

    let body_blocks: Vec<String> = messages
        .iter()
        .map(|m| render_message_block(m, tz, policy.formatting))
        .collect();
    let total_bytes: u64 = body_blocks.iter().map(|b| b.len() as u64).sum();

    let cfg = resolve_split(policy)?;

    if cfg.preview {
        let estimated_parts = cfg.size_limit.map(|limit| {
            let limit = limit.max(1);
            (total_bytes.div_ceil(limit)).max(1) as usize
        });
        tracing::info!(
            estimated_bytes = total_bytes,
            messages = messages.len(),
            estimated_parts = estimated_parts,
            "preview: no files written"
        );
        return Ok(RenderOutcome {
            paths: Vec::new(),
            preview: Some(PreviewStats {
                estimated_bytes: total_bytes,
                message_count: messages.len(),
                estimated_parts,
            }),
        });
    }

    let conv_id = meta.conversation_id.clone();
    let provider = meta.provider_id.clone();
    let generated_at_utc = chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

    let (out_dir, explicit_single_path) = resolve_out_target(parsed_path, out_path);
    ensure_dir(&out_dir).map_err(|source| WriteError::TempCreate {
        dir: out_dir.clone(),
        source,
    })?;

    let part_groups = split_into_parts(&body_blocks, &cfg, &conv_id, &provider, &models, ts_min, ts_max, &generated_at_utc, &policy.timezone);
    let part_total = part_groups.len();
    let single_file_mode = matches!(policy.split, SplitSpec::None);

    let mut paths = Vec::with_capacity(part_total);
    for (i, group) in part_groups.iter().enumerate() {
        let part_index = i + 1;
        let part_info = if part_total == 1 {
            None
        } else {
            Some((part_index, part_total))
        };
        let fm = front_matter(
            &conv_id,
            &provider,
            &models,
            group.len(),
            ts_min,
            ts_max,
            part_info,
            &generated_at_utc,
            &policy.timezone,
        );
        let mut page = fm;
        for &bi in group {
            page.push_str(&body_blocks[bi]);
        }

        let file_path = if single_file_mode && part_total == 1 {
            explicit_single_path
                .clone()
                .unwrap_or_else(|| out_dir.join(sanitize_filename(&format!("thread-{conv_id}.md"), MAX_FILENAME_LEN)))
        } else {
            let name = if part_total == 1 {
                format!("thread-{conv_id}.md")
            } else {
                format!("thread-{conv_id}__part{part_index:02}.md")
            };
            out_dir.join(sanitize_filename(&name, MAX_FILENAME_LEN))
        };

        atomic_write(&file_path, page.as_bytes())?;
        tracing::info!(
            path = %file_path.display(),
            messages = group.len(),
            bytes = page.len(),
            "wrote markdown part"
        );
        paths.push(file_path);
    }

    Ok(RenderOutcome {
        paths,
        preview: None,
    })
}

fn resolve_out_target(parsed_path: &Path, out_path: Option<&Path>) -> (PathBuf, Option<PathBuf>) {
    match out_path {
        Some(p) => {
            let dir = p
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            (dir, Some(p.to_path_buf()))
        }
        None => {
            let dir = parsed_path
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            (dir, None)
        }
    }
}

/// Read a `parsed.jsonl` thread file back into its meta record plus
/// chronologically-sorted messages. Malformed lines are skipped, matching
/// the original exporter's tolerant read loop; a missing `thread` record is
/// the one fatal condition.
fn read_parsed_jsonl(path: &Path) -> Result<(ThreadMeta, Vec<NormalizedMessage>), PipelineError> {
    let text = read_to_string_lossy_bom(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut meta: Option<ThreadMeta> = None;
    let mut messages = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: serde_json::Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(_) => continue,
        };
        match value.get("record_type").and_then(serde_json::Value::as_str) {
            Some("thread") => {
                if meta.is_none() {
                    if let Ok(m) = serde_json::from_value::<ThreadMeta>(value) {
                        meta = Some(m);
                    }
                }
            }
            Some("message") => {
                if let Ok(rec) = serde_json::from_value::<ThreadMessageRecord>(value) {
                    messages.push(rec.message);
                }
            }
            _ => continue,
        }
    }

    let meta = meta.ok_or_else(|| InputError::MissingThreadMeta(path.to_path_buf()))?;
    messages.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    Ok((meta, messages))
}

/// Render one message into its Markdown block: heading, optional metadata
/// lines, then body text. `text` is authoritative; `content.parts` is only a
/// fallback for legacy data where it is absent.
fn render_message_block(msg: &NormalizedMessage, tz: chrono_tz::Tz, formatting: Formatting) -> String {
    let role = sanitize_text(&msg.role);
    let ts_human = format_local(msg.ts, tz);

    let mut meta_lines = Vec::new();
    if !msg.message_id.is_empty() {
        meta_lines.push(format!("- message_id: {}", msg.message_id));
    }
    if let Some(parent_id) = &msg.parent_id {
        meta_lines.push(format!("- parent_id: {parent_id}"));
    }
    let meta = if meta_lines.is_empty() {
        String::new()
    } else {
        format!("{}\n\n", meta_lines.join("\n"))
    };

    let raw_text = if !msg.text.is_empty() {
        msg.text.clone()
    } else {
        msg.content.parts.join("\n")
    };
    let text = match formatting {
        Formatting::None => raw_text,
        Formatting::Light => light_format(&raw_text),
    };

    format!("## [{role}] {ts_human}\n{meta}{text}\n\n")
}

/// Light formatting pass (§4.7): collapse blank-line runs to one outside
/// fenced code, leave fenced regions untouched, auto-close an unclosed
/// trailing fence, trim trailing blank lines.
pub fn light_format(raw: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut blanks: Vec<String> = Vec::new();
    let mut in_code = false;
    let mut blank_pending = false;

    for line in raw.lines() {
        if line.trim_start().starts_with("```") {
            in_code = !in_code;
            out.push(line);
            blank_pending = false;
            continue;
        }
        if !in_code && line.trim().is_empty() {
            if !blank_pending {
                blanks.push(String::new());
                out.push(blanks.last().unwrap());
            }
            blank_pending = true;
        } else {
            out.push(line);
            blank_pending = false;
        }
    }

    if in_code {
        out.push("```");
    }
    while out.last().map(|l| l.is_empty()).unwrap_or(false) {
        out.pop();
    }
    out.join("\n")
}

struct SplitConfig {
    size_limit: Option<u64>,
    count_limit: Option<usize>,
    hard: bool,
    soft_overflow: f64,
    tiny_tail_threshold: usize,
    preview: bool,
}

fn resolve_split(policy: &ExportPolicy) -> Result<SplitConfig, ConfigError> {
    let (size_limit, count_limit) = match &policy.split {
        SplitSpec::None => (None, None),
        SplitSpec::Size(n) => (Some(*n), None),
        SplitSpec::Count(n) => (None, Some(*n)),
        SplitSpec::Auto => {
            let _ = parse_size_expr("4MiB")?; // validate the constant parses; value below is authoritative
            (Some(AUTO_SIZE_BYTES), Some(AUTO_COUNT))
        }
    };
    Ok(SplitConfig {
        size_limit,
        count_limit,
        hard: policy.split_hard,
        soft_overflow: policy.soft_overflow,
        tiny_tail_threshold: policy.tiny_tail_threshold,
        preview: policy.preview,
    })
}

/// The cut algorithm from §4.7: walk blocks in order, flushing the buffer
/// into a new part whenever a budget is crossed and neither soft-overflow
/// nor tiny-tail escapes it. Returns groups of block indices into
/// `body_blocks`; an empty result never happens — a thread with zero
/// messages still yields one (empty) part.
#[allow(clippy::too_many_arguments)]
fn split_into_parts(
    body_blocks: &[String],
    cfg: &SplitConfig,
    conv_id: &str,
    provider: &str,
    models: &BTreeSet<String>,
    ts_min: i64,
    ts_max: i64,
    generated_at_utc: &str,
    tz_id: &str,
) -> Vec<Vec<usize>> {
    let mut parts: Vec<Vec<usize>> = Vec::new();
    let mut buf: Vec<usize> = Vec::new();
    let mut buf_bytes_body: u64 = 0;

    for (i, block) in body_blocks.iter().enumerate() {
        let bsz = block.len() as u64;

        let over_size = match cfg.size_limit {
            None => false,
            Some(limit) => {
                if cfg.hard {
                    let fm = front_matter(
                        conv_id,
                        provider,
                        models,
                        buf.len() + 1,
                        ts_min,
                        ts_max,
                        Some((parts.len() + 1, 0)),
                        generated_at_utc,
                        tz_id,
                    );
                    (fm.len() as u64 + buf_bytes_body + bsz) > limit
                } else {
                    (buf_bytes_body + bsz + FRONT_MATTER_OVERHEAD_BYTES) > limit
                }
            }
        };
        let over_count = !over_size
            && cfg
                .count_limit
                .map(|c| buf.len() >= c)
                .unwrap_or(false);

        if over_size || over_count {
            let within_soft = !over_count
                && cfg
                    .size_limit
                    .map(|limit| {
                        (buf_bytes_body + bsz + FRONT_MATTER_OVERHEAD_BYTES) as f64
                            <= (limit as f64) * (1.0 + cfg.soft_overflow)
                    })
                    .unwrap_or(false);
            let remaining_after = body_blocks.len() - (i + 1);
            let tiny_tail = remaining_after <= cfg.tiny_tail_threshold;

            if !cfg.hard && (within_soft || tiny_tail) {
                buf.push(i);
                buf_bytes_body += bsz;
                continue;
            }
            flush(&mut parts, &mut buf, &mut buf_bytes_body);
        }

        buf.push(i);
        buf_bytes_body += bsz;
    }
    flush(&mut parts, &mut buf, &mut buf_bytes_body);

    if parts.is_empty() {
        parts.push((0..body_blocks.len()).collect());
    }
    parts
}

fn flush(parts: &mut Vec<Vec<usize>>, buf: &mut Vec<usize>, buf_bytes_body: &mut u64) {
    if !buf.is_empty() {
        parts.push(std::mem::take(buf));
        *buf_bytes_body = 0;
    }
}

#[allow(clippy::too_many_arguments)]
fn front_matter(
    conv_id: &str,
    provider: &str,
    models: &BTreeSet<String>,
    message_count: usize,
    ts_min: i64,
    ts_max: i64,
    part: Option<(usize, usize)>,
    generated_at_utc: &str,
    tz_id: &str,
) -> String {
    let models_list = models
        .iter()
        .map(|m| format!("\"{m}\""))
        .collect::<Vec<_>>()
        .join(", ");

    let mut lines = vec![
        "---".to_string(),
        format!("thread: {conv_id}"),
        format!("provider: {provider}"),
        format!("models: [{models_list}]"),
        format!("message_count: {message_count}"),
        format!("range: {} .. {}", iso_utc(ts_min), iso_utc(ts_max)),
    ];
    if let Some((index, total)) = part {
        lines.push(format!("part_index: {index}"));
        lines.push(format!("part_total: {total}"));
    }
    lines.push(format!("generated_at_utc: {generated_at_utc}"));
    lines.push(format!("tz: {tz_id}"));
    lines.push("---".to_string());
    lines.push(String::new());
    lines.join("\n") + "\n"
}

fn iso_utc(ts_ms: i64) -> String {
    use chrono::TimeZone;
    match chrono::Utc.timestamp_millis_opt(ts_ms).single() {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
        None => String::new(),
    }
}

/// Filename sanitization (§4.7): disallowed characters and control bytes
/// become `_`, whitespace runs collapse, names over `max_len` are truncated
/// while preserving the extension with a `...` ellipsis.
pub fn sanitize_filename(name: &str, max_len: usize) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if "<>:\"/\\|?*".contains(c) || (c as u32) < 0x20 {
                '_'
            } else {
                c
            }
        })
        .collect();

    let mut collapsed = String::with_capacity(replaced.len());
    let mut last_was_space = false;
    for c in replaced.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                collapsed.push(' ');
            }
            last_was_space = true;
        } else {
            collapsed.push(c);
            last_was_space = false;
        }
    }
    let collapsed = collapsed.trim().to_string();

    if collapsed.chars().count() <= max_len {
        return collapsed;
    }

    let (root, ext) = match collapsed.rfind('.') {
        Some(idx) if idx > 0 => (&collapsed[..idx], &collapsed[idx..]),
        _ => (collapsed.as_str(), ""),
    };
    let budget = max_len.saturating_sub(ext.chars().count() + 3);
    let truncated_root: String = root.chars().take(budget).collect();
    format!("{truncated_root}...{ext}")
}
