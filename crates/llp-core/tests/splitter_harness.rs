//! End-to-end harness for the splitter's literal bound scenarios (spec §8,
//! scenarios 4 and 5), driven through the full `parse` then `export` path
//! rather than calling [`llp_core::render::export_thread_md`] directly —
//! see `render.rs`'s own unit tests for the renderer in isolation.
//!
//! # What this covers
//!
//! - Scenario 4 — four ~1.5 MB blocks under `split=auto` (4 MiB / 1500
//!   messages) in hard mode: the size bound trips before the count bound,
//!   producing exactly 2 parts of 2 blocks each.
//! - Scenario 5 — 1,510 blocks under `count=1500` with
//!   `tiny_tail_threshold=20` in soft mode: the 10-message remainder is
//!   small enough to absorb into a single final part instead of splitting.
//!
//! # What this does NOT cover
//!
//! - Byte-exact front-matter contents — `render.rs`'s unit tests already
//!   pin those down.

mod common;
use common::*;

use llp_core::pipeline::{provider_dir, run_parse, CancelToken};
use llp_core::provider::ProviderId;
use llp_core::types::{ExportPolicy, ExportRequest, ParseRequest, SplitSpec};

fn request(input: std::path::PathBuf, outdir: std::path::PathBuf) -> ParseRequest {
    ParseRequest {
        provider: ProviderId::OpenaiChatgpt,
        input_path: input,
        outdir,
        dry_run: false,
        fail_fast: false,
        jobs: 1,
    }
}

/// Scenario 4: four ~1.5 MB blocks, `split="auto"`, hard mode. Two blocks fit
/// under the 4 MiB size bound but a third does not, so two parts of two
/// blocks come out rather than four singletons.
#[tokio::test]
async fn four_megabyte_blocks_split_by_size_in_hard_mode() {
    let indir = tempfile::tempdir().unwrap();
    let outdir = tempfile::tempdir().unwrap();
    let big_block = "x".repeat(1_500_000);
    let input = write_conversations(
        indir.path(),
        vec![linear_thread_of("conv-4", 4, &big_block)],
    );

    let parse_req = request(input, outdir.path().to_path_buf());
    let cancel = CancelToken::new();
    run_parse(&parse_req, &cancel).await.unwrap();

    let parsed_path = provider_dir(&parse_req)
        .join("thread-conv-4")
        .join("parsed.jsonl");
    let export_req = ExportRequest {
        parsed_path,
        out_path: None,
        policy: ExportPolicy {
            split: SplitSpec::Auto,
            split_hard: true,
            ..ExportPolicy::default()
        },
    };
    let outcome = llp_core::pipeline::run_export(&export_req).unwrap();

    assert_eq!(outcome.paths.len(), 2, "expected exactly 2 parts");
    for path in &outcome.paths {
        let body = std::fs::read_to_string(path).unwrap();
        let message_count = body.matches("## [").count();
        assert_eq!(message_count, 2, "each part should hold 2 blocks");
        assert!(
            body.len() as u64 <= 4 * 1024 * 1024,
            "hard mode must respect the 4 MiB size bound"
        );
    }
}

/// Scenario 5: 1,510 blocks, `count=1500`, `tiny_tail_threshold=20`, soft
/// mode. The 10-message remainder after the 1500th block is within the
/// threshold, so the whole thread stays in a single part.
#[tokio::test]
async fn tiny_tail_keeps_thread_in_a_single_part() {
    let indir = tempfile::tempdir().unwrap();
    let outdir = tempfile::tempdir().unwrap();
    let input = write_conversations(
        indir.path(),
        vec![linear_thread_of("conv-5", 1510, "short body")],
    );

    let parse_req = request(input, outdir.path().to_path_buf());
    let cancel = CancelToken::new();
    let stats = run_parse(&parse_req, &cancel).await.unwrap();
    assert_eq!(stats.messages, 1510);

    let parsed_path = provider_dir(&parse_req)
        .join("thread-conv-5")
        .join("parsed.jsonl");
    let export_req = ExportRequest {
        parsed_path,
        out_path: None,
        policy: ExportPolicy {
            split: SplitSpec::Count(1500),
            split_hard: false,
            tiny_tail_threshold: 20,
            ..ExportPolicy::default()
        },
    };
    let outcome = llp_core::pipeline::run_export(&export_req).unwrap();

    assert_eq!(outcome.paths.len(), 1, "the tiny tail must not force a second part");
    let body = std::fs::read_to_string(&outcome.paths[0]).unwrap();
    assert_eq!(body.matches("## [").count(), 1510);
}
