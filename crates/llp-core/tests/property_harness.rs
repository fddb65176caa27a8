//! Randomized property tests for the two universally-quantified invariants
//! from spec §8 that benefit most from varied inputs rather than a handful
//! of hand-picked cases: total ordering under `(ts, message_id)`, and the
//! size splitter's hard-mode bound.
//!
//! # What this covers
//!
//! - `linearize` always emits messages non-decreasing by `(ts, message_id)`,
//!   no matter what order `create_time` values appear in the source mapping.
//! - The size splitter in `hard` mode never emits a part whose rendered size
//!   exceeds the requested limit, for varied block counts and body lengths.
//!
//! # What this does NOT cover
//!
//! - Soft-mode overflow tolerance and tiny-tail absorption — exercised with
//!   concrete cases in `render.rs`'s own unit tests and `splitter_harness.rs`.

mod common;
use common::*;

use llp_core::provider::openai::linearize;
use llp_core::types::{ExportPolicy, RawRecord, SplitSpec};
use llp_core::writer::write_thread;
use proptest::prelude::*;

proptest! {
    /// However the `create_time` values are shuffled across a linear chain
    /// of nodes, the emitted messages must come out sorted by `(ts,
    /// message_id)` — the final re-sort in `linearize` is what guarantees
    /// this independent of the BFS walk order.
    #[test]
    fn linearize_output_is_sorted_by_ts_then_id(
        create_times in prop::collection::vec(0.0f64..2_000_000_000.0, 2..30)
    ) {
        let n = create_times.len();
        let conversation = linear_thread_with_times("conv-prop", &create_times);
        let record = RawRecord::from(conversation);
        let messages = linearize(&record, None).unwrap();

        prop_assert_eq!(messages.len(), n);
        for window in messages.windows(2) {
            let a = window[0].sort_key();
            let b = window[1].sort_key();
            prop_assert!(a <= b, "messages out of order: {:?} then {:?}", a, b);
        }
    }

    /// In hard mode, every rendered part must stay at or under the byte
    /// limit, regardless of how many blocks there are or how large each is.
    #[test]
    fn hard_mode_size_split_never_exceeds_the_limit(
        block_count in 1usize..12,
        body_len in 100usize..20_000,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let body = "word ".repeat(body_len / 5 + 1);
        let conversation = linear_thread_of("conv-prop-size", block_count, &body);
        let record = RawRecord::from(conversation);
        let messages = linearize(&record, None).unwrap();

        let thread = llp_core::group::Thread {
            conversation_id: "conv-prop-size".to_string(),
            messages,
        };
        let parsed_path = write_thread(dir.path(), "openai_chatgpt", &thread).unwrap();

        // A limit sized to hold roughly two blocks (with generous headroom
        // for heading/meta/front-matter overhead) so a single oversized
        // block can never blow the bound on its own, while threads of three
        // or more blocks still get split.
        let limit = body.len() as u64 * 2 + 2048;
        let policy = ExportPolicy {
            split: SplitSpec::Size(limit),
            split_hard: true,
            ..ExportPolicy::default()
        };
        let outcome = llp_core::render::export_thread_md(&parsed_path, None, &policy).unwrap();

        for path in &outcome.paths {
            let len = std::fs::metadata(path).unwrap().len();
            prop_assert!(len <= limit, "part of {len} bytes exceeded hard limit {limit}");
        }
    }
}

/// A linear chain of `n` nodes, each assigned the corresponding entry of
/// `create_times` (shuffled relative to chain position, unlike
/// [`linear_thread_of`]'s monotonically increasing timestamps).
fn linear_thread_with_times(conversation_id: &str, create_times: &[f64]) -> serde_json::Value {
    use serde_json::json;

    let n = create_times.len();
    let mut mapping = serde_json::Map::new();
    mapping.insert(
        "root".to_string(),
        json!({"id": "root", "parent": null, "children": ["m0"], "message": null}),
    );
    for (i, ts) in create_times.iter().enumerate() {
        let id = format!("m{i}");
        let next = if i + 1 < n {
            json!([format!("m{}", i + 1)])
        } else {
            json!([])
        };
        let parent = if i == 0 { "root".to_string() } else { format!("m{}", i - 1) };
        mapping.insert(
            id.clone(),
            json!({
                "id": id,
                "parent": parent,
                "children": next,
                "message": {
                    "id": id,
                    "author": {"role": if i % 2 == 0 { "user" } else { "assistant" }},
                    "create_time": ts,
                    "content": {"content_type": "text", "parts": [format!("body {i}")]}
                }
            }),
        );
    }
    json!({"conversation_id": conversation_id, "mapping": serde_json::Value::Object(mapping)})
}
