//! Shape checks for the two byte-stable artifacts the manifest/writer
//! invariants in spec §8 are about: `manifest.json` and a thread's
//! `parsed.jsonl`. Asserted field-by-field rather than via a snapshot file,
//! so the checks are self-contained and need no committed baseline.

mod common;
use common::*;

use llp_core::pipeline::{provider_dir, run_parse, CancelToken};
use llp_core::provider::ProviderId;
use llp_core::types::ParseRequest;

fn sorted_keys(value: &serde_json::Value) -> Vec<&str> {
    let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
    keys.sort_unstable();
    keys
}

#[tokio::test]
async fn manifest_json_shape_is_stable() {
    let indir = tempfile::tempdir().unwrap();
    let outdir = tempfile::tempdir().unwrap();
    let input = write_conversations(
        indir.path(),
        vec![linear_two_message_thread("conv-snap", true)],
    );

    let req = ParseRequest {
        provider: ProviderId::OpenaiChatgpt,
        input_path: input,
        outdir: outdir.path().to_path_buf(),
        dry_run: false,
        fail_fast: false,
        jobs: 1,
    };
    let cancel = CancelToken::new();
    run_parse(&req, &cancel).await.unwrap();

    let manifest_path = provider_dir(&req).join("manifest.json");
    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&manifest_path).unwrap()).unwrap();

    assert_eq!(manifest["schema_version"], 1);
    assert_eq!(manifest["provider"], "openai_chatgpt");
    assert_eq!(manifest["policy"], "default");
    assert!(manifest["exported_at"].is_string());
    assert_eq!(manifest["index"]["threads"].as_array().unwrap().len(), 1);
    assert_eq!(
        sorted_keys(&manifest),
        vec!["exported_at", "index", "policy", "provider", "schema_version"]
    );

    let entry = &manifest["index"]["threads"][0];
    assert_eq!(entry["conversation_id"], "conv-snap");
    assert_eq!(entry["path"], "thread-conv-snap/parsed.jsonl");
    assert_eq!(entry["count"], 2);
    assert_eq!(entry["ts_min"], 1730000001000i64);
    assert_eq!(entry["ts_max"], 1730000002500i64);
    assert_eq!(
        sorted_keys(entry),
        vec!["conversation_id", "count", "path", "ts_max", "ts_min"]
    );
}

#[tokio::test]
async fn parsed_jsonl_meta_and_message_shape_is_stable() {
    let indir = tempfile::tempdir().unwrap();
    let outdir = tempfile::tempdir().unwrap();
    let input = write_conversations(
        indir.path(),
        vec![linear_two_message_thread("conv-snap-lines", true)],
    );

    let req = ParseRequest {
        provider: ProviderId::OpenaiChatgpt,
        input_path: input,
        outdir: outdir.path().to_path_buf(),
        dry_run: false,
        fail_fast: false,
        jobs: 1,
    };
    let cancel = CancelToken::new();
    run_parse(&req, &cancel).await.unwrap();

    let parsed_path = provider_dir(&req)
        .join("thread-conv-snap-lines")
        .join("parsed.jsonl");
    let text = std::fs::read_to_string(&parsed_path).unwrap();
    let lines: Vec<serde_json::Value> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);

    let meta = &lines[0];
    assert_eq!(meta["record_type"], "thread");
    assert_eq!(meta["provider_id"], "openai_chatgpt");
    assert_eq!(meta["conversation_id"], "conv-snap-lines");
    assert_eq!(meta["message_count"], 2);
    assert_eq!(
        sorted_keys(meta),
        vec!["conversation_id", "message_count", "provider_id", "record_type"]
    );

    let m1 = &lines[1];
    assert_eq!(m1["record_type"], "message");
    assert_eq!(m1["message_id"], "m1");
    assert_eq!(m1["parent_id"], "root");
    assert_eq!(m1["role"], "user");
    assert_eq!(m1["ts"], 1730000001000i64);
    assert_eq!(m1["text"], "hello\nworld");
    assert_eq!(m1["content"]["content_type"], "text");
    assert_eq!(m1["content"]["parts"], serde_json::json!(["hello", "world"]));
    assert_eq!(
        sorted_keys(m1),
        vec![
            "content",
            "conversation_id",
            "message_id",
            "parent_id",
            "provider_id",
            "record_type",
            "role",
            "text",
            "ts",
        ]
    );

    let m2 = &lines[2];
    assert_eq!(m2["message_id"], "m2");
    assert_eq!(m2["parent_id"], "m1");
    assert_eq!(m2["role"], "assistant");
    assert_eq!(m2["ts"], 1730000002500i64);
    assert_eq!(m2["text"], "hi");
}
