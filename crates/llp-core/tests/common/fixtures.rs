//! ChatGPT export fixtures used across harnesses.
//!
//! Each builder returns a `serde_json::Value` shaped like one element of a
//! `conversations.json` array (a `mapping` keyed tree, per §4.2). Ids and
//! timestamps are chosen to match the literal scenarios in spec §8 so the
//! harnesses can assert against the exact expected numbers from that section.

use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// Scenario 1/2 — a two-message linear thread: `root -> m1 -> m2`.
///
/// `m1` has `create_time = 1730000001.0`, `m2` has `create_time = 1730000002.5`.
/// Pass `m2_has_create_time = false` to reproduce scenario 2 (the dropped
/// node).
pub fn linear_two_message_thread(conversation_id: &str, m2_has_create_time: bool) -> Value {
    let mut m2_message = json!({
        "id": "m2",
        "author": {"role": "assistant"},
        "content": {"content_type": "text", "parts": ["hi"]}
    });
    if m2_has_create_time {
        m2_message["create_time"] = json!(1730000002.5);
    }

    json!({
        "conversation_id": conversation_id,
        "mapping": {
            "root": {"id": "root", "parent": null, "children": ["m1"], "message": null},
            "m1": {
                "id": "m1",
                "parent": "root",
                "children": ["m2"],
                "message": {
                    "id": "m1",
                    "author": {"role": "user"},
                    "create_time": 1730000001.0,
                    "content": {"content_type": "text", "parts": ["hello", "world"]}
                }
            },
            "m2": {
                "id": "m2",
                "parent": "m1",
                "children": [],
                "message": m2_message
            }
        }
    })
}

/// Scenario 3 — a root with two children carrying `create_time` 10.0 and
/// 5.0 respectively; BFS sibling order must follow the earlier timestamp.
pub fn sibling_branches(conversation_id: &str) -> Value {
    json!({
        "conversation_id": conversation_id,
        "mapping": {
            "root": {"id": "root", "parent": null, "children": ["later", "earlier"], "message": null},
            "later": {
                "id": "later",
                "parent": "root",
                "children": [],
                "message": {
                    "id": "later",
                    "author": {"role": "user"},
                    "create_time": 10.0,
                    "content": {"content_type": "text", "parts": ["ten"]}
                }
            },
            "earlier": {
                "id": "earlier",
                "parent": "root",
                "children": [],
                "message": {
                    "id": "earlier",
                    "author": {"role": "user"},
                    "create_time": 5.0,
                    "content": {"content_type": "text", "parts": ["five"]}
                }
            }
        }
    })
}

/// A linear thread of `n` messages, each carrying `body` as its sole text
/// part, for splitter-bound scenarios (4, 5) that care about block count
/// and/or size rather than conversational shape.
pub fn linear_thread_of(conversation_id: &str, n: usize, body: &str) -> Value {
    let mut mapping = serde_json::Map::new();
    mapping.insert(
        "root".to_string(),
        json!({"id": "root", "parent": null, "children": if n > 0 { json!(["m0"]) } else { json!([]) }, "message": null}),
    );
    for i in 0..n {
        let id = format!("m{i}");
        let next = if i + 1 < n {
            json!([format!("m{}", i + 1)])
        } else {
            json!([])
        };
        let parent = if i == 0 {
            "root".to_string()
        } else {
            format!("m{}", i - 1)
        };
        mapping.insert(
            id.clone(),
            json!({
                "id": id,
                "parent": parent,
                "children": next,
                "message": {
                    "id": id,
                    "author": {"role": if i % 2 == 0 { "user" } else { "assistant" }},
                    "create_time": 1_700_000_000.0 + i as f64,
                    "content": {"content_type": "text", "parts": [body]}
                }
            }),
        );
    }
    json!({"conversation_id": conversation_id, "mapping": Value::Object(mapping)})
}

/// Write a top-level JSON array of conversations to `<dir>/conversations.json`
/// and return its path, matching the `parse` subcommand's expected input
/// shape (§4.1).
pub fn write_conversations(dir: &Path, conversations: Vec<Value>) -> PathBuf {
    let path = dir.join("conversations.json");
    std::fs::write(&path, Value::Array(conversations).to_string()).unwrap();
    path
}
