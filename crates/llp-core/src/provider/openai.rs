//! ChatGPT (`conversations.json`) adapter.
//!
//! A ChatGPT export conversation is a tree: a `mapping` object keyed by node
//! id, each node holding an optional `message` and a `parent`/`children`
//! link. Linearizing it means walking that tree in chronological order even
//! though the JSON itself carries no ordering guarantee beyond object key
//! insertion order.
//!
//! The walk is a breadth-first traversal where, at each node, children are
//! visited in `(has_timestamp, timestamp, node_id)` order — untimed children
//! first, then by `create_time` ascending, ties broken by id. Branches that
//! the BFS can't reach (dangling parent references, cycles introduced by a
//! malformed export) are appended afterward in `mapping`'s own key order, so
//! no message is ever silently dropped for being unreachable. A final
//! re-sort over the full set by the same `(has_timestamp, ts, message_id)`
//! key produces the order actually written to disk.

use std::collections::{HashSet, VecDeque};

use serde::Deserialize;
use serde_json::Value;

use crate::error::AdapterError;
use crate::types::{MessageContent, NormalizedMessage, RawRecord};

#[derive(Debug, Deserialize)]
struct MappingNode {
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    children: Vec<String>,
    #[serde(default)]
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    author: Option<Author>,
    #[serde(default)]
    create_time: Option<f64>,
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    metadata: Option<Metadata>,
}

#[derive(Debug, Deserialize)]
struct Author {
    #[serde(default)]
    role: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    parts: Option<Vec<Value>>,
}

#[derive(Debug, Default, Deserialize)]
struct Metadata {
    #[serde(default)]
    model_slug: Option<String>,
    #[serde(default)]
    is_visually_hidden_from_conversation: Option<bool>,
}

/// Linearize a ChatGPT conversation record into its messages in
/// chronological-ish tree order. `source_stem` is the source file's stem,
/// used only as a conversation-id fallback (§4.2 "Conversation id
/// resolution") when the record itself carries none.
pub fn linearize(
    record: &RawRecord,
    source_stem: Option<&str>,
) -> Result<Vec<NormalizedMessage>, AdapterError> {
    let value = record.as_value();
    let mapping_value = value
        .get("mapping")
        .and_then(Value::as_object)
        .ok_or(AdapterError::NotConversationShaped)?;

    let conversation_id = resolve_conversation_id(value, source_stem);

    let mut nodes = indexmap_order(mapping_value);
    let children_map = build_children_map(mapping_value);
    let traversal = bfs_order(mapping_value, &children_map, &mut nodes);

    let mut messages = Vec::with_capacity(traversal.len());
    for node_id in &traversal {
        let Some(node) = mapping_value.get(node_id).cloned() else {
            continue;
        };
        let Ok(node) = serde_json::from_value::<MappingNode>(node) else {
            continue;
        };
        let Some(message) = node.message else {
            continue;
        };
        let Some(create_time) = message.create_time else {
            // No timestamp, no place in a chronologically ordered archive.
            continue;
        };
        let role = message
            .author
            .as_ref()
            .and_then(|a| a.role.clone())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| "unknown".to_string());
        let metadata = message.metadata.unwrap_or_default();
        if metadata.is_visually_hidden_from_conversation == Some(true) {
            continue;
        }

        let content = message.content.unwrap_or(Content {
            content_type: None,
            parts: None,
        });
        let parts = extract_text_parts(content.parts.unwrap_or_default());
        let content_type = content.content_type.unwrap_or_else(|| "text".to_string());
        let text = parts.join("\n");
        // Truncate toward zero, matching the original exporter's `int(create_time * 1000)`.
        let ts = (create_time * 1000.0) as i64;

        messages.push(NormalizedMessage {
            conversation_id: conversation_id.clone(),
            message_id: message.id.unwrap_or_else(|| node_id.clone()),
            parent_id: node.parent.filter(|p| mapping_value.contains_key(p)),
            role,
            ts,
            content: MessageContent { content_type, parts },
            text,
            model: metadata.model_slug,
        });
    }

    messages.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    Ok(messages)
}

/// Only string content parts are kept as display text; ChatGPT exports
/// embed other shapes (image asset pointers, tool call payloads) in the
/// same `parts` array that this pipeline does not attempt to render.
fn extract_text_parts(parts: Vec<Value>) -> Vec<String> {
    parts
        .into_iter()
        .filter_map(|p| match p {
            Value::String(s) => Some(s),
            _ => None,
        })
        .collect()
}

/// `mapping`'s own key order, used only as the fallback-pass order for nodes
/// the BFS never reaches.
fn indexmap_order(mapping: &serde_json::Map<String, Value>) -> Vec<String> {
    mapping.keys().cloned().collect()
}

/// Conversation id resolution (§4.2): first non-empty of `conversation_id`,
/// `id`, `uuid`; else the source filename's stem; else a 12-hex-digit hash
/// of `title|create_time`; else the literal `"unknown"`. Infallible — this
/// chain always terminates in a usable id, so the adapter never needs an
/// error variant for it.
fn resolve_conversation_id(value: &Value, source_stem: Option<&str>) -> String {
    for key in ["conversation_id", "id", "uuid"] {
        if let Some(s) = value.get(key).and_then(Value::as_str) {
            if !s.is_empty() {
                return s.to_string();
            }
        }
    }
    if let Some(stem) = source_stem {
        if !stem.is_empty() {
            return stem.to_string();
        }
    }
    let title = value.get("title").and_then(Value::as_str).unwrap_or("");
    let create_time = value.get("create_time").and_then(Value::as_f64);
    if !title.is_empty() || create_time.is_some() {
        let ct = create_time.map(|t| t.to_string()).unwrap_or_default();
        return short_hash(&format!("{title}|{ct}"));
    }
    "unknown".to_string()
}

/// A small deterministic FNV-1a hash, truncated to 12 hex digits. Not
/// cryptographic — only needs to be stable across runs on the same input,
/// which a pure byte-wise fold guarantees regardless of platform or build.
fn short_hash(input: &str) -> String {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in input.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    format!("{:012x}", hash & 0xffff_ffff_ffff)
}

/// Build the node→children adjacency used for the BFS walk (§4.2 "Graph
/// construction", point 2): prefer each node's own explicit `children` list;
/// if not a single node in the mapping declares one, reconstruct the whole
/// map from `parent` back-pointers instead.
fn build_children_map(
    mapping: &serde_json::Map<String, Value>,
) -> std::collections::HashMap<String, Vec<String>> {
    let any_explicit_children = mapping.values().any(|v| {
        v.get("children")
            .and_then(Value::as_array)
            .map(|arr| !arr.is_empty())
            .unwrap_or(false)
    });

    let mut children_map: std::collections::HashMap<String, Vec<String>> = std::collections::HashMap::new();
    if any_explicit_children {
        for (id, node) in mapping {
            let children: Vec<String> = node
                .get("children")
                .and_then(Value::as_array)
                .map(|arr| {
                    arr.iter()
                        .filter_map(Value::as_str)
                        .filter(|c| mapping.contains_key(*c))
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            children_map.insert(id.clone(), children);
        }
    } else {
        for (id, node) in mapping {
            if let Some(parent) = node.get("parent").and_then(Value::as_str) {
                if mapping.contains_key(parent) {
                    children_map.entry(parent.to_string()).or_default().push(id.clone());
                }
            }
        }
    }
    children_map
}

fn bfs_order(
    mapping: &serde_json::Map<String, Value>,
    children_map: &std::collections::HashMap<String, Vec<String>>,
    insertion_order: &mut Vec<String>,
) -> Vec<String> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut order = Vec::with_capacity(mapping.len());

    let mut roots: Vec<String> = mapping
        .iter()
        .filter(|(_, v)| {
            v.get("parent")
                .map(|p| p.is_null())
                .unwrap_or(true)
        })
        .map(|(k, _)| k.clone())
        .collect();
    roots.sort_by_key(|id| sort_key_for(mapping, id));

    let mut queue: VecDeque<String> = roots.into_iter().collect();
    while let Some(id) = queue.pop_front() {
        if !visited.insert(id.clone()) {
            continue;
        }
        order.push(id.clone());

        let mut children: Vec<String> = children_map.get(&id).cloned().unwrap_or_default();
        children.sort_by_key(|id| sort_key_for(mapping, id));
        for child in children {
            if !visited.contains(&child) {
                queue.push_back(child);
            }
        }
    }

    // Fallback pass: anything unreachable from a root (dangling parent
    // pointer, reference cycle) still gets emitted, in source key order.
    insertion_order.retain(|id| !visited.contains(id));
    for id in insertion_order.drain(..) {
        if visited.insert(id.clone()) {
            order.push(id);
        }
    }

    order
}

fn sort_key_for(mapping: &serde_json::Map<String, Value>, id: &str) -> (bool, i64, String) {
    let ts = mapping
        .get(id)
        .and_then(|n| n.get("message"))
        .and_then(|m| m.get("create_time"))
        .and_then(Value::as_f64);
    match ts {
        Some(t) => (true, (t * 1000.0).round() as i64, id.to_string()),
        None => (false, 0, id.to_string()),
    }
}
