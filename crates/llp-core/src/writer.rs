//! Thread Writer (C6).
//!
//! Writes one conversation's normalized messages to
//! `<outdir>/<provider>/thread-<conversation_id>/parsed.jsonl`, atomically.
//! The skip decision (§4.5) lives in [`crate::manifest`]/[`crate::pipeline`];
//! this module only knows how to lay a thread out on disk once the caller
//! has decided to write it.

use std::path::{Path, PathBuf};

use crate::error::WriteError;
use crate::fs::atomic_write;
use crate::group::Thread;
use crate::json_fmt::to_vec_compact_ascii;
use crate::types::{ThreadMessageRecord, ThreadMeta, ThreadRecordType};

/// Directory name for one thread's output, relative to `<outdir>/<provider>/`.
pub fn thread_dir_name(conversation_id: &str) -> String {
    format!("thread-{conversation_id}")
}

/// Write `thread` under `provider_dir` (`<outdir>/<provider>/`), returning the
/// path to the `parsed.jsonl` it wrote. First line is the thread meta record;
/// the rest are message records, one compact ASCII-escaped JSON object per
/// line.
pub fn write_thread(
    provider_dir: &Path,
    provider_id: &str,
    thread: &Thread,
) -> Result<PathBuf, WriteError> {
    let dir = provider_dir.join(thread_dir_name(&thread.conversation_id));
    let path = dir.join("parsed.jsonl");

    let meta = ThreadMeta {
        record_type: ThreadRecordType::Thread,
        provider_id: provider_id.to_string(),
        conversation_id: thread.conversation_id.clone(),
        message_count: thread.messages.len(),
    };

    let mut buf = to_vec_compact_ascii(&meta).map_err(|source| WriteError::Serialize {
        path: path.clone(),
        source,
    })?;
    buf.push(b'\n');

    for message in &thread.messages {
        let record = ThreadMessageRecord {
            record_type: ThreadRecordType::Message,
            provider_id: provider_id.to_string(),
            message: message.clone(),
        };
        let line = to_vec_compact_ascii(&record).map_err(|source| WriteError::Serialize {
            path: path.clone(),
            source,
        })?;
        buf.extend_from_slice(&line);
        buf.push(b'\n');
    }

    atomic_write(&path, &buf)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MessageContent, NormalizedMessage};

    fn msg(id: &str, ts: i64) -> NormalizedMessage {
        NormalizedMessage {
            conversation_id: "conv-1".to_string(),
            message_id: id.to_string(),
            parent_id: None,
            role: "user".to_string(),
            ts,
            content: MessageContent {
                content_type: "text".to_string(),
                parts: vec!["hi".to_string()],
            },
            text: "hi".to_string(),
            model: None,
        }
    }

    #[test]
    fn writes_thread_meta_line_first() {
        let dir = tempfile::tempdir().unwrap();
        let thread = Thread {
            conversation_id: "conv-1".to_string(),
            messages: vec![msg("m1", 1), msg("m2", 2)],
        };
        let path = write_thread(dir.path(), "openai_chatgpt", &thread).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        let first: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(first["record_type"], "thread");
        assert_eq!(first["message_count"], 2);
        assert_eq!(lines.count(), 2);
    }

    #[test]
    fn lands_in_provider_thread_directory() {
        let dir = tempfile::tempdir().unwrap();
        let thread = Thread {
            conversation_id: "abc".to_string(),
            messages: vec![msg("m1", 1)],
        };
        let path = write_thread(dir.path(), "openai_chatgpt", &thread).unwrap();
        assert_eq!(
            path,
            dir.path().join("thread-abc").join("parsed.jsonl")
        );
    }

    #[test]
    fn message_lines_are_ascii_escaped_and_compact() {
        let dir = tempfile::tempdir().unwrap();
        let thread = Thread {
            conversation_id: "conv-1".to_string(),
            messages: vec![msg("m1", 1)],
        };
        let path = write_thread(dir.path(), "openai_chatgpt", &thread).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.is_ascii());
        let second_line = text.lines().nth(1).unwrap();
        assert!(!second_line.starts_with(' '));
        assert!(!second_line.contains('\n'));
    }

    #[test]
    fn rewriting_same_thread_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let thread = Thread {
            conversation_id: "conv-1".to_string(),
            messages: vec![msg("m1", 1)],
        };
        let first = write_thread(dir.path(), "openai_chatgpt", &thread).unwrap();
        let bytes_a = std::fs::read(&first).unwrap();
        let second = write_thread(dir.path(), "openai_chatgpt", &thread).unwrap();
        let bytes_b = std::fs::read(&second).unwrap();
        assert_eq!(bytes_a, bytes_b);
    }
}
