//! Grouper (C4): collects normalized messages into per-conversation threads.
//!
//! The adapter already emits messages in chronological order per
//! conversation, so grouping here is a stable partition by
//! `conversation_id`, not a re-sort — thread order is the order in which
//! each conversation's first message was produced by C1/C2.

use std::collections::HashMap;

use crate::types::NormalizedMessage;

/// One conversation's messages, in writer-ready order.
#[derive(Debug, Clone)]
pub struct Thread {
    pub conversation_id: String,
    pub messages: Vec<NormalizedMessage>,
}

impl Thread {
    pub fn ts_min(&self) -> i64 {
        self.messages.iter().map(|m| m.ts).min().unwrap_or(0)
    }

    pub fn ts_max(&self) -> i64 {
        self.messages.iter().map(|m| m.ts).max().unwrap_or(0)
    }
}

/// Partition a flat stream of messages (possibly drawn from many input
/// records) into one [`Thread`] per `conversation_id`, preserving the
/// relative order in which conversations were first seen, then stable-sorting
/// each group by `(ts, message_id)` (§4.4) — a no-op when every message for a
/// conversation already came from one adapter call in sorted order, but
/// required when the same `conversation_id` is split across input records.
pub fn group_by_conversation(messages: Vec<NormalizedMessage>) -> Vec<Thread> {
    let mut order: Vec<String> = Vec::new();
    let mut by_id: HashMap<String, Vec<NormalizedMessage>> = HashMap::new();

    for msg in messages {
        by_id
            .entry(msg.conversation_id.clone())
            .or_insert_with(|| {
                order.push(msg.conversation_id.clone());
                Vec::new()
            })
            .push(msg);
    }

    order
        .into_iter()
        .map(|conversation_id| {
            let mut messages = by_id.remove(&conversation_id).unwrap_or_default();
            messages.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
            Thread {
                conversation_id,
                messages,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageContent;

    fn msg(conv: &str, id: &str, ts: i64) -> NormalizedMessage {
        NormalizedMessage {
            conversation_id: conv.to_string(),
            message_id: id.to_string(),
            parent_id: None,
            role: "user".to_string(),
            ts,
            content: MessageContent {
                content_type: "text".to_string(),
                parts: vec!["x".to_string()],
            },
            text: "x".to_string(),
            model: None,
        }
    }

    #[test]
    fn groups_messages_by_conversation_preserving_first_seen_order() {
        let messages = vec![
            msg("b", "b1", 1),
            msg("a", "a1", 2),
            msg("b", "b2", 3),
            msg("a", "a2", 4),
        ];
        let threads = group_by_conversation(messages);
        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].conversation_id, "b");
        assert_eq!(threads[0].messages.len(), 2);
        assert_eq!(threads[1].conversation_id, "a");
        assert_eq!(threads[1].messages.len(), 2);
    }

    #[test]
    fn preserves_message_order_within_a_thread() {
        let messages = vec![msg("a", "a1", 10), msg("a", "a2", 20)];
        let threads = group_by_conversation(messages);
        assert_eq!(threads[0].messages[0].message_id, "a1");
        assert_eq!(threads[0].messages[1].message_id, "a2");
    }

    #[test]
    fn ts_min_max_reflect_member_messages() {
        let messages = vec![msg("a", "a1", 10), msg("a", "a2", 30), msg("a", "a3", 20)];
        let threads = group_by_conversation(messages);
        assert_eq!(threads[0].ts_min(), 10);
        assert_eq!(threads[0].ts_max(), 30);
    }

    #[test]
    fn empty_input_yields_no_threads() {
        assert!(group_by_conversation(Vec::new()).is_empty());
    }
}
