//! Normalizer / Validator (C3).
//!
//! Runs after the adapter (C2) and before the grouper (C4). Verifies the
//! invariants in the data model: required fields present and non-empty, `ts`
//! in epoch-millisecond scale, `parts` all strings (guaranteed by
//! [`NormalizedMessage`]'s type, so not re-checked here).
//!
//! [`sanitize_text`] is the free-form string sanitizer used by the renderer
//! (C7) on display strings only — stored `parts` are never mutated by it.

use crate::error::ValidationError;
use crate::time::to_epoch_ms;
use crate::types::NormalizedMessage;

/// Validate one message against the §3 invariants. Returns the first
/// violation found, if any.
pub fn validate_message(msg: &NormalizedMessage) -> Result<(), ValidationError> {
    if msg.conversation_id.is_empty() {
        return Err(ValidationError::EmptyField {
            field: "conversation_id",
        });
    }
    if msg.message_id.is_empty() {
        return Err(ValidationError::EmptyField {
            field: "message_id",
        });
    }
    if msg.role.is_empty() {
        return Err(ValidationError::EmptyField { field: "role" });
    }
    if msg.content.content_type.is_empty() {
        return Err(ValidationError::EmptyField {
            field: "content.content_type",
        });
    }
    // ts must already be epoch-ms scale; a message constructed outside the
    // adapter (e.g. hand-built in tests, or a future provider) might still
    // be in epoch-seconds — reject rather than silently reinterpreting,
    // since by this point the adapter contract says ts is already ms.
    if msg.ts < 0 {
        return Err(ValidationError::InvalidTimestamp { ts: msg.ts });
    }
    Ok(())
}

/// Apply [`validate_message`] to every message, dropping invalid ones into
/// the run's counters unless `fail_fast` is set, in which case the first
/// violation is returned immediately.
pub fn normalize_and_validate(
    messages: Vec<NormalizedMessage>,
    fail_fast: bool,
    stats: &mut crate::types::RunStats,
) -> Result<Vec<NormalizedMessage>, ValidationError> {
    let mut out = Vec::with_capacity(messages.len());
    for msg in messages {
        match validate_message(&msg) {
            Ok(()) => out.push(msg),
            Err(e) => {
                if fail_fast {
                    return Err(e);
                }
                stats.validation_errors += 1;
                stats.record_error_sample(format!(
                    "{}:{}: {e}",
                    msg.conversation_id, msg.message_id
                ));
            }
        }
    }
    Ok(out)
}

/// Coerce a raw timestamp value (already present in all emitted messages —
/// see [`crate::provider::openai`]) into epoch-ms, applying the same
/// seconds-vs-ms heuristic used everywhere else in the pipeline.
pub fn normalize_ts(raw: f64) -> i64 {
    to_epoch_ms(raw)
}

/// Sanitize a free-form display string: NBSP → space, strip C0/C1 control
/// bytes, collapse whitespace runs, trim. Used by the renderer on rendered
/// text only; stored `parts` remain verbatim.
pub fn sanitize_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_space = false;
    for ch in input.chars() {
        let normalized = if ch == '\u{00A0}' { ' ' } else { ch };
        if is_control_byte(normalized) {
            continue;
        }
        if normalized.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(normalized);
            last_was_space = false;
        }
    }
    out.trim().to_string()
}

/// C0 (`U+0000..=U+001F`) and C1 (`U+007F`, `U+0080..=U+009F`) control
/// characters, matching the original's `[\x00-\x1F\x7F]` regex plus the C1
/// block for full Unicode control coverage.
fn is_control_byte(ch: char) -> bool {
    matches!(ch, '\u{0000}'..='\u{001F}' | '\u{007F}'..='\u{009F}')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageContent;

    fn msg(overrides: impl FnOnce(&mut NormalizedMessage)) -> NormalizedMessage {
        let mut m = NormalizedMessage {
            conversation_id: "conv-1".to_string(),
            message_id: "m1".to_string(),
            parent_id: None,
            role: "user".to_string(),
            ts: 1_730_000_001_000,
            content: MessageContent {
                content_type: "text".to_string(),
                parts: vec!["hello".to_string()],
            },
            text: "hello".to_string(),
            model: None,
        };
        overrides(&mut m);
        m
    }

    #[test]
    fn accepts_well_formed_message() {
        assert!(validate_message(&msg(|_| {})).is_ok());
    }

    #[test]
    fn rejects_missing_role() {
        let m = msg(|m| m.role = String::new());
        assert!(matches!(
            validate_message(&m),
            Err(ValidationError::EmptyField { field: "role" })
        ));
    }

    #[test]
    fn rejects_empty_conversation_id() {
        let m = msg(|m| m.conversation_id = String::new());
        assert!(validate_message(&m).is_err());
    }

    #[test]
    fn normalize_and_validate_drops_bad_messages_and_counts_them() {
        let mut stats = crate::types::RunStats::default();
        let good = msg(|_| {});
        let bad = msg(|m| m.role = String::new());
        let out = normalize_and_validate(vec![good, bad], false, &mut stats).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(stats.validation_errors, 1);
        assert_eq!(stats.error_samples.len(), 1);
    }

    #[test]
    fn normalize_and_validate_fail_fast_returns_first_error() {
        let mut stats = crate::types::RunStats::default();
        let bad = msg(|m| m.role = String::new());
        let err = normalize_and_validate(vec![bad], true, &mut stats).unwrap_err();
        assert!(matches!(err, ValidationError::EmptyField { .. }));
    }

    #[test]
    fn sanitize_text_collapses_whitespace_and_strips_control_bytes() {
        assert_eq!(sanitize_text("a\u{00A0}\u{00A0}b"), "a b");
        assert_eq!(sanitize_text("  hi   there  "), "hi there");
        assert_eq!(sanitize_text("a\u{0007}b"), "ab");
        assert_eq!(sanitize_text("line1\nline2"), "line1 line2");
    }

    #[test]
    fn sanitize_text_is_idempotent() {
        let once = sanitize_text("  foo\tbar\u{00A0}baz  ");
        let twice = sanitize_text(&once);
        assert_eq!(once, twice);
    }
}
