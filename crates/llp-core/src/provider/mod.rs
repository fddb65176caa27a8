//! Provider adapters (C2): turn one [`RawRecord`] into an ordered run of
//! [`NormalizedMessage`]s for one conversation.
//!
//! Providers are a small closed set dispatched through [`ProviderId`] rather
//! than a runtime registry — adding a new provider means adding a variant and
//! a match arm, not registering a plugin.

pub mod openai;

use std::fmt;
use std::str::FromStr;

use crate::error::AdapterError;
use crate::types::{NormalizedMessage, RawRecord};

/// The set of vendor export formats this pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderId {
    OpenaiChatgpt,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenaiChatgpt => "openai_chatgpt",
        }
    }

    /// Linearize one raw record into its conversation's messages, in the
    /// order described by the record's graph structure. `source_stem` is the
    /// input file's stem, used only as a conversation-id fallback (§4.2). See
    /// [`openai::linearize`] for the one implementation currently wired up.
    pub fn linearize(
        &self,
        record: &RawRecord,
        source_stem: Option<&str>,
    ) -> Result<Vec<NormalizedMessage>, AdapterError> {
        match self {
            ProviderId::OpenaiChatgpt => openai::linearize(record, source_stem),
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai_chatgpt" | "openai-chatgpt" | "chatgpt" => Ok(ProviderId::OpenaiChatgpt),
            other => Err(format!("unknown provider: {other:?}")),
        }
    }
}
