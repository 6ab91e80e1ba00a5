//! Entry-point request/response schema
//!
//! The response is the sole observable output of a turn; when hosted by a
//! model-host protocol it is serialized as exactly one JSON document.

use serde::{Deserialize, Serialize};

use crate::routing_log::RoutingLog;

/// One chat turn to arbitrate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurnRequest {
    pub user_message: String,
    /// The model's proposed reply
    pub assistant_draft: String,
    #[serde(default = "default_session")]
    pub session_id: String,
    #[serde(default = "default_store_interaction")]
    pub store_interaction: bool,
}

fn default_session() -> String {
    "default".to_string()
}

fn default_store_interaction() -> bool {
    true
}

impl ChatTurnRequest {
    pub fn new(user_message: impl Into<String>, assistant_draft: impl Into<String>) -> Self {
        Self {
            user_message: user_message.into(),
            assistant_draft: assistant_draft.into(),
            session_id: default_session(),
            store_interaction: default_store_interaction(),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn without_storage(mut self) -> Self {
        self.store_interaction = false;
        self
    }
}

/// Retrieval and storage counters for one turn
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryCounts {
    pub canonical_facts_retrieved: usize,
    pub context_chunks_retrieved: usize,
    pub stored: StoredInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredInfo {
    pub chunk_id: Option<String>,
}

/// Turn metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnMetadata {
    pub timestamp: String,
    pub session_id: String,
    pub domain: String,
    pub domain_confidence: f64,
}

/// The decision for one turn
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurnResponse {
    pub final_reply: String,
    pub was_overridden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict_reason: Option<String>,
    pub memory_summary: String,
    pub memory: MemoryCounts,
    pub metadata: TurnMetadata,
    pub routing_log: RoutingLog,
}
