//! Memory store trait: the seam in front of the managed memory service.
//!
//! The runtime never owns memory records. It reads extracted records for an
//! actor before a model call and writes the raw conversational turn back
//! afterwards; extraction, expiry, and storage are the service's business.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::MemoryError;
use crate::message::{ConversationTurn, SessionId};

/// Placeholder replaced by the actor id in namespace templates.
pub const ACTOR_PLACEHOLDER: &str = "{actorId}";

/// Expand a namespace template such as `user/{actorId}/food_preferences`.
pub fn resolve_namespace(template: &str, actor_id: &str) -> String {
    template.replace(ACTOR_PLACEHOLDER, actor_id)
}

/// A record extracted by the memory service, opaque apart from its text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,

    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Relevance score assigned by the service's search
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A semantic lookup inside one namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordQuery {
    pub namespace: String,

    pub query: String,

    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    3
}

/// A conversational event to append to short-term memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEvent {
    pub actor_id: String,

    pub session_id: SessionId,

    pub turn: ConversationTurn,

    pub timestamp: DateTime<Utc>,
}

impl ConversationEvent {
    pub fn new(actor_id: impl Into<String>, session_id: SessionId, turn: ConversationTurn) -> Self {
        Self {
            actor_id: actor_id.into(),
            session_id,
            turn,
            timestamp: Utc::now(),
        }
    }
}

/// The core MemoryStore trait.
///
/// Implementations: AgentCore Memory (remote), in-memory (tests and local
/// runs), none (no-op).
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// The store name (e.g. "agentcore", "in_memory", "none").
    fn name(&self) -> &str;

    /// Retrieve records relevant to `query.query` within `query.namespace`.
    async fn retrieve(&self, query: RecordQuery) -> std::result::Result<Vec<MemoryRecord>, MemoryError>;

    /// Append a conversational turn. Returns the service-assigned event id.
    async fn create_event(&self, event: ConversationEvent) -> std::result::Result<String, MemoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_template_expansion() {
        assert_eq!(
            resolve_namespace("user/{actorId}/food_preferences", "food-lover-001"),
            "user/food-lover-001/food_preferences"
        );
        assert_eq!(resolve_namespace("static/ns", "a"), "static/ns");
    }

    #[test]
    fn record_query_top_k_default() {
        let q: RecordQuery = serde_json::from_value(serde_json::json!({
            "namespace": "user/a/food_preferences",
            "query": "favorites"
        }))
        .unwrap();
        assert_eq!(q.top_k, 3);
    }
}
