//! AgentCore Memory data-plane store.
//!
//! Reads extracted long-term records with `RetrieveMemoryRecords` and appends
//! conversational turns with `CreateEvent`. Extraction of preferences from
//! those events happens inside the service, asynchronously.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use foodclaw_core::error::MemoryError;
use foodclaw_core::memory::{ConversationEvent, MemoryRecord, MemoryStore, RecordQuery};
use foodclaw_security::CredentialsProvider;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use crate::client::{parse_timestamp, SignedJsonClient};

pub struct AgentCoreMemory {
    memory_id: String,
    endpoint: String,
    http: SignedJsonClient,
}

impl AgentCoreMemory {
    pub fn new(
        region: &str,
        memory_id: impl Into<String>,
        credentials: Arc<dyn CredentialsProvider>,
        timeout: Duration,
    ) -> Result<Self, MemoryError> {
        Ok(Self {
            memory_id: memory_id.into(),
            endpoint: format!("https://bedrock-agentcore.{region}.amazonaws.com"),
            http: SignedJsonClient::new(region, credentials, timeout)?,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn memory_id(&self) -> &str {
        &self.memory_id
    }

    fn url(&self, suffix: &str) -> String {
        format!(
            "{}/memories/{}/{suffix}",
            self.endpoint,
            urlencoding::encode(&self.memory_id)
        )
    }

    fn retrieve_body(query: &RecordQuery) -> Value {
        json!({
            "namespace": query.namespace,
            "searchCriteria": {
                "searchQuery": query.query,
                "topK": query.top_k,
            },
        })
    }

    fn create_event_body(event: &ConversationEvent) -> Value {
        json!({
            "actorId": event.actor_id,
            "sessionId": event.session_id.as_str(),
            "eventTimestamp": event.timestamp.timestamp(),
            "payload": [
                { "conversational": { "content": { "text": event.turn.prompt }, "role": "USER" } },
                { "conversational": { "content": { "text": event.turn.response }, "role": "ASSISTANT" } },
            ],
            "clientToken": uuid::Uuid::new_v4().to_string(),
        })
    }

    fn parse_records(body: &Value) -> Result<Vec<MemoryRecord>, MemoryError> {
        let summaries = body
            .get("memoryRecordSummaries")
            .and_then(Value::as_array)
            .ok_or_else(|| MemoryError::Malformed("missing memoryRecordSummaries".into()))?;

        Ok(summaries
            .iter()
            .map(|s| MemoryRecord {
                id: s["memoryRecordId"].as_str().unwrap_or_default().to_string(),
                text: s["content"]["text"].as_str().unwrap_or_default().to_string(),
                namespace: s["namespaces"]
                    .as_array()
                    .and_then(|ns| ns.first())
                    .and_then(Value::as_str)
                    .map(str::to_string),
                score: s["score"].as_f64().map(|v| v as f32),
                created_at: parse_timestamp(&s["createdAt"]),
            })
            .collect())
    }
}

#[async_trait]
impl MemoryStore for AgentCoreMemory {
    fn name(&self) -> &str {
        "agentcore"
    }

    async fn retrieve(&self, query: RecordQuery) -> Result<Vec<MemoryRecord>, MemoryError> {
        let body = self
            .http
            .send(Method::POST, &self.url("retrieve"), Some(&Self::retrieve_body(&query)))
            .await?;
        let records = Self::parse_records(&body)?;
        debug!(namespace = %query.namespace, count = records.len(), "Retrieved memory records");
        Ok(records)
    }

    async fn create_event(&self, event: ConversationEvent) -> Result<String, MemoryError> {
        let body = self
            .http
            .send(Method::POST, &self.url("events"), Some(&Self::create_event_body(&event)))
            .await?;
        body["event"]["eventId"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| MemoryError::Malformed("CreateEvent response has no eventId".into()))
    }
}
