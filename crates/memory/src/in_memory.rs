//! In-memory store, for local runs and tests.
//!
//! Records are seeded by hand; saved events are kept but never mined for
//! preferences. Retrieval ranks records in the namespace by keyword overlap
//! with the query and returns the top `top_k`.

use async_trait::async_trait;
use foodclaw_core::error::MemoryError;
use foodclaw_core::memory::{ConversationEvent, MemoryRecord, MemoryStore, RecordQuery};
use std::collections::HashSet;
use tokio::sync::RwLock;
use uuid::Uuid;

pub struct InMemoryStore {
    records: RwLock<Vec<MemoryRecord>>,
    events: RwLock<Vec<(String, ConversationEvent)>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            events: RwLock::new(Vec::new()),
        }
    }

    /// Add a record the way the service's extraction would.
    pub async fn seed(&self, namespace: impl Into<String>, text: impl Into<String>) -> String {
        let id = Uuid::new_v4().to_string();
        self.records.write().await.push(MemoryRecord {
            id: id.clone(),
            text: text.into(),
            namespace: Some(namespace.into()),
            score: None,
            created_at: Some(chrono::Utc::now()),
        });
        id
    }

    /// Saved events, oldest first.
    pub async fn events(&self) -> Vec<ConversationEvent> {
        self.events.read().await.iter().map(|(_, e)| e.clone()).collect()
    }

    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn keywords(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn retrieve(&self, query: RecordQuery) -> Result<Vec<MemoryRecord>, MemoryError> {
        let records = self.records.read().await;
        let wanted = keywords(&query.query);

        let mut results: Vec<MemoryRecord> = records
            .iter()
            .filter(|r| r.namespace.as_deref() == Some(query.namespace.as_str()))
            .cloned()
            .map(|mut r| {
                let have = keywords(&r.text);
                let overlap = wanted.intersection(&have).count();
                r.score = Some(overlap as f32 / wanted.len().max(1) as f32);
                r
            })
            .collect();

        // Stable: equal scores keep insertion order
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(query.top_k);
        Ok(results)
    }

    async fn create_event(&self, event: ConversationEvent) -> Result<String, MemoryError> {
        let id = Uuid::new_v4().to_string();
        self.events.write().await.push((id.clone(), event));
        Ok(id)
    }
}
