//! No-op store: memory disabled.

use async_trait::async_trait;
use foodclaw_core::error::MemoryError;
use foodclaw_core::memory::{ConversationEvent, MemoryRecord, MemoryStore, RecordQuery};

/// Remembers nothing and recalls nothing.
pub struct NoopMemory;

#[async_trait]
impl MemoryStore for NoopMemory {
    fn name(&self) -> &str { "none" }

    async fn retrieve(&self, _query: RecordQuery) -> Result<Vec<MemoryRecord>, MemoryError> {
        Ok(Vec::new())
    }

    async fn create_event(&self, _event: ConversationEvent) -> Result<String, MemoryError> {
        Ok(String::new())
    }
}
