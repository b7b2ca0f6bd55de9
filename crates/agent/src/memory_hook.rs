//! Food preference memory: recall before the model call, save the turn after.

use std::sync::Arc;

use async_trait::async_trait;
use foodclaw_config::MemoryConfig;
use foodclaw_core::event::{DomainEvent, EventBus};
use foodclaw_core::memory::{resolve_namespace, ConversationEvent, MemoryRecord, MemoryStore, RecordQuery};
use foodclaw_core::message::Conversation;
use tracing::{info, warn};

use crate::hooks::AgentHook;

pub const PREFERENCES_HEADING: &str = "## User's Food Preferences:";

pub struct PreferenceMemoryHook {
    store: Arc<dyn MemoryStore>,
    namespace_template: String,
    query: String,
    top_k: usize,
    events: Option<Arc<EventBus>>,
}

impl PreferenceMemoryHook {
    pub fn new(store: Arc<dyn MemoryStore>, config: &MemoryConfig) -> Self {
        Self {
            store,
            namespace_template: config.namespace_template.clone(),
            query: config.retrieval_query.clone(),
            top_k: config.top_k,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}

/// Render records as a system-prompt section. Empty when no record has text.
pub fn format_preferences(records: &[MemoryRecord]) -> String {
    let lines: Vec<String> = records
        .iter()
        .map(|r| r.text.trim())
        .filter(|t| !t.is_empty())
        .map(|t| format!("- {t}"))
        .collect();
    if lines.is_empty() {
        return String::new();
    }
    format!("\n\n{PREFERENCES_HEADING}\n{}", lines.join("\n"))
}

#[async_trait]
impl AgentHook for PreferenceMemoryHook {
    fn name(&self) -> &str {
        "food_preference_memory"
    }

    async fn before_invocation(&self, conversation: &mut Conversation) -> foodclaw_core::Result<()> {
        if conversation.actor_id.trim().is_empty() {
            warn!("No actor id; skipping preference load");
            return Ok(());
        }

        let namespace = resolve_namespace(&self.namespace_template, &conversation.actor_id);
        let records = self
            .store
            .retrieve(RecordQuery {
                namespace,
                query: self.query.clone(),
                top_k: self.top_k,
            })
            .await?;

        let section = format_preferences(&records);
        let count = section.lines().filter(|l| l.starts_with("- ")).count();
        if count == 0 {
            info!(actor_id = %conversation.actor_id, "No previous food preferences found");
        } else {
            let prompt = format!("{}{section}", conversation.system_prompt().unwrap_or_default());
            conversation.set_system_prompt(prompt);
            info!(actor_id = %conversation.actor_id, count, "Loaded food preferences");
        }

        self.publish(DomainEvent::PreferencesLoaded {
            actor_id: conversation.actor_id.clone(),
            count,
            timestamp: chrono::Utc::now(),
        });
        Ok(())
    }

    async fn after_invocation(&self, conversation: &Conversation) -> foodclaw_core::Result<()> {
        if conversation.actor_id.trim().is_empty() || conversation.session_id.as_str().is_empty() {
            warn!(
                actor_id = %conversation.actor_id,
                session_id = %conversation.session_id,
                "Missing actor or session id; skipping save"
            );
            return Ok(());
        }
        let Some(turn) = conversation.last_turn() else {
            warn!(session_id = %conversation.session_id, "No completed turn to save");
            return Ok(());
        };

        let event_id = self
            .store
            .create_event(ConversationEvent::new(
                conversation.actor_id.clone(),
                conversation.session_id.clone(),
                turn,
            ))
            .await?;

        info!(session_id = %conversation.session_id, event_id = %event_id, "Saved conversation turn to memory");
        self.publish(DomainEvent::TurnSaved {
            actor_id: conversation.actor_id.clone(),
            session_id: conversation.session_id.to_string(),
            event_id,
            timestamp: chrono::Utc::now(),
        });
        Ok(())
    }
}
