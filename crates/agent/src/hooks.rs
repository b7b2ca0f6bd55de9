//! Invocation hooks: work that wraps the model call without being part of it.
//!
//! Hooks never fail a request. A failing `before_invocation` leaves the
//! conversation as the hook found it; a failing `after_invocation` is logged
//! after the response already exists.

use std::sync::Arc;

use async_trait::async_trait;
use foodclaw_core::event::{DomainEvent, EventBus};
use foodclaw_core::message::Conversation;
use tracing::error;

/// Lifecycle phase a hook ran in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    BeforeInvocation,
    AfterInvocation,
}

impl HookPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookPhase::BeforeInvocation => "before_invocation",
            HookPhase::AfterInvocation => "after_invocation",
        }
    }
}

#[async_trait]
pub trait AgentHook: Send + Sync {
    fn name(&self) -> &str;

    /// Runs after the system prompt and user message are in place, before the
    /// first model call. May rewrite the system prompt.
    async fn before_invocation(&self, _conversation: &mut Conversation) -> foodclaw_core::Result<()> {
        Ok(())
    }

    /// Runs once the final response is in the conversation.
    async fn after_invocation(&self, _conversation: &Conversation) -> foodclaw_core::Result<()> {
        Ok(())
    }
}

/// Ordered set of hooks run around every invocation.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: Vec<Arc<dyn AgentHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Arc<dyn AgentHook>) {
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.hooks.iter().map(|h| h.name()).collect()
    }

    pub async fn run_before(&self, conversation: &mut Conversation, events: &EventBus) {
        for hook in &self.hooks {
            // Roll back partial edits from a failed hook
            let snapshot = conversation.messages.clone();
            if let Err(e) = hook.before_invocation(conversation).await {
                conversation.messages = snapshot;
                Self::report(hook.as_ref(), HookPhase::BeforeInvocation, &e, conversation, events);
            }
        }
    }

    pub async fn run_after(&self, conversation: &Conversation, events: &EventBus) {
        for hook in &self.hooks {
            if let Err(e) = hook.after_invocation(conversation).await {
                Self::report(hook.as_ref(), HookPhase::AfterInvocation, &e, conversation, events);
            }
        }
    }

    fn report(
        hook: &dyn AgentHook,
        phase: HookPhase,
        err: &foodclaw_core::Error,
        conversation: &Conversation,
        events: &EventBus,
    ) {
        error!(
            hook = hook.name(),
            phase = phase.as_str(),
            actor_id = %conversation.actor_id,
            session_id = %conversation.session_id,
            error = %err,
            "Hook failed; continuing"
        );
        events.publish(DomainEvent::HookFailed {
            hook: hook.name().to_string(),
            phase: phase.as_str().to_string(),
            error_message: err.to_string(),
            timestamp: chrono::Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foodclaw_core::message::{Message, SessionId};
    use std::sync::Mutex;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl AgentHook for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        async fn before_invocation(&self, conversation: &mut Conversation) -> foodclaw_core::Result<()> {
            self.log.lock().unwrap().push(format!("{}:before", self.name));
            conversation.set_system_prompt(format!("edited by {}", self.name));
            if self.fail {
                return Err(foodclaw_core::Error::Internal("boom".into()));
            }
            Ok(())
        }

        async fn after_invocation(&self, _conversation: &Conversation) -> foodclaw_core::Result<()> {
            self.log.lock().unwrap().push(format!("{}:after", self.name));
            if self.fail {
                return Err(foodclaw_core::Error::Internal("boom".into()));
            }
            Ok(())
        }
    }

    fn conversation() -> Conversation {
        let mut conv = Conversation::new("a", SessionId::from("s"));
        conv.set_system_prompt("base");
        conv.push(Message::user("hi"));
        conv
    }

    #[tokio::test]
    async fn hooks_run_in_order_and_failures_are_contained() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HookRegistry::new();
        registry.register(Arc::new(Recorder { name: "first", log: log.clone(), fail: false }));
        registry.register(Arc::new(Recorder { name: "broken", log: log.clone(), fail: true }));
        assert_eq!(registry.names(), vec!["first", "broken"]);

        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let mut conv = conversation();

        registry.run_before(&mut conv, &bus).await;
        // The failing hook's edit is rolled back; the first hook's stays
        assert_eq!(conv.system_prompt(), Some("edited by first"));

        registry.run_after(&conv, &bus).await;
        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:before", "broken:before", "first:after", "broken:after"]
        );

        let failed = rx.recv().await.unwrap();
        match failed.as_ref() {
            DomainEvent::HookFailed { hook, phase, .. } => {
                assert_eq!(hook, "broken");
                assert_eq!(phase, "before_invocation");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn empty_registry() {
        let registry = HookRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }
}
