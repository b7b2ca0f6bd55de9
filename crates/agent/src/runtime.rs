//! Request-scoped agent runtime.
//!
//! [`AgentRuntime`] holds the long-lived pieces (provider, tools, hooks) behind
//! `Arc`s and builds a fresh conversation and agent loop for every request:
//!
//! 1. validate the payload (no outbound calls on failure)
//! 2. system prompt + user message
//! 3. before-invocation hooks (memory recall)
//! 4. agent loop (model + `search_food`)
//! 5. after-invocation hooks (memory save)
//!
//! Only step 4 can fail a request once validation passed.

use std::sync::Arc;

use chrono::Utc;
use foodclaw_config::AppConfig;
use foodclaw_core::event::{DomainEvent, EventBus};
use foodclaw_core::memory::MemoryStore;
use foodclaw_core::message::{Conversation, Message, SessionId};
use foodclaw_core::provider::Provider;
use foodclaw_core::tool::ToolRegistry;
use tracing::info;

use crate::hooks::{AgentHook, HookRegistry};
use crate::invocation::InvocationRequest;
use crate::loop_runner::AgentLoop;
use crate::memory_hook::PreferenceMemoryHook;
use crate::prompt::system_prompt;

/// Model and prompt settings applied to every request.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_tool_iterations: u32,
    pub system_prompt_override: Option<String>,
}

impl RuntimeSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.model.primary.clone(),
            temperature: config.model.temperature,
            max_tokens: config.model.max_tokens,
            max_tool_iterations: config.agent.max_tool_iterations,
            system_prompt_override: config.agent.system_prompt_override.clone(),
        }
    }
}

/// Result of a successful invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationOutcome {
    pub response: String,
    pub session_id: SessionId,
}

pub struct AgentRuntime {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    hooks: HookRegistry,
    events: Arc<EventBus>,
    settings: RuntimeSettings,
}

impl AgentRuntime {
    pub fn new(provider: Arc<dyn Provider>, tools: ToolRegistry, settings: RuntimeSettings) -> Self {
        Self {
            provider,
            tools: Arc::new(tools),
            hooks: HookRegistry::new(),
            events: Arc::new(EventBus::default()),
            settings,
        }
    }

    /// Wire a runtime from config. `memory` of `None` runs without recall or save.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        memory: Option<Arc<dyn MemoryStore>>,
        tools: ToolRegistry,
    ) -> Self {
        let mut runtime = Self::new(provider, tools, RuntimeSettings::from_config(config));
        if let Some(store) = memory {
            runtime = runtime.with_memory(store, &config.memory);
        }
        info!(
            model = %runtime.settings.model,
            tools = ?runtime.tools.names(),
            hooks = ?runtime.hooks.names(),
            "Agent runtime ready"
        );
        runtime
    }

    /// Register the preference memory hook against `store`.
    pub fn with_memory(self, store: Arc<dyn MemoryStore>, config: &foodclaw_config::MemoryConfig) -> Self {
        let hook = PreferenceMemoryHook::new(store, config).with_events(self.events.clone());
        self.with_hook(Arc::new(hook))
    }

    pub fn with_hook(mut self, hook: Arc<dyn AgentHook>) -> Self {
        self.hooks.register(hook);
        self
    }

    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.names()
    }

    /// Serve one request. A missing session id gets a fresh UUID.
    pub async fn invoke(
        &self,
        request: &InvocationRequest,
        session_id: Option<SessionId>,
    ) -> Result<InvocationOutcome, foodclaw_core::Error> {
        let valid = request.validate()?;
        let session_id = session_id
            .filter(|s| !s.as_str().trim().is_empty())
            .unwrap_or_default();

        info!(actor_id = %valid.actor_id, session_id = %session_id, "Invocation received");
        self.events.publish(DomainEvent::InvocationStarted {
            actor_id: valid.actor_id.clone(),
            session_id: session_id.to_string(),
            timestamp: Utc::now(),
        });

        let mut conversation = Conversation::new(valid.actor_id, session_id.clone());
        conversation.set_system_prompt(system_prompt(
            Utc::now().date_naive(),
            !self.tools.is_empty(),
            self.settings.system_prompt_override.as_deref(),
        ));
        conversation.push(Message::user(valid.prompt));

        self.hooks.run_before(&mut conversation, &self.events).await;

        let agent = AgentLoop::new(
            self.provider.clone(),
            self.settings.model.clone(),
            self.settings.temperature,
            self.tools.clone(),
            self.events.clone(),
        )
        .with_max_iterations(self.settings.max_tool_iterations)
        .with_max_tokens(self.settings.max_tokens);

        let response = agent.process(&mut conversation).await?;

        self.hooks.run_after(&conversation, &self.events).await;

        Ok(InvocationOutcome { response, session_id })
    }
}
