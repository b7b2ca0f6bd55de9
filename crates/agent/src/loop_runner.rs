//! The agent reasoning loop implementation.

use std::sync::Arc;
use foodclaw_core::event::{DomainEvent, EventBus};
use foodclaw_core::message::{Conversation, Message};
use foodclaw_core::provider::{Provider, ProviderRequest};
use foodclaw_core::tool::{ToolCall, ToolRegistry};
use tracing::{debug, info, warn};

/// Returned when the model keeps calling tools past the iteration limit.
pub const MAX_ITERATIONS_MESSAGE: &str =
    "I've reached the maximum number of tool call iterations. Please provide further guidance.";

/// Orchestrates model calls and tool execution for one conversation.
pub struct AgentLoop {
    provider: Arc<dyn Provider>,

    model: String,

    temperature: f32,

    max_tokens: Option<u32>,

    tools: Arc<ToolRegistry>,

    /// Maximum tool call iterations per turn
    max_iterations: u32,

    event_bus: Arc<EventBus>,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
            tools,
            max_iterations: 8,
            event_bus,
        }
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Run the conversation to a final text response.
    ///
    /// The conversation must already hold the system prompt and the user
    /// message. The final assistant message is appended before returning, so
    /// [`Conversation::last_turn`] reflects the returned text.
    pub async fn process(
        &self,
        conversation: &mut Conversation,
    ) -> Result<String, foodclaw_core::Error> {
        info!(
            session_id = %conversation.session_id,
            actor_id = %conversation.actor_id,
            messages = conversation.messages.len(),
            "Processing conversation"
        );

        let tool_definitions = self.tools.definitions();
        let mut iteration = 0;

        loop {
            iteration += 1;

            if iteration > self.max_iterations {
                warn!(
                    session_id = %conversation.session_id,
                    iterations = iteration - 1,
                    "Max tool iterations reached, forcing text response"
                );
                break;
            }

            debug!(session_id = %conversation.session_id, iteration, "Agent loop iteration");

            let request = ProviderRequest {
                model: self.model.clone(),
                messages: conversation.messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tool_definitions.clone(),
            };

            let response = self.provider.complete(request).await?;

            if let Some(usage) = &response.usage {
                self.event_bus.publish(DomainEvent::ResponseGenerated {
                    session_id: conversation.session_id.to_string(),
                    model: response.model.clone(),
                    tokens_used: usage.total_tokens,
                    timestamp: chrono::Utc::now(),
                });
            }

            if response.message.tool_calls.is_empty() {
                let response_text = response.message.content.clone();
                conversation.push(response.message);
                return Ok(response_text);
            }

            debug!(tool_count = response.message.tool_calls.len(), "Executing tool calls");

            let tool_calls = response.message.tool_calls.clone();
            conversation.push(response.message);

            for tc in &tool_calls {
                let call = ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments: serde_json::from_str(&tc.arguments).unwrap_or_default(),
                };

                let start = std::time::Instant::now();
                let result = self.tools.execute(&call).await;
                let duration_ms = start.elapsed().as_millis() as u64;

                let (success, output) = match result {
                    Ok(tool_result) => (tool_result.success, tool_result.output),
                    Err(e) => {
                        warn!(tool = %tc.name, error = %e, "Tool execution failed");
                        // Reported back so the model can recover
                        (false, format!("Error: {e}"))
                    }
                };

                self.event_bus.publish(DomainEvent::ToolExecuted {
                    tool_name: tc.name.clone(),
                    success,
                    duration_ms,
                    timestamp: chrono::Utc::now(),
                });
                conversation.push(if success {
                    Message::tool_result(&tc.id, output)
                } else {
                    Message::tool_error(&tc.id, output)
                });
            }
        }

        conversation.push(Message::assistant(MAX_ITERATIONS_MESSAGE));
        Ok(MAX_ITERATIONS_MESSAGE.into())
    }
}
