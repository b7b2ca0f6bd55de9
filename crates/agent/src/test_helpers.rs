//! Shared test doubles for the agent crate.

use async_trait::async_trait;
use foodclaw_core::error::{MemoryError, ProviderError};
use foodclaw_core::memory::{ConversationEvent, MemoryRecord, MemoryStore, RecordQuery};
use foodclaw_core::message::{Message, MessageToolCall};
use foodclaw_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use std::sync::Mutex;

/// Returns scripted responses in order and records every request.
///
/// Panics if more calls are made than responses provided.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        let n = requests.len();
        assert!(
            n < responses.len(),
            "SequentialMockProvider: no more responses (call #{n}, have {})",
            responses.len()
        );
        requests.push(request);
        Ok(responses[n].clone())
    }
}

/// Always fails with the given error.
pub struct FailingProvider(pub ProviderError);

#[async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(self.0.clone())
    }
}

/// Memory store whose calls all fail, counting attempts.
#[derive(Default)]
pub struct FailingMemory {
    pub retrieves: Mutex<usize>,
    pub saves: Mutex<usize>,
}

#[async_trait]
impl MemoryStore for FailingMemory {
    fn name(&self) -> &str {
        "failing"
    }

    async fn retrieve(&self, _query: RecordQuery) -> Result<Vec<MemoryRecord>, MemoryError> {
        *self.retrieves.lock().unwrap() += 1;
        Err(MemoryError::Unavailable("connection refused".into()))
    }

    async fn create_event(&self, _event: ConversationEvent) -> Result<String, MemoryError> {
        *self.saves.lock().unwrap() += 1;
        Err(MemoryError::Rejected {
            status_code: 403,
            message: "AccessDeniedException".into(),
        })
    }
}

pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            input_tokens: 10,
            output_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
        stop_reason: Some("end_turn".into()),
    }
}

pub fn make_tool_call_response(tool_calls: Vec<MessageToolCall>, thought: &str) -> ProviderResponse {
    let mut msg = Message::assistant(thought);
    msg.tool_calls = tool_calls;
    ProviderResponse {
        message: msg,
        usage: None,
        model: "mock-model".into(),
        stop_reason: Some("tool_use".into()),
    }
}

pub fn make_tool_call(id: &str, name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: args.to_string(),
    }
}
