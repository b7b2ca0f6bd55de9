//! Amazon Bedrock provider using the Converse API.
//!
//! Features:
//! - SigV4-signed requests (service `bedrock`)
//! - System prompt as top-level `system` blocks
//! - Native tool use with `toolUse` / `toolResult` content blocks
//! - Allow-list of model ids; anything else is refused before a request is made

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use foodclaw_core::error::ProviderError;
use foodclaw_core::message::{Message, MessageToolCall, Role};
use foodclaw_core::provider::*;
use foodclaw_security::{CredentialsProvider, SigV4Signer};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

const SIGNING_SERVICE: &str = "bedrock";
const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Bedrock Runtime Converse API provider.
pub struct BedrockProvider {
    name: String,
    endpoint: String,
    client: reqwest::Client,
    signer: SigV4Signer,
    allowed_models: Vec<String>,
}

impl BedrockProvider {
    /// Create a provider for `region` with the regional runtime endpoint.
    pub fn new(
        region: &str,
        credentials: Arc<dyn CredentialsProvider>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: "bedrock".into(),
            endpoint: format!("https://bedrock-runtime.{region}.amazonaws.com"),
            client,
            signer: SigV4Signer::new(region, SIGNING_SERVICE, credentials),
            allowed_models: Vec::new(),
        })
    }

    /// Override the endpoint (VPC endpoints, local mocks).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Restrict the provider to these model ids. Empty means unrestricted.
    pub fn with_allowed_models(mut self, models: Vec<String>) -> Self {
        self.allowed_models = models;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn check_model(&self, model: &str) -> Result<(), ProviderError> {
        if self.allowed_models.is_empty() || self.allowed_models.iter().any(|m| m == model) {
            Ok(())
        } else {
            Err(ProviderError::ModelNotAllowed(model.to_string()))
        }
    }

    fn converse_url(&self, model: &str) -> String {
        format!(
            "{}/model/{}/converse",
            self.endpoint,
            urlencoding::encode(model)
        )
    }

    /// Split out system messages; Converse takes them as a top-level field.
    fn extract_system(messages: &[Message]) -> (Vec<Value>, Vec<&Message>) {
        let mut system = Vec::new();
        let mut rest = Vec::new();
        for msg in messages {
            match msg.role {
                Role::System => system.push(json!({ "text": msg.content })),
                _ => rest.push(msg),
            }
        }
        (system, rest)
    }

    /// Convert messages to Converse format.
    ///
    /// Converse requires alternating roles, so consecutive tool results are
    /// folded into a single user message.
    fn to_api_messages(messages: &[&Message]) -> Vec<Value> {
        let mut result: Vec<Value> = Vec::new();
        let mut pending_results: Vec<Value> = Vec::new();

        let flush = |pending: &mut Vec<Value>, out: &mut Vec<Value>| {
            if !pending.is_empty() {
                out.push(json!({ "role": "user", "content": std::mem::take(pending) }));
            }
        };

        for msg in messages {
            match msg.role {
                Role::Tool => {
                    pending_results.push(json!({
                        "toolResult": {
                            "toolUseId": msg.tool_call_id.clone().unwrap_or_default(),
                            "content": [{ "text": msg.content }],
                            "status": if msg.is_error { "error" } else { "success" },
                        }
                    }));
                }
                Role::User => {
                    flush(&mut pending_results, &mut result);
                    result.push(json!({ "role": "user", "content": [{ "text": msg.content }] }));
                }
                Role::Assistant => {
                    flush(&mut pending_results, &mut result);
                    let mut blocks = Vec::new();
                    if !msg.content.is_empty() {
                        blocks.push(json!({ "text": msg.content }));
                    }
                    for tc in &msg.tool_calls {
                        let input: Value = serde_json::from_str(&tc.arguments)
                            .ok()
                            .filter(Value::is_object)
                            .unwrap_or_else(|| json!({}));
                        blocks.push(json!({
                            "toolUse": { "toolUseId": tc.id, "name": tc.name, "input": input }
                        }));
                    }
                    result.push(json!({ "role": "assistant", "content": blocks }));
                }
                Role::System => {}
            }
        }
        flush(&mut pending_results, &mut result);
        result
    }

    fn to_tool_config(tools: &[ToolDefinition]) -> Value {
        let specs: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "toolSpec": {
                        "name": t.name,
                        "description": t.description,
                        "inputSchema": { "json": t.parameters },
                    }
                })
            })
            .collect();
        json!({ "tools": specs })
    }

    fn build_body(request: &ProviderRequest) -> Value {
        let (system, messages) = Self::extract_system(&request.messages);
        let mut body = json!({
            "messages": Self::to_api_messages(&messages),
            "inferenceConfig": {
                "maxTokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
                "temperature": request.temperature,
            },
        });
        if !system.is_empty() {
            body["system"] = Value::Array(system);
        }
        if !request.tools.is_empty() {
            body["toolConfig"] = Self::to_tool_config(&request.tools);
        }
        body
    }

    /// Map a non-2xx Converse response to a provider error.
    fn map_error(status: u16, error_type: Option<&str>, body: &str) -> ProviderError {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| {
                v.get("message")
                    .or_else(|| v.get("Message"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| body.to_string());
        let throttled = status == 429
            || error_type.is_some_and(|t| t.contains("ThrottlingException"))
            || body.contains("ThrottlingException");

        if throttled {
            ProviderError::RateLimited(message)
        } else if status == 401 || status == 403 {
            ProviderError::AuthenticationFailed(message)
        } else {
            ProviderError::ApiError {
                status_code: status,
                message,
            }
        }
    }

    fn response_to_provider_response(
        resp: ConverseResponse,
        model: &str,
    ) -> Result<ProviderResponse, ProviderError> {
        let mut text_content = String::new();
        let mut tool_calls = Vec::new();

        for block in &resp.output.message.content {
            if let Some(text) = block.get("text").and_then(Value::as_str) {
                if !text_content.is_empty() {
                    text_content.push('\n');
                }
                text_content.push_str(text);
            } else if let Some(tool_use) = block.get("toolUse") {
                let id = tool_use["toolUseId"].as_str().unwrap_or_default().to_string();
                let name = tool_use["name"].as_str().unwrap_or_default().to_string();
                if name.is_empty() {
                    warn!(tool_use_id = %id, "Ignoring toolUse block without a name");
                    continue;
                }
                tool_calls.push(MessageToolCall {
                    id,
                    name,
                    arguments: tool_use.get("input").cloned().unwrap_or_else(|| json!({})).to_string(),
                });
            }
        }

        let mut message = Message::assistant(text_content);
        message.tool_calls = tool_calls;

        Ok(ProviderResponse {
            message,
            usage: resp.usage.map(|u| Usage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
                total_tokens: u.total_tokens.unwrap_or(u.input_tokens + u.output_tokens),
            }),
            model: model.to_string(),
            stop_reason: resp.stop_reason,
        })
    }
}

#[async_trait]
impl foodclaw_core::Provider for BedrockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        self.check_model(&request.model)?;

        let body = serde_json::to_vec(&Self::build_body(&request))
            .map_err(|e| ProviderError::ApiError {
                status_code: 0,
                message: format!("Failed to encode Converse request: {e}"),
            })?;

        let mut http_request = self
            .client
            .post(self.converse_url(&request.model))
            .header("content-type", "application/json")
            .header("accept", "application/json")
            .body(body)
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        self.signer
            .sign(&mut http_request)
            .await
            .map_err(|e| ProviderError::Signing(e.to_string()))?;

        debug!(provider = "bedrock", model = %request.model, messages = request.messages.len(), "Sending Converse request");

        let response = self.client.execute(http_request).await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(e.to_string())
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let error_type = response
                .headers()
                .get("x-amzn-errortype")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, error_type = ?error_type, body = %error_body, "Bedrock API error");
            return Err(Self::map_error(status, error_type.as_deref(), &error_body));
        }

        let api_resp: ConverseResponse = response.json().await.map_err(|e| ProviderError::ApiError {
            status_code: status,
            message: format!("Failed to parse Converse response: {e}"),
        })?;

        Self::response_to_provider_response(api_resp, &request.model)
    }
}

// --- Converse API types ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConverseResponse {
    output: ConverseOutput,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<ConverseUsage>,
}

#[derive(Debug, Deserialize)]
struct ConverseOutput {
    message: ConverseMessage,
}

#[derive(Debug, Deserialize)]
struct ConverseMessage {
    #[serde(default)]
    content: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConverseUsage {
    input_tokens: u32,
    output_tokens: u32,
    #[serde(default)]
    total_tokens: Option<u32>,
}
