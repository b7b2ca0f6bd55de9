//! HTTP runtime for FoodClaw.
//!
//! Speaks the agent runtime contract:
//!
//! - `GET /ping` → `{"status":"Healthy"}`
//! - `POST /invocations` with `{prompt, actor_id}` → `{"response": "..."}`
//!
//! The session id comes from the runtime session header and is echoed back.
//! Bad payloads get 400 before any outbound call; a failed model call gets 502.
//!
//! Built on Axum.

use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use foodclaw_agent::{AgentRuntime, InvocationRequest};
use foodclaw_config::AppConfig;
use foodclaw_core::error::{Error, ProviderError};
use foodclaw_core::message::SessionId;

/// Header carrying the runtime session id.
pub const SESSION_HEADER: &str = "x-amzn-bedrock-agentcore-runtime-session-id";

/// Shared application state for the gateway.
pub struct GatewayState {
    pub runtime: Arc<AgentRuntime>,
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with the runtime routes.
pub fn build_router(state: SharedState, body_limit_bytes: usize) -> Router {
    Router::new()
        .route("/ping", get(ping_handler))
        .route("/invocations", post(invocations_handler))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Wire provider, memory, and tools from config into a runtime.
///
/// Fails when no AWS credentials are available or the memory backend is
/// `agentcore` without a memory id.
pub fn build_runtime(config: &AppConfig) -> Result<AgentRuntime, Error> {
    let credentials = foodclaw_security::default_provider()
        .map_err(|e| ProviderError::NotConfigured(e.to_string()))?;
    let provider = foodclaw_providers::build_from_config(config, credentials.clone())?;
    let memory = foodclaw_memory::build_from_config(config, || Ok(credentials.clone()))?;
    let tools = foodclaw_tools::default_registry(config);
    Ok(AgentRuntime::from_config(config, provider, Some(memory), tools))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Arc::new(build_runtime(&config)?);
    serve(runtime, &config).await
}

/// Serve an already-built runtime on the configured address.
pub async fn serve(runtime: Arc<AgentRuntime>, config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let app = build_router(Arc::new(GatewayState { runtime }), config.gateway.body_limit_bytes);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "FoodClaw runtime listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Serialize)]
struct PingResponse {
    status: &'static str,
}

async fn ping_handler() -> Json<PingResponse> {
    Json(PingResponse { status: "Healthy" })
}

#[derive(Serialize)]
struct InvocationResponse {
    response: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { error: message.into() })).into_response()
}

async fn invocations_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let session_id = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.trim().is_empty())
        .map(SessionId::from);

    let value: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "Rejected invocation: body is not JSON");
            return error_response(StatusCode::BAD_REQUEST, format!("Invalid invocation payload: {e}"));
        }
    };
    let request = match InvocationRequest::from_json(&value) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "Rejected invocation");
            return error_response(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    match state.runtime.invoke(&request, session_id).await {
        Ok(outcome) => {
            let mut response = Json(InvocationResponse {
                response: outcome.response,
            })
            .into_response();
            if let Ok(value) = HeaderValue::from_str(outcome.session_id.as_str()) {
                response.headers_mut().insert(SESSION_HEADER, value);
            }
            response
        }
        Err(Error::Invocation(e)) => {
            warn!(error = %e, "Rejected invocation");
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e) => {
            error!(error = %e, "Invocation failed");
            error_response(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use foodclaw_core::error::MemoryError;
    use foodclaw_core::memory::{ConversationEvent, MemoryRecord, MemoryStore, RecordQuery};
    use foodclaw_core::message::Message;
    use foodclaw_core::provider::{Provider, ProviderRequest, ProviderResponse};
    use foodclaw_core::tool::ToolRegistry;
    use foodclaw_memory::InMemoryStore;
    use http_body_util::BodyExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    struct CannedProvider {
        reply: Result<String, ProviderError>,
        calls: AtomicUsize,
    }

    impl CannedProvider {
        fn ok(text: &str) -> Arc<Self> {
            Arc::new(Self { reply: Ok(text.into()), calls: AtomicUsize::new(0) })
        }

        fn failing(err: ProviderError) -> Arc<Self> {
            Arc::new(Self { reply: Err(err), calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl Provider for CannedProvider {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let text = self.reply.clone()?;
            Ok(ProviderResponse {
                message: Message::assistant(text),
                usage: None,
                model: request.model,
                stop_reason: Some("end_turn".into()),
            })
        }
    }

    struct SaveFails;

    #[async_trait]
    impl MemoryStore for SaveFails {
        fn name(&self) -> &str {
            "save_fails"
        }

        async fn retrieve(&self, _query: RecordQuery) -> Result<Vec<MemoryRecord>, MemoryError> {
            Ok(Vec::new())
        }

        async fn create_event(&self, _event: ConversationEvent) -> Result<String, MemoryError> {
            Err(MemoryError::Unavailable("connection reset".into()))
        }
    }

    fn app(provider: Arc<dyn Provider>, memory: Arc<dyn MemoryStore>) -> Router {
        let runtime = AgentRuntime::from_config(&AppConfig::default(), provider, Some(memory), ToolRegistry::new());
        build_router(Arc::new(GatewayState { runtime: Arc::new(runtime) }), 1024 * 1024)
    }

    fn invocation(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/invocations")
            .header("content-type", "application/json")
            .header(SESSION_HEADER, "session-abc")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn ping_endpoint() {
        let app = app(CannedProvider::ok("unused"), Arc::new(InMemoryStore::new()));
        let req = Request::builder().uri("/ping").body(Body::empty()).unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, serde_json::json!({"status": "Healthy"}));
    }

    #[tokio::test]
    async fn invocation_returns_response_and_session() {
        let store = Arc::new(InMemoryStore::new());
        let app = app(CannedProvider::ok("Try som tam."), store.clone());

        let response = app
            .oneshot(invocation(r#"{"prompt": "Something spicy?", "actor_id": "food-lover-001"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[SESSION_HEADER], "session-abc");
        assert_eq!(json_body(response).await["response"], "Try som tam.");

        let events = store.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].session_id.as_str(), "session-abc");
    }

    #[tokio::test]
    async fn missing_actor_is_bad_request_without_calls() {
        let provider = CannedProvider::ok("unused");
        let app = app(provider.clone(), Arc::new(InMemoryStore::new()));

        let response = app.oneshot(invocation(r#"{"prompt": "hi"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("actor_id"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn non_json_body_is_bad_request() {
        let app = app(CannedProvider::ok("unused"), Arc::new(InMemoryStore::new()));
        let response = app.oneshot(invocation("prompt=hi")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn save_failure_keeps_response() {
        let app = app(CannedProvider::ok("Mango sticky rice."), Arc::new(SaveFails));
        let response = app
            .oneshot(invocation(r#"{"prompt": "Dessert?", "actor_id": "food-lover-001"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["response"], "Mango sticky rice.");
    }

    #[tokio::test]
    async fn model_failure_is_bad_gateway() {
        let app = app(
            CannedProvider::failing(ProviderError::ApiError { status_code: 500, message: "boom".into() }),
            Arc::new(InMemoryStore::new()),
        );
        let response = app
            .oneshot(invocation(r#"{"prompt": "hi", "actor_id": "a"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(json_body(response).await["error"].as_str().unwrap().contains("boom"));
    }
}
