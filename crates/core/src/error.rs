//! Error types for the FoodClaw domain.
//!
//! One `thiserror` enum per bounded context, folded into [`Error`] with
//! `#[from]` so `?` works across crate seams.

use thiserror::Error;

/// The top-level error type for all FoodClaw operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Invocation error: {0}")]
    Invocation(#[from] InvocationError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Throttled by model service: {0}")]
    RateLimited(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not allowed: {0}")]
    ModelNotAllowed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request signing failed: {0}")]
    Signing(String),
}

impl ProviderError {
    /// Whether the error means the model service shed load.
    pub fn is_throttle(&self) -> bool {
        matches!(self, ProviderError::RateLimited(_))
    }
}

#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    #[error("Memory service unavailable: {0}")]
    Unavailable(String),

    #[error("Memory request rejected: {message} (status: {status_code})")]
    Rejected { status_code: u16, message: String },

    #[error("Memory resource not found: {0}")]
    NotFound(String),

    #[error("Malformed memory response: {0}")]
    Malformed(String),

    #[error("Request signing failed: {0}")]
    Signing(String),

    #[error("Memory resource did not become active: {0}")]
    NotReady(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

/// Errors raised while accepting an invocation, before any outbound call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationError {
    #[error("Invalid invocation payload: {0}")]
    InvalidPayload(String),

    #[error("Memory resource id is not configured")]
    MemoryNotConfigured,
}
