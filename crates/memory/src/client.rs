//! Signed JSON transport shared by the AgentCore data-plane and control-plane
//! clients.

use std::sync::Arc;
use std::time::Duration;

use foodclaw_core::error::MemoryError;
use foodclaw_security::{CredentialsProvider, SigV4Signer};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};

/// AgentCore signs both planes under the same service name.
pub const SIGNING_SERVICE: &str = "bedrock-agentcore";

#[derive(Clone)]
pub(crate) struct SignedJsonClient {
    client: reqwest::Client,
    signer: SigV4Signer,
}

impl SignedJsonClient {
    pub(crate) fn new(
        region: &str,
        credentials: Arc<dyn CredentialsProvider>,
        timeout: Duration,
    ) -> Result<Self, MemoryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MemoryError::Unavailable(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            signer: SigV4Signer::new(region, SIGNING_SERVICE, credentials),
        })
    }

    pub(crate) async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Value, MemoryError> {
        let mut builder = self
            .client
            .request(method.clone(), url)
            .header("accept", "application/json");
        if let Some(body) = body {
            let bytes = serde_json::to_vec(body).map_err(|e| MemoryError::Malformed(e.to_string()))?;
            builder = builder.header("content-type", "application/json").body(bytes);
        }
        let mut request = builder
            .build()
            .map_err(|e| MemoryError::Unavailable(e.to_string()))?;
        self.signer
            .sign(&mut request)
            .await
            .map_err(|e| MemoryError::Signing(e.to_string()))?;

        debug!(method = %method, url = %url, "AgentCore request");

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| MemoryError::Unavailable(e.to_string()))?;

        let status = response.status().as_u16();
        let error_type = response
            .headers()
            .get("x-amzn-errortype")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = response
            .text()
            .await
            .map_err(|e| MemoryError::Unavailable(e.to_string()))?;

        if !(200..300).contains(&status) {
            warn!(status, error_type = ?error_type, "AgentCore request failed");
            return Err(map_status(status, error_type.as_deref(), &text));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| MemoryError::Malformed(e.to_string()))
    }
}

/// Map an AgentCore error response to a memory error.
pub(crate) fn map_status(status: u16, error_type: Option<&str>, body: &str) -> MemoryError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("Message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string());
    let kind = error_type.unwrap_or_default();

    if status == 404 || kind.contains("ResourceNotFoundException") {
        MemoryError::NotFound(message)
    } else if status == 429 || status >= 500 || kind.contains("ThrottlingException") {
        MemoryError::Unavailable(format!("{status}: {message}"))
    } else {
        MemoryError::Rejected {
            status_code: status,
            message,
        }
    }
}

/// AWS JSON timestamps arrive as epoch seconds or ISO-8601 strings.
pub(crate) fn parse_timestamp(value: &Value) -> Option<chrono::DateTime<chrono::Utc>> {
    match value {
        Value::Number(n) => {
            let secs = n.as_f64()?;
            chrono::DateTime::from_timestamp(secs.trunc() as i64, (secs.fract() * 1e9) as u32)
        }
        Value::String(s) => chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&chrono::Utc)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_mapping() {
        assert!(matches!(
            map_status(404, None, r#"{"message":"memory gone"}"#),
            MemoryError::NotFound(m) if m == "memory gone"
        ));
        assert!(matches!(map_status(400, Some("ResourceNotFoundException"), "{}"), MemoryError::NotFound(_)));
        assert!(matches!(map_status(503, None, "down"), MemoryError::Unavailable(_)));
        assert!(matches!(map_status(429, None, ""), MemoryError::Unavailable(_)));
        assert!(matches!(
            map_status(403, Some("AccessDeniedException"), r#"{"Message":"denied"}"#),
            MemoryError::Rejected { status_code: 403, message } if message == "denied"
        ));
    }

    #[test]
    fn timestamps() {
        let t = parse_timestamp(&json!(1_700_000_000.5)).unwrap();
        assert_eq!(t.timestamp(), 1_700_000_000);
        let t = parse_timestamp(&json!("2024-05-01T10:00:00Z")).unwrap();
        assert_eq!(t.timestamp(), 1_714_557_600);
        assert!(parse_timestamp(&json!(null)).is_none());
    }
}
