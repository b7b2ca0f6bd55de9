//! Invocation payload parsing and validation.
//!
//! Nothing here touches memory or the model: a payload is either turned into a
//! [`ValidatedInvocation`] or rejected with [`InvocationError::InvalidPayload`].

use foodclaw_core::error::InvocationError;
use serde::{Deserialize, Serialize};

/// Raw `{prompt, actor_id}` payload as received.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvocationRequest {
    #[serde(default)]
    pub prompt: Option<String>,

    #[serde(default)]
    pub actor_id: Option<String>,
}

/// A payload whose fields are present and non-blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedInvocation {
    pub prompt: String,
    pub actor_id: String,
}

impl InvocationRequest {
    pub fn new(prompt: impl Into<String>, actor_id: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            actor_id: Some(actor_id.into()),
        }
    }

    /// Read a payload from arbitrary JSON. Non-string fields are rejected
    /// here rather than silently dropped.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, InvocationError> {
        let object = value
            .as_object()
            .ok_or_else(|| InvocationError::InvalidPayload("payload must be a JSON object".into()))?;

        let field = |name: &str| -> Result<Option<String>, InvocationError> {
            match object.get(name) {
                None | Some(serde_json::Value::Null) => Ok(None),
                Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
                Some(_) => Err(InvocationError::InvalidPayload(format!(
                    "'{name}' must be a string"
                ))),
            }
        };

        Ok(Self {
            prompt: field("prompt")?,
            actor_id: field("actor_id")?,
        })
    }

    pub fn validate(&self) -> Result<ValidatedInvocation, InvocationError> {
        let prompt = required(self.prompt.as_deref(), "prompt")?;
        let actor_id = required(self.actor_id.as_deref(), "actor_id")?;
        Ok(ValidatedInvocation {
            prompt: prompt.to_string(),
            actor_id: actor_id.trim().to_string(),
        })
    }
}

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, InvocationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        Some(_) => Err(InvocationError::InvalidPayload(format!("'{name}' must not be blank"))),
        None => Err(InvocationError::InvalidPayload(format!("missing '{name}' field"))),
    }
}
