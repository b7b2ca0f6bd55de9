//! AgentCore Memory control plane: create the memory resource once per
//! account and wait for it to become usable.

use std::sync::Arc;
use std::time::Duration;

use foodclaw_config::MemoryConfig;
use foodclaw_core::error::MemoryError;
use foodclaw_security::CredentialsProvider;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::client::SignedJsonClient;

const MEMORY_DESCRIPTION: &str = "Memory for food recommendation agent - stores user food preferences";

/// Lifecycle state reported by `GetMemory`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryStatus {
    Creating,
    Active,
    Failed,
    Deleting,
    Other(String),
}

impl MemoryStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "CREATING" => Self::Creating,
            "ACTIVE" => Self::Active,
            "FAILED" => Self::Failed,
            "DELETING" => Self::Deleting,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MemorySummary {
    pub id: String,
    pub arn: Option<String>,
    pub status: MemoryStatus,
}

impl MemorySummary {
    fn from_value(v: &Value) -> Result<Self, MemoryError> {
        let id = v["id"]
            .as_str()
            .ok_or_else(|| MemoryError::Malformed("memory without id".into()))?;
        Ok(Self {
            id: id.to_string(),
            arn: v["arn"].as_str().map(str::to_string),
            status: MemoryStatus::parse(v["status"].as_str().unwrap_or_default()),
        })
    }
}

/// What `memory setup` asks the service to create.
#[derive(Debug, Clone)]
pub struct MemorySpec {
    pub name: String,
    pub description: String,
    pub event_expiry_days: u32,
    pub strategy_name: String,
    pub strategy_description: String,
    pub namespace_template: String,
}

impl MemorySpec {
    pub fn from_config(config: &MemoryConfig) -> Self {
        Self {
            name: config.name.clone(),
            description: MEMORY_DESCRIPTION.into(),
            event_expiry_days: config.event_expiry_days,
            strategy_name: config.strategy_name.clone(),
            strategy_description: config.strategy_description.clone(),
            namespace_template: config.namespace_template.clone(),
        }
    }

    fn create_body(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "eventExpiryDuration": self.event_expiry_days,
            "memoryStrategies": [{
                "userPreferenceMemoryStrategy": {
                    "name": self.strategy_name,
                    "description": self.strategy_description,
                    "namespaces": [self.namespace_template],
                }
            }],
            "clientToken": uuid::Uuid::new_v4().to_string(),
        })
    }
}

/// Outcome of [`MemoryControlClient::setup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupOutcome {
    pub memory_id: String,
    /// False when an existing resource with the same name was reused
    pub created: bool,
}

/// Polling knobs for [`MemoryControlClient::wait_until_active`].
#[derive(Debug, Clone, Copy)]
pub struct WaitPolicy {
    pub poll_interval: Duration,
    pub max_wait: Duration,
}

impl WaitPolicy {
    /// Return from `setup` as soon as the create call succeeds.
    pub fn no_wait() -> Self {
        Self {
            poll_interval: Duration::ZERO,
            max_wait: Duration::ZERO,
        }
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            max_wait: Duration::from_secs(300),
        }
    }
}

pub struct MemoryControlClient {
    endpoint: String,
    http: SignedJsonClient,
}

impl MemoryControlClient {
    pub fn new(
        region: &str,
        credentials: Arc<dyn CredentialsProvider>,
        timeout: Duration,
    ) -> Result<Self, MemoryError> {
        Ok(Self {
            endpoint: format!("https://bedrock-agentcore-control.{region}.amazonaws.com"),
            http: SignedJsonClient::new(region, credentials, timeout)?,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub async fn create_memory(&self, spec: &MemorySpec) -> Result<MemorySummary, MemoryError> {
        let url = format!("{}/memories/create", self.endpoint);
        let body = self.http.send(Method::POST, &url, Some(&spec.create_body())).await?;
        MemorySummary::from_value(&body["memory"])
    }

    pub async fn get_memory(&self, memory_id: &str) -> Result<MemorySummary, MemoryError> {
        let url = format!(
            "{}/memories/{}/details",
            self.endpoint,
            urlencoding::encode(memory_id)
        );
        let body = self.http.send(Method::GET, &url, None).await?;
        MemorySummary::from_value(&body["memory"])
    }

    /// Every memory in the account/region, following pagination.
    pub async fn list_memories(&self) -> Result<Vec<MemorySummary>, MemoryError> {
        let url = format!("{}/memories/", self.endpoint);
        let mut out = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut body = json!({ "maxResults": 100 });
            if let Some(token) = &next_token {
                body["nextToken"] = json!(token);
            }
            let page = self.http.send(Method::POST, &url, Some(&body)).await?;
            if let Some(items) = page["memories"].as_array() {
                for item in items {
                    out.push(MemorySummary::from_value(item)?);
                }
            }
            next_token = page["nextToken"].as_str().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }
        Ok(out)
    }

    /// Poll until the memory is `ACTIVE`, failing on `FAILED` or timeout.
    pub async fn wait_until_active(
        &self,
        memory_id: &str,
        policy: WaitPolicy,
    ) -> Result<MemorySummary, MemoryError> {
        let started = tokio::time::Instant::now();
        loop {
            let summary = self.get_memory(memory_id).await?;
            match &summary.status {
                MemoryStatus::Active => return Ok(summary),
                MemoryStatus::Failed | MemoryStatus::Deleting => {
                    return Err(MemoryError::NotReady(format!(
                        "memory {memory_id} is {:?}",
                        summary.status
                    )));
                }
                status => {
                    if started.elapsed() + policy.poll_interval > policy.max_wait {
                        return Err(MemoryError::NotReady(format!(
                            "memory {memory_id} still {status:?} after {}s",
                            policy.max_wait.as_secs()
                        )));
                    }
                    info!(memory_id, status = ?status, "Waiting for memory to become active");
                    tokio::time::sleep(policy.poll_interval).await;
                }
            }
        }
    }

    /// Create the memory and wait for it, or reuse the one that already
    /// carries this name.
    pub async fn setup(&self, spec: &MemorySpec, policy: WaitPolicy) -> Result<SetupOutcome, MemoryError> {
        match self.create_memory(spec).await {
            Ok(summary) => {
                info!(memory_id = %summary.id, "Memory resource created");
                let memory_id = if policy.max_wait.is_zero() {
                    summary.id
                } else {
                    self.wait_until_active(&summary.id, policy).await?.id
                };
                Ok(SetupOutcome {
                    memory_id,
                    created: true,
                })
            }
            Err(e) if is_already_exists(&e) => {
                warn!(name = %spec.name, "Memory already exists, looking it up");
                let existing = self.list_memories().await?;
                let id = find_by_name(&existing, &spec.name)
                    .ok_or_else(|| MemoryError::NotFound(format!("no memory id starts with '{}'", spec.name)))?;
                info!(memory_id = %id, "Reusing existing memory");
                Ok(SetupOutcome {
                    memory_id: id.to_string(),
                    created: false,
                })
            }
            Err(e) => Err(e),
        }
    }
}

fn is_already_exists(err: &MemoryError) -> bool {
    match err {
        MemoryError::Rejected { status_code, message } => {
            *status_code == 409 || message.contains("already exists")
        }
        _ => false,
    }
}

/// Memory ids are `{name}-{suffix}`; list results carry no name.
fn find_by_name<'a>(memories: &'a [MemorySummary], name: &str) -> Option<&'a str> {
    memories
        .iter()
        .map(|m| m.id.as_str())
        .find(|id| id.starts_with(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> MemorySpec {
        MemorySpec::from_config(&MemoryConfig::default())
    }

    #[test]
    fn create_body_has_preference_strategy() {
        let body = spec().create_body();
        assert_eq!(body["name"], "FoodAgentMemory");
        assert_eq!(body["eventExpiryDuration"], 7);
        let strategy = &body["memoryStrategies"][0]["userPreferenceMemoryStrategy"];
        assert_eq!(strategy["name"], "FoodPreferences");
        assert_eq!(strategy["namespaces"][0], "user/{actorId}/food_preferences");
    }

    #[test]
    fn status_parsing() {
        assert_eq!(MemoryStatus::parse("ACTIVE"), MemoryStatus::Active);
        assert_eq!(MemoryStatus::parse("CREATING"), MemoryStatus::Creating);
        assert_eq!(MemoryStatus::parse("UPDATING"), MemoryStatus::Other("UPDATING".into()));
    }

    #[test]
    fn summary_requires_id() {
        assert!(MemorySummary::from_value(&json!({"status": "ACTIVE"})).is_err());
        let s = MemorySummary::from_value(&json!({"id": "m-1", "status": "FAILED"})).unwrap();
        assert_eq!(s.status, MemoryStatus::Failed);
    }

    #[test]
    fn already_exists_detection() {
        assert!(is_already_exists(&MemoryError::Rejected {
            status_code: 400,
            message: "Memory with name FoodAgentMemory already exists".into(),
        }));
        assert!(is_already_exists(&MemoryError::Rejected {
            status_code: 409,
            message: "Conflict".into(),
        }));
        assert!(!is_already_exists(&MemoryError::Unavailable("x".into())));
    }

    #[test]
    fn reuse_by_name_prefix() {
        let memories = vec![
            MemorySummary { id: "MovieAgentMemory-1a2b".into(), arn: None, status: MemoryStatus::Active },
            MemorySummary { id: "FoodAgentMemory-9xYz".into(), arn: None, status: MemoryStatus::Active },
        ];
        assert_eq!(find_by_name(&memories, "FoodAgentMemory"), Some("FoodAgentMemory-9xYz"));
        assert_eq!(find_by_name(&memories, "TravelMemory"), None);
    }

    #[test]
    fn default_wait_policy() {
        let p = WaitPolicy::default();
        assert_eq!(p.poll_interval, Duration::from_secs(10));
        assert_eq!(p.max_wait, Duration::from_secs(300));
        assert!(WaitPolicy::no_wait().max_wait.is_zero());
    }
}
