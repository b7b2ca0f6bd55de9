//! Configuration loading, validation, and management for FoodClaw.
//!
//! Loads configuration from `~/.foodclaw/config.toml` with environment
//! variable overrides, so the same binary runs locally and inside a managed
//! runtime that only injects environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.foodclaw/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Account, region, and HTTP client settings
    #[serde(default)]
    pub aws: AwsConfig,

    /// The two allowed foundation models
    #[serde(default)]
    pub model: ModelConfig,

    /// Memory resource settings
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Agent behavior
    #[serde(default)]
    pub agent: AgentSettings,

    /// Tool toggles
    #[serde(default)]
    pub tools: ToolsConfig,

    /// HTTP runtime server
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Provisioning parameters
    #[serde(default)]
    pub deploy: DeployConfig,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    #[serde(default = "default_region")]
    pub region: String,

    /// Twelve-digit account id; needed for provisioning and ARNs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,

    /// Per-request timeout for every outbound AWS call
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_region() -> String {
    "us-east-1".into()
}
fn default_request_timeout() -> u64 {
    120
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            account_id: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model used for every invocation
    #[serde(default = "default_primary_model")]
    pub primary: String,

    /// Model tried when the primary is throttled
    #[serde(default = "default_fallback_model")]
    pub fallback: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Base of the exponential backoff before a fallback attempt
    #[serde(default = "default_backoff_secs")]
    pub throttle_backoff_secs: u64,
}

fn default_primary_model() -> String {
    "us.anthropic.claude-3-5-haiku-20241022-v1:0".into()
}
fn default_fallback_model() -> String {
    "amazon.nova-pro-v1:0".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_backoff_secs() -> u64 {
    1
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            primary: default_primary_model(),
            fallback: default_fallback_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            throttle_backoff_secs: default_backoff_secs(),
        }
    }
}

impl ModelConfig {
    /// Both model identifiers the execution role may invoke, primary first.
    pub fn allowed_models(&self) -> [&str; 2] {
        [self.primary.as_str(), self.fallback.as_str()]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// "agentcore", "in_memory", or "none"
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    /// Pre-created memory resource id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_id: Option<String>,

    /// Resource name used by `memory setup`
    #[serde(default = "default_memory_name")]
    pub name: String,

    #[serde(default = "default_namespace_template")]
    pub namespace_template: String,

    /// Semantic query used to pull preference records
    #[serde(default = "default_retrieval_query")]
    pub retrieval_query: String,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_event_expiry_days")]
    pub event_expiry_days: u32,

    #[serde(default = "default_strategy_name")]
    pub strategy_name: String,

    #[serde(default = "default_strategy_description")]
    pub strategy_description: String,
}

fn default_memory_backend() -> String {
    "agentcore".into()
}
fn default_memory_name() -> String {
    "FoodAgentMemory".into()
}
fn default_namespace_template() -> String {
    "user/{actorId}/food_preferences".into()
}
fn default_retrieval_query() -> String {
    "food preferences cuisines dietary restrictions favorites".into()
}
fn default_top_k() -> usize {
    3
}
fn default_event_expiry_days() -> u32 {
    7
}
fn default_strategy_name() -> String {
    "FoodPreferences".into()
}
fn default_strategy_description() -> String {
    "Captures food preferences including cuisines, dietary restrictions, favorite dishes, \
     and specific foods the user likes or dislikes"
        .into()
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            memory_id: None,
            name: default_memory_name(),
            namespace_template: default_namespace_template(),
            retrieval_query: default_retrieval_query(),
            top_k: default_top_k(),
            event_expiry_days: default_event_expiry_days(),
            strategy_name: default_strategy_name(),
            strategy_description: default_strategy_description(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Replaces the built-in system prompt when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,

    /// Maximum model round-trips spent on tool calls per invocation
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,
}

fn default_max_tool_iterations() -> u32 {
    8
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            system_prompt_override: None,
            max_tool_iterations: default_max_tool_iterations(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_true")]
    pub web_search: bool,

    #[serde(default = "default_search_endpoint")]
    pub search_endpoint: String,

    #[serde(default = "default_search_max_results")]
    pub search_max_results: usize,
}

fn default_search_endpoint() -> String {
    "https://api.duckduckgo.com/".into()
}
fn default_search_max_results() -> usize {
    5
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            web_search: true,
            search_endpoint: default_search_endpoint(),
            search_max_results: default_search_max_results(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Maximum accepted request body in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_port() -> u16 {
    8080
}
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_body_limit() -> usize {
    64 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,

    #[serde(default = "default_environment")]
    pub environment: String,

    /// Re-apply grants when the role already exists instead of failing
    #[serde(default)]
    pub update_existing: bool,
}

fn default_app_name() -> String {
    "food-agent".into()
}
fn default_environment() -> String {
    "dev".into()
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            environment: default_environment(),
            update_existing: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.foodclaw/config.toml),
    /// then apply environment overrides:
    ///
    /// - `AWS_REGION` / `AWS_DEFAULT_REGION`
    /// - `AWS_ACCOUNT_ID`
    /// - `MODEL_ID`, `FALLBACK_MODEL_ID`
    /// - `MEMORY_ID`
    /// - `FOODCLAW_PORT`, `FOODCLAW_ENVIRONMENT`, `FOODCLAW_APP_NAME`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides from `lookup`, then re-validate.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(region) = lookup("AWS_REGION").or_else(|| lookup("AWS_DEFAULT_REGION")) {
            self.aws.region = region;
        }
        if let Some(account) = lookup("AWS_ACCOUNT_ID") {
            self.aws.account_id = Some(account);
        }
        if let Some(model) = lookup("MODEL_ID") {
            self.model.primary = model;
        }
        if let Some(model) = lookup("FALLBACK_MODEL_ID") {
            self.model.fallback = model;
        }
        if let Some(memory_id) = lookup("MEMORY_ID").filter(|v| !v.trim().is_empty()) {
            self.memory.memory_id = Some(memory_id);
        }
        if let Some(port) = lookup("FOODCLAW_PORT") {
            self.gateway.port = port.parse().map_err(|_| {
                ConfigError::ValidationError(format!("FOODCLAW_PORT is not a port: {port}"))
            })?;
        }
        if let Some(env) = lookup("FOODCLAW_ENVIRONMENT") {
            self.deploy.environment = env;
        }
        if let Some(name) = lookup("FOODCLAW_APP_NAME") {
            self.deploy.app_name = name;
        }
        self.validate()
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".foodclaw")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.model.temperature) {
            return Err(ConfigError::ValidationError(
                "model.temperature must be between 0.0 and 1.0".into(),
            ));
        }

        if self.model.primary.trim().is_empty() || self.model.fallback.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "model.primary and model.fallback must both be set".into(),
            ));
        }

        if self.model.primary == self.model.fallback {
            return Err(ConfigError::ValidationError(
                "model.primary and model.fallback must name two different models".into(),
            ));
        }

        if !matches!(self.memory.backend.as_str(), "agentcore" | "in_memory" | "none") {
            return Err(ConfigError::ValidationError(format!(
                "memory.backend must be agentcore, in_memory, or none (got '{}')",
                self.memory.backend
            )));
        }

        if !self.memory.namespace_template.contains("{actorId}") {
            return Err(ConfigError::ValidationError(
                "memory.namespace_template must contain {actorId}".into(),
            ));
        }

        if self.memory.top_k == 0 {
            return Err(ConfigError::ValidationError("memory.top_k must be > 0".into()));
        }

        if self.agent.max_tool_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_tool_iterations must be > 0".into(),
            ));
        }

        if let Some(account) = &self.aws.account_id {
            if account.len() != 12 || !account.chars().all(|c| c.is_ascii_digit()) {
                return Err(ConfigError::ValidationError(format!(
                    "aws.account_id must be 12 digits (got '{account}')"
                )));
            }
        }

        if !is_name_segment(&self.deploy.app_name) || !is_name_segment(&self.deploy.environment) {
            return Err(ConfigError::ValidationError(
                "deploy.app_name and deploy.environment may only contain letters, digits, and '-'".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `onboard`).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            aws: AwsConfig::default(),
            model: ModelConfig::default(),
            memory: MemoryConfig::default(),
            agent: AgentSettings::default(),
            tools: ToolsConfig::default(),
            gateway: GatewayConfig::default(),
            deploy: DeployConfig::default(),
        }
    }
}

fn is_name_segment(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.aws.region, "us-east-1");
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.deploy.environment, "dev");
        assert_eq!(config.memory.top_k, 3);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model.primary, config.model.primary);
        assert_eq!(parsed.memory.namespace_template, config.memory.namespace_template);
    }

    #[test]
    fn identical_models_rejected() {
        let mut config = AppConfig::default();
        config.model.fallback = config.model.primary.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn namespace_without_actor_rejected() {
        let mut config = AppConfig::default();
        config.memory.namespace_template = "shared/food".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_account_id_rejected() {
        let mut config = AppConfig::default();
        config.aws.account_id = Some("12345".into());
        assert!(config.validate().is_err());
        config.aws.account_id = Some("123456789012".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("AWS_REGION", "us-west-2"),
            ("MODEL_ID", "us.anthropic.claude-3-haiku-20240307-v1:0"),
            ("MEMORY_ID", "FoodAgentMemory-abc123"),
            ("FOODCLAW_PORT", "9000"),
            ("FOODCLAW_ENVIRONMENT", "prod"),
        ]);
        let mut config = AppConfig::default();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.aws.region, "us-west-2");
        assert_eq!(config.model.primary, "us.anthropic.claude-3-haiku-20240307-v1:0");
        assert_eq!(config.memory.memory_id.as_deref(), Some("FoodAgentMemory-abc123"));
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.deploy.environment, "prod");
    }

    #[test]
    fn blank_memory_id_env_ignored() {
        let mut config = AppConfig::default();
        config
            .apply_env(|k| (k == "MEMORY_ID").then(|| "  ".to_string()))
            .unwrap();
        assert!(config.memory.memory_id.is_none());
    }

    #[test]
    fn invalid_port_env_rejected() {
        let mut config = AppConfig::default();
        let result = config.apply_env(|k| (k == "FOODCLAW_PORT").then(|| "eighty".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.memory.backend, "agentcore");
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[aws]
region = "eu-central-1"
account_id = "123456789012"

[memory]
backend = "in_memory"
top_k = 5

[deploy]
app_name = "menu-bot"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.aws.region, "eu-central-1");
        assert_eq!(config.memory.backend, "in_memory");
        assert_eq!(config.memory.top_k, 5);
        assert_eq!(config.deploy.app_name, "menu-bot");
        assert_eq!(config.deploy.environment, "dev");
    }

    #[test]
    fn unknown_backend_in_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[memory]\nbackend = \"redis\"\n").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("us-east-1"));
        assert!(toml_str.contains("food_preferences"));
    }
}
