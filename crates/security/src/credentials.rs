//! AWS credential resolution.
//!
//! Two sources are supported: the standard environment variables (local runs,
//! CI), and the container credentials endpoint the AgentCore runtime exposes
//! to the process running under the execution role.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::SigningError;

const CONTAINER_HOST: &str = "http://169.254.170.2";
const REFRESH_MARGIN_SECS: i64 = 300;

/// A resolved access key pair, optionally temporary.
#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
            expires_at: None,
        }
    }

    /// True when the credentials expire within the refresh margin.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(at) => (at - now).num_seconds() < REFRESH_MARGIN_SECS,
            None => false,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("session_token", &self.session_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Something that can hand out credentials for signing.
#[async_trait]
pub trait CredentialsProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn credentials(&self) -> Result<Credentials, SigningError>;
}

/// Fixed credentials, mostly for tests.
pub struct StaticCredentials(Credentials);

impl StaticCredentials {
    pub fn new(credentials: Credentials) -> Self {
        Self(credentials)
    }
}

#[async_trait]
impl CredentialsProvider for StaticCredentials {
    fn name(&self) -> &str {
        "static"
    }

    async fn credentials(&self) -> Result<Credentials, SigningError> {
        Ok(self.0.clone())
    }
}

/// `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` / `AWS_SESSION_TOKEN`.
pub struct EnvironmentCredentials {
    credentials: Credentials,
}

impl EnvironmentCredentials {
    pub fn from_env() -> Result<Self, SigningError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, SigningError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());
        let access_key_id = non_empty("AWS_ACCESS_KEY_ID").ok_or(SigningError::MissingCredentials)?;
        let secret_access_key =
            non_empty("AWS_SECRET_ACCESS_KEY").ok_or(SigningError::MissingCredentials)?;
        let mut credentials = Credentials::new(access_key_id, secret_access_key);
        credentials.session_token = non_empty("AWS_SESSION_TOKEN");
        Ok(Self { credentials })
    }
}

#[async_trait]
impl CredentialsProvider for EnvironmentCredentials {
    fn name(&self) -> &str {
        "environment"
    }

    async fn credentials(&self) -> Result<Credentials, SigningError> {
        Ok(self.credentials.clone())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerCredentialsResponse {
    access_key_id: String,
    secret_access_key: String,
    token: Option<String>,
    expiration: Option<DateTime<Utc>>,
}

/// Temporary credentials from the container credentials endpoint, cached
/// until shortly before they expire.
pub struct ContainerCredentials {
    client: reqwest::Client,
    uri: String,
    auth_token: Option<String>,
    cached: Mutex<Option<Credentials>>,
}

impl ContainerCredentials {
    /// Returns `None` when neither container URI variable is set.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let uri = lookup("AWS_CONTAINER_CREDENTIALS_FULL_URI")
            .filter(|v| !v.is_empty())
            .or_else(|| {
                lookup("AWS_CONTAINER_CREDENTIALS_RELATIVE_URI")
                    .filter(|v| !v.is_empty())
                    .map(|rel| format!("{CONTAINER_HOST}{rel}"))
            })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Some(Self {
            client,
            uri,
            auth_token: lookup("AWS_CONTAINER_AUTHORIZATION_TOKEN").filter(|v| !v.is_empty()),
            cached: Mutex::new(None),
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    async fn fetch(&self) -> Result<Credentials, SigningError> {
        let mut request = self.client.get(&self.uri);
        if let Some(token) = &self.auth_token {
            request = request.header("Authorization", token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| SigningError::CredentialFetch(e.to_string()))?;
        if !response.status().is_success() {
            return Err(SigningError::CredentialFetch(format!(
                "credentials endpoint returned {}",
                response.status()
            )));
        }
        let body: ContainerCredentialsResponse = response
            .json()
            .await
            .map_err(|e| SigningError::CredentialFetch(e.to_string()))?;

        tracing::debug!(expires_at = ?body.expiration, "Fetched container credentials");
        Ok(Credentials {
            access_key_id: body.access_key_id,
            secret_access_key: body.secret_access_key,
            session_token: body.token,
            expires_at: body.expiration,
        })
    }
}

#[async_trait]
impl CredentialsProvider for ContainerCredentials {
    fn name(&self) -> &str {
        "container"
    }

    async fn credentials(&self) -> Result<Credentials, SigningError> {
        let mut cached = self.cached.lock().await;
        if let Some(creds) = cached.as_ref() {
            if !creds.needs_refresh(Utc::now()) {
                return Ok(creds.clone());
            }
        }
        let fresh = self.fetch().await?;
        *cached = Some(fresh.clone());
        Ok(fresh)
    }
}

/// Environment first, then the container endpoint.
pub fn default_provider() -> Result<std::sync::Arc<dyn CredentialsProvider>, SigningError> {
    if let Ok(env) = EnvironmentCredentials::from_env() {
        tracing::debug!("Using AWS credentials from environment");
        return Ok(std::sync::Arc::new(env));
    }
    if let Some(container) = ContainerCredentials::from_env() {
        tracing::debug!(uri = %container.uri(), "Using container credentials endpoint");
        return Ok(std::sync::Arc::new(container));
    }
    Err(SigningError::MissingCredentials)
}
