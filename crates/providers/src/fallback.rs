//! Model fallback: ordered chain of (provider, model) entries.
//!
//! When the current entry is throttled, waits `base * 2^attempt` and tries the
//! next entry. Any other failure is returned as-is; a different model will
//! not fix a bad request or missing permissions.

use async_trait::async_trait;
use foodclaw_core::error::ProviderError;
use foodclaw_core::provider::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A provider that wraps an ordered list of models and falls back on throttling.
pub struct FallbackProvider {
    name: String,
    chain: Vec<FallbackEntry>,
    backoff_base: Duration,
}

/// A single entry in the fallback chain.
struct FallbackEntry {
    provider: Arc<dyn foodclaw_core::Provider>,
    /// Replaces `request.model`
    model: String,
    timeout: Duration,
}

impl FallbackProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chain: Vec::new(),
            backoff_base: Duration::from_secs(1),
        }
    }

    /// Base delay before moving to the next entry.
    pub fn with_backoff(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Add an entry that sends `model` through `provider`.
    pub fn add_model(
        mut self,
        provider: Arc<dyn foodclaw_core::Provider>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        self.chain.push(FallbackEntry {
            provider,
            model: model.into(),
            timeout,
        });
        self
    }

    /// Model ids pinned by the chain, in order.
    pub fn models(&self) -> Vec<&str> {
        self.chain.iter().map(|e| e.model.as_str()).collect()
    }

    fn backoff(&self, attempt: usize) -> Duration {
        self.backoff_base.saturating_mul(1u32 << attempt.min(16))
    }
}

#[async_trait]
impl foodclaw_core::Provider for FallbackProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let mut last_error = ProviderError::NotConfigured("No models in fallback chain".into());

        for (attempt, entry) in self.chain.iter().enumerate() {
            if attempt > 0 {
                let delay = self.backoff(attempt - 1);
                tokio::time::sleep(delay).await;
            }

            let mut req = request.clone();
            req.model = entry.model.clone();
            let model = entry.model.as_str();

            info!(
                provider = %entry.provider.name(),
                model = %model,
                attempt = attempt + 1,
                total = self.chain.len(),
                "Fallback: trying model"
            );

            match tokio::time::timeout(entry.timeout, entry.provider.complete(req)).await {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(e)) if e.is_throttle() => {
                    warn!(
                        model = %model,
                        error = %e,
                        backoff_ms = self.backoff(attempt).as_millis() as u64,
                        "Fallback: model throttled, switching"
                    );
                    last_error = e;
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    return Err(ProviderError::Timeout(format!(
                        "Model '{}' timed out after {}s",
                        model,
                        entry.timeout.as_secs()
                    )));
                }
            }
        }

        Err(last_error)
    }
}
