//! Builds the model chain from configuration.
//!
//! The runtime only ever talks to the two allowed models: the primary, and
//! the fallback used when the primary is throttled.

use std::sync::Arc;
use std::time::Duration;

use foodclaw_config::AppConfig;
use foodclaw_core::error::ProviderError;
use foodclaw_core::provider::Provider;
use foodclaw_security::CredentialsProvider;

use crate::bedrock::BedrockProvider;
use crate::fallback::FallbackProvider;

/// Build the primary-then-fallback chain over one Bedrock client.
pub fn build_from_config(
    config: &AppConfig,
    credentials: Arc<dyn CredentialsProvider>,
) -> Result<Arc<dyn Provider>, ProviderError> {
    let timeout = Duration::from_secs(config.aws.request_timeout_secs);
    let allowed: Vec<String> = config
        .model
        .allowed_models()
        .iter()
        .map(|m| m.to_string())
        .collect();

    let bedrock: Arc<dyn Provider> = Arc::new(
        BedrockProvider::new(&config.aws.region, credentials, timeout)?.with_allowed_models(allowed),
    );

    Ok(Arc::new(chain_for(config, bedrock)))
}

/// Wrap `provider` in the configured fallback chain.
pub fn chain_for(config: &AppConfig, provider: Arc<dyn Provider>) -> FallbackProvider {
    let timeout = Duration::from_secs(config.aws.request_timeout_secs);
    FallbackProvider::new("bedrock-fallback")
        .with_backoff(Duration::from_secs(config.model.throttle_backoff_secs))
        .add_model(provider.clone(), config.model.primary.clone(), timeout)
        .add_model(provider, config.model.fallback.clone(), timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use foodclaw_security::{Credentials, StaticCredentials};

    #[test]
    fn chain_uses_configured_models() {
        let config = AppConfig::default();
        let creds = Arc::new(StaticCredentials::new(Credentials::new("AKID", "secret")));
        let provider = build_from_config(&config, creds).unwrap();
        assert_eq!(provider.name(), "bedrock-fallback");

        let bedrock: Arc<dyn Provider> = Arc::new(
            BedrockProvider::new(
                "us-east-1",
                Arc::new(StaticCredentials::new(Credentials::new("AKID", "secret"))),
                Duration::from_secs(1),
            )
            .unwrap(),
        );
        let chain = chain_for(&config, bedrock);
        assert_eq!(
            chain.models(),
            vec![config.model.primary.as_str(), config.model.fallback.as_str()]
        );
    }
}
