//! Tools the food agent may call.
//!
//! Only `search_food` ships today. It is registered when `tools.web_search`
//! is enabled.

pub mod web_search;

use std::time::Duration;

use foodclaw_config::AppConfig;
use foodclaw_core::tool::ToolRegistry;

pub use web_search::{DuckDuckGoBackend, SearchBackend, SearchError, SearchFoodTool, SearchHit};

/// Build the registry described by `config.tools`.
pub fn default_registry(config: &AppConfig) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    if config.tools.web_search {
        let timeout = Duration::from_secs(config.aws.request_timeout_secs.min(30));
        match DuckDuckGoBackend::new(config.tools.search_endpoint.clone(), timeout) {
            Ok(backend) => registry.register(Box::new(SearchFoodTool::new(
                Box::new(backend),
                config.tools.search_max_results,
            ))),
            Err(e) => tracing::warn!(error = %e, "search_food disabled: HTTP client unavailable"),
        }
    }
    registry
}
