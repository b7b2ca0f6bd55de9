//! Memory stores for FoodClaw.
//!
//! The runtime talks to [`MemoryStore`] only. [`AgentCoreMemory`] is the real
//! backend; [`InMemoryStore`] and [`NoopMemory`] serve local runs and tests.
//! [`MemoryControlClient`] creates the memory resource itself.

pub mod agentcore;
mod client;
pub mod control;
pub mod in_memory;
pub mod noop;

use std::sync::Arc;
use std::time::Duration;

use foodclaw_config::AppConfig;
use foodclaw_core::error::{Error, InvocationError};
use foodclaw_core::memory::MemoryStore;
use foodclaw_security::CredentialsProvider;

pub use agentcore::AgentCoreMemory;
pub use client::SIGNING_SERVICE;
pub use control::{MemoryControlClient, MemorySpec, MemoryStatus, MemorySummary, SetupOutcome, WaitPolicy};
pub use in_memory::InMemoryStore;
pub use noop::NoopMemory;

/// Build the configured store.
///
/// `credentials` is only consulted for the `agentcore` backend, which also
/// needs `memory.memory_id`.
pub fn build_from_config(
    config: &AppConfig,
    credentials: impl FnOnce() -> Result<Arc<dyn CredentialsProvider>, Error>,
) -> Result<Arc<dyn MemoryStore>, Error> {
    match config.memory.backend.as_str() {
        "agentcore" => {
            let memory_id = config
                .memory
                .memory_id
                .as_deref()
                .ok_or(InvocationError::MemoryNotConfigured)?;
            let store = AgentCoreMemory::new(
                &config.aws.region,
                memory_id,
                credentials()?,
                Duration::from_secs(config.aws.request_timeout_secs),
            )?;
            tracing::info!(memory_id, region = %config.aws.region, "Using AgentCore memory");
            Ok(Arc::new(store))
        }
        "in_memory" => Ok(Arc::new(InMemoryStore::new())),
        "none" => Ok(Arc::new(NoopMemory)),
        other => Err(Error::Config {
            message: format!("unknown memory backend '{other}'"),
        }),
    }
}
