//! `foodclaw memory`: Memory resource management.

use std::path::Path;
use std::time::Duration;

use foodclaw_memory::{MemoryControlClient, MemorySpec, WaitPolicy};
use foodclaw_security::{AuditEvent, AuditLogger, AuditOutcome, TracingSink};

use super::load_config;

/// Create the long-term memory resource, or reuse the one with this name.
///
/// Prints only the memory id on stdout so it can be captured into `MEMORY_ID`.
pub async fn setup(config_path: Option<&Path>, no_wait: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let spec = MemorySpec::from_config(&config.memory);

    eprintln!("🧠 Memory Setup");
    eprintln!("===============");
    eprintln!("  Name:       {}", spec.name);
    eprintln!("  Region:     {}", config.aws.region);
    eprintln!("  Strategy:   {}", spec.strategy_name);
    eprintln!("  Namespace:  {}", spec.namespace_template);
    eprintln!("  Expiry:     {} days", spec.event_expiry_days);
    eprintln!();

    let credentials = foodclaw_security::default_provider()?;
    let actor = credentials.credentials().await?.access_key_id;
    let client = MemoryControlClient::new(
        &config.aws.region,
        credentials,
        Duration::from_secs(config.aws.request_timeout_secs),
    )?;

    let policy = if no_wait { WaitPolicy::no_wait() } else { WaitPolicy::default() };
    let audit = AuditLogger::with_sinks(vec![Box::new(TracingSink)]);

    let outcome = match client.setup(&spec, policy).await {
        Ok(outcome) => outcome,
        Err(e) => {
            audit.log(
                AuditEvent::MemoryCreated { memory_id: String::new() },
                &actor,
                &spec.name,
                AuditOutcome::Failure,
                Some(e.to_string()),
            );
            return Err(e.into());
        }
    };

    if outcome.created {
        audit.log(
            AuditEvent::MemoryCreated { memory_id: outcome.memory_id.clone() },
            &actor,
            &spec.name,
            AuditOutcome::Success,
            None,
        );
        eprintln!("✅ Created memory {}", outcome.memory_id);
    } else {
        eprintln!("  Reusing existing memory {}", outcome.memory_id);
    }
    eprintln!("   Set MEMORY_ID (or memory.memory_id) to this id.\n");

    println!("{}", outcome.memory_id);
    Ok(())
}
