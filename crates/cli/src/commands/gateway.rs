//! `foodclaw serve`: Start the HTTP runtime.

use std::path::Path;

use super::load_config;

pub async fn run(
    config_path: Option<&Path>,
    port: Option<u16>,
    host: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(config_path)?;

    if let Some(p) = port {
        config.gateway.port = p;
    }
    if let Some(h) = host {
        config.gateway.host = h;
    }

    println!("🍜 FoodClaw runtime starting...");
    println!("   Listening on http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:  {} (fallback {})", config.model.primary, config.model.fallback);
    println!("   Memory: {}", config.memory.backend);
    println!();
    println!("   Endpoints:");
    println!("     GET  /ping         — Health check");
    println!("     POST /invocations  — {{\"prompt\": ..., \"actor_id\": ...}}");
    println!();

    foodclaw_gateway::start(config).await
}
