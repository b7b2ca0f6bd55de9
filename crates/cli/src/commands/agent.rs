//! `foodclaw invoke` and `foodclaw chat`: run the agent from the terminal.
//!
//! Both go through the same [`AgentRuntime`] the HTTP runtime uses, so
//! preferences are loaded before and the turn is saved after every prompt.

use std::io::Write;
use std::path::Path;

use foodclaw_agent::{AgentRuntime, InvocationRequest};
use foodclaw_config::AppConfig;
use foodclaw_core::message::SessionId;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::load_config;

fn build(config: &AppConfig) -> Result<AgentRuntime, Box<dyn std::error::Error>> {
    foodclaw_gateway::build_runtime(config).map_err(|e| {
        eprintln!();
        eprintln!("  ERROR: could not start the agent runtime: {e}");
        eprintln!();
        eprintln!("  Check that AWS credentials are exported and, for the agentcore");
        eprintln!("  memory backend, that MEMORY_ID (or memory.memory_id) is set.");
        eprintln!("  `foodclaw doctor` lists what is missing.");
        eprintln!();
        Box::new(e) as Box<dyn std::error::Error>
    })
}

fn session(id: Option<String>) -> SessionId {
    id.as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(SessionId::from)
        .unwrap_or_default()
}

pub async fn invoke(
    config_path: Option<&Path>,
    prompt: String,
    actor: String,
    session_id: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let runtime = build(&config)?;

    let request = InvocationRequest::new(prompt, actor);
    eprint!("  Thinking...");
    let outcome = runtime.invoke(&request, Some(session(session_id))).await;
    eprint!("\r              \r");

    let outcome = outcome?;
    println!("{}", outcome.response);
    tracing::debug!(session_id = %outcome.session_id.as_str(), "Invocation complete");
    Ok(())
}

pub async fn chat(
    config_path: Option<&Path>,
    actor: String,
    session_id: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let runtime = build(&config)?;
    let session_id = session(session_id);

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        FoodClaw Agent — Interactive Mode     ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Model:     {}", config.model.primary);
    println!("  Memory:    {}", config.memory.backend);
    println!("  Tools:     {}", runtime.tool_names().join(", "));
    println!("  Actor:     {actor}");
    println!("  Session:   {}", session_id.as_str());
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }
        if !line.is_empty() {
            eprint!("  ...");
            let request = InvocationRequest::new(line, actor.clone());
            match runtime.invoke(&request, Some(session_id.clone())).await {
                Ok(outcome) => {
                    eprint!("\r     \r");
                    println!();
                    for reply_line in outcome.response.lines() {
                        println!("  Assistant > {reply_line}");
                    }
                    println!();
                }
                Err(e) => {
                    eprint!("\r     \r");
                    eprintln!("  [Error] {e}");
                    println!();
                }
            }
        }

        print!("  You > ");
        std::io::stdout().flush()?;
    }

    println!();
    println!("  Goodbye! 🍽️");
    println!();
    Ok(())
}
