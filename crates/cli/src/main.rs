//! FoodClaw CLI: the main entry point.
//!
//! Commands:
//! - `onboard`:   Write a default config file
//! - `serve`:     Start the HTTP runtime (/ping, /invocations)
//! - `invoke`:    Run one invocation and print the response
//! - `chat`:      Interactive chat as one actor
//! - `provision`: Render or apply the execution role
//! - `policy`:    Show or lint the policy declarations
//! - `memory`:    Create the memory resource
//! - `doctor`:    Diagnose configuration and credentials

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "foodclaw",
    about = "FoodClaw — food recommendation agent runtime and provisioning",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file (default: ~/.foodclaw/config.toml)
    #[arg(long, global = true, env = "FOODCLAW_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Onboard,

    /// Start the HTTP runtime server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,

        /// Override the bind address
        #[arg(long)]
        host: Option<String>,
    },

    /// Run a single invocation and print the response
    Invoke {
        #[arg(short, long)]
        prompt: String,

        /// Actor whose preferences are loaded and saved
        #[arg(short, long)]
        actor: String,

        /// Session id (default: a new UUID)
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Chat interactively as one actor
    Chat {
        #[arg(short, long)]
        actor: String,

        #[arg(short, long)]
        session: Option<String>,
    },

    /// Render or apply the execution role
    Provision {
        #[command(subcommand)]
        action: ProvisionAction,

        #[command(flatten)]
        deploy: commands::DeployArgs,
    },

    /// Inspect the policy declarations
    Policy {
        #[command(subcommand)]
        action: PolicyAction,

        #[command(flatten)]
        deploy: commands::DeployArgs,
    },

    /// Manage the memory resource
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },

    /// Diagnose configuration and credentials
    Doctor,
}

#[derive(Subcommand)]
enum ProvisionAction {
    /// Print the CloudFormation template
    Render {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Create the role and put its grants via the IAM API
    Apply {
        /// Print what would be applied without calling IAM
        #[arg(long)]
        dry_run: bool,

        /// Update the role if it already exists
        #[arg(long)]
        update_existing: bool,
    },
}

#[derive(Subcommand)]
enum PolicyAction {
    /// Print the role, trust policy, and grants as JSON
    Show,

    /// Check the declarations for least privilege
    Lint,
}

#[derive(Subcommand)]
enum MemoryAction {
    /// Create the memory resource (or reuse one with the same name)
    Setup {
        /// Return as soon as the resource exists
        #[arg(long)]
        no_wait: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing; logs go to stderr so stdout stays machine-readable
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Onboard => commands::onboard::run(config_path).await?,
        Commands::Serve { port, host } => commands::gateway::run(config_path, port, host).await?,
        Commands::Invoke {
            prompt,
            actor,
            session,
        } => commands::agent::invoke(config_path, prompt, actor, session).await?,
        Commands::Chat { actor, session } => commands::agent::chat(config_path, actor, session).await?,
        Commands::Provision { action, deploy } => match action {
            ProvisionAction::Render { output } => {
                commands::provision::render(config_path, &deploy, output).await?
            }
            ProvisionAction::Apply {
                dry_run,
                update_existing,
            } => commands::provision::apply(config_path, &deploy, dry_run, update_existing).await?,
        },
        Commands::Policy { action, deploy } => match action {
            PolicyAction::Show => commands::policy::show(config_path, &deploy).await?,
            PolicyAction::Lint => commands::policy::lint(config_path, &deploy).await?,
        },
        Commands::Memory { action } => match action {
            MemoryAction::Setup { no_wait } => commands::memory::setup(config_path, no_wait).await?,
        },
        Commands::Doctor => commands::doctor::run(config_path).await?,
    }

    Ok(())
}
