pub mod agent;
pub mod doctor;
pub mod gateway;
pub mod memory;
pub mod onboard;
pub mod policy;
pub mod provision;

use std::path::Path;

use clap::Args;
use foodclaw_config::AppConfig;

/// Deployment overrides shared by `provision` and `policy`.
///
/// Each flag also reads the variable the deploy pipeline exports.
#[derive(Args, Debug, Clone, Default)]
pub struct DeployArgs {
    /// Target region
    #[arg(long, env = "REGION")]
    pub region: Option<String>,

    /// Deployment environment (dev, staging, prod)
    #[arg(long, env = "ENVIRONMENT")]
    pub environment: Option<String>,

    /// Application name used as the resource name prefix
    #[arg(long, env = "APP_NAME")]
    pub app_name: Option<String>,

    /// 12-digit account id
    #[arg(long)]
    pub account_id: Option<String>,
}

impl DeployArgs {
    /// Apply the overrides on top of a loaded config, then re-validate.
    pub fn apply(&self, config: &mut AppConfig) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(region) = &self.region {
            config.aws.region = region.clone();
        }
        if let Some(environment) = &self.environment {
            config.deploy.environment = environment.clone();
        }
        if let Some(app_name) = &self.app_name {
            config.deploy.app_name = app_name.clone();
        }
        if let Some(account_id) = &self.account_id {
            config.aws.account_id = Some(account_id.clone());
        }
        config.validate()?;
        Ok(())
    }
}

/// Load config from `path` (or the default location) with env overrides.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => {
            let mut config = AppConfig::load_from(path)
                .map_err(|e| format!("Failed to load config: {e}"))?;
            config
                .apply_env(|key| std::env::var(key).ok())
                .map_err(|e| format!("Failed to load config: {e}"))?;
            config
        }
        None => AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?,
    };
    Ok(config)
}

/// Config for a deployment command: file, env, then flags.
pub fn load_deploy_config(
    path: Option<&Path>,
    deploy: &DeployArgs,
) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut config = load_config(path)?;
    deploy.apply(&mut config)?;
    Ok(config)
}
