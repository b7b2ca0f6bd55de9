//! `foodclaw provision`: render or apply the execution role.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use foodclaw_policy::{DeploymentParams, ExecutionRole};
use foodclaw_provision::{
    provision, DryRunProvisioner, IamProvisioner, Provisioner, QueryApiTransport, Template,
};
use foodclaw_security::{AuditLogger, TracingSink};

use super::{load_deploy_config, DeployArgs};

/// Print (or write) the CloudFormation template for the execution role.
pub async fn render(
    config_path: Option<&Path>,
    deploy: &DeployArgs,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_deploy_config(config_path, deploy)?;
    let params = DeploymentParams::from_config(&config)?;
    let template = Template::render_pretty(&ExecutionRole::declare(&params))?;

    match output {
        Some(path) => {
            std::fs::write(&path, format!("{template}\n"))?;
            eprintln!("✅ Wrote template for {} to {}", params.role_name(), path.display());
        }
        None => println!("{template}"),
    }
    Ok(())
}

/// Declare, lint, and apply the role; prints the result as JSON on stdout.
pub async fn apply(
    config_path: Option<&Path>,
    deploy: &DeployArgs,
    dry_run: bool,
    update_existing: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_deploy_config(config_path, deploy)?;
    let params = DeploymentParams::from_config(&config)?;
    let audit = Arc::new(AuditLogger::with_sinks(vec![Box::new(TracingSink)]));

    let provisioner: Box<dyn Provisioner> = if dry_run {
        Box::new(DryRunProvisioner::new(&params.account_id).with_audit(audit.clone()))
    } else {
        let credentials = foodclaw_security::default_provider()?;
        let actor = credentials.credentials().await?.access_key_id;
        let transport = QueryApiTransport::new(
            credentials,
            Duration::from_secs(config.aws.request_timeout_secs),
        )?;
        Box::new(
            IamProvisioner::new(Box::new(transport), &params.account_id)
                .with_update_existing(update_existing || config.deploy.update_existing)
                .with_audit(audit.clone(), actor),
        )
    };

    let output = provision(&params, provisioner.as_ref()).await?;
    eprintln!("  {} audit entries recorded", audit.count());
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
