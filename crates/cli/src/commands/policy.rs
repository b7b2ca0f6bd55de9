//! CLI commands for inspecting the execution role's policy declarations.

use std::path::Path;

use foodclaw_policy::{lint as lint_role, DeploymentParams, ExecutionRole};

use super::{load_deploy_config, DeployArgs};

/// Print the declared role, trust policy, and grants as JSON.
pub async fn show(config_path: Option<&Path>, deploy: &DeployArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_deploy_config(config_path, deploy)?;
    let params = DeploymentParams::from_config(&config)?;
    let role = ExecutionRole::declare(&params);

    let mut value = serde_json::to_value(&role)?;
    value["arn"] = serde_json::Value::String(params.role_arn());
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

/// Lint the declarations; any finding makes the command fail.
pub async fn lint(config_path: Option<&Path>, deploy: &DeployArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_deploy_config(config_path, deploy)?;
    let params = DeploymentParams::from_config(&config)?;
    let role = ExecutionRole::declare(&params);
    let report = lint_role(&role);

    println!("Execution role {} ({} grants):\n", role.name, role.grants.len());
    for (i, grant) in role.grants.iter().enumerate() {
        println!(
            "  {}. {} ({} actions, {} resources)",
            i + 1,
            grant.name,
            grant.document.actions().count(),
            grant.document.resources().count()
        );
    }
    println!();

    if report.is_clean() {
        println!("✅ No findings.");
        return Ok(());
    }

    println!("❌ {} finding(s):\n", report.findings.len());
    for finding in &report.findings {
        println!("  - {finding}");
    }
    Err(format!("policy lint failed with {} finding(s)", report.findings.len()).into())
}
