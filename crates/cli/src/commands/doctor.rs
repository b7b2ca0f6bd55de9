//! `foodclaw doctor`: Diagnose configuration and credentials.

use std::path::Path;

use foodclaw_config::AppConfig;
use foodclaw_policy::{lint, DeploymentParams, ExecutionRole};

use super::load_config;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 FoodClaw Doctor — System Diagnostics");
    println!("=======================================\n");

    let mut issues = 0;

    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));
    if path.exists() {
        println!("  ✅ Config file found: {}", path.display());
    } else {
        println!("  ⚠️  No config file at {} — using defaults (run `foodclaw onboard`)", path.display());
    }

    let config = match load_config(config_path) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  1 issue(s) found. Fix the config before anything else.");
            return verdict(1);
        }
    };
    println!("     Region: {}", config.aws.region);
    println!("     Models: {} → {}", config.model.primary, config.model.fallback);

    match foodclaw_security::default_provider() {
        Ok(provider) => match provider.credentials().await {
            Ok(creds) => println!("  ✅ AWS credentials ({}, key {})", provider.name(), mask(&creds.access_key_id)),
            Err(e) => {
                println!("  ❌ AWS credentials could not be fetched: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    match (config.memory.backend.as_str(), &config.memory.memory_id) {
        ("agentcore", Some(id)) => println!("  ✅ Memory id: {id}"),
        ("agentcore", None) => {
            println!("  ❌ No memory id — run `foodclaw memory setup` and set MEMORY_ID");
            issues += 1;
        }
        (backend, _) => println!("  ⚠️  Memory backend is '{backend}': preferences are not persisted across restarts"),
    }

    match DeploymentParams::from_config(&config) {
        Ok(params) => {
            println!("  ✅ Account id: {}", params.account_id);
            let report = lint(&ExecutionRole::declare(&params));
            if report.is_clean() {
                println!("  ✅ Policy declarations lint clean ({})", params.role_name());
            } else {
                println!("  ❌ Policy lint: {} finding(s) — run `foodclaw policy lint`", report.findings.len());
                issues += 1;
            }
        }
        Err(e) => {
            println!("  ⚠️  Provisioning unavailable: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    verdict(issues)
}

/// Non-zero exit when any check failed.
fn verdict(issues: usize) -> Result<(), Box<dyn std::error::Error>> {
    if issues == 0 {
        Ok(())
    } else {
        Err(format!("doctor found {issues} issue(s)").into())
    }
}

/// Show only the last four characters of a key id.
fn mask(key: &str) -> String {
    let tail: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    format!("…{tail}")
}
