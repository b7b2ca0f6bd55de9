//! `foodclaw onboard`: First-time setup.

use std::path::Path;

use foodclaw_config::AppConfig;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = match config_path {
        Some(path) => path.to_path_buf(),
        None => AppConfig::config_dir().join("config.toml"),
    };

    println!("🍜 FoodClaw — First-Time Setup");
    println!("==============================\n");

    if let Some(dir) = config_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
            println!("✅ Created config directory: {}", dir.display());
        } else {
            println!("  Config directory exists: {}", dir.display());
        }
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Created config.toml at: {}", config_path.display());
    println!("\n📝 Next steps:");
    println!("   1. Export AWS credentials (AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY)");
    println!("   2. Set aws.account_id, or export AWS_ACCOUNT_ID");
    println!("   3. Run: foodclaw memory setup");
    println!("   4. Put the printed id in memory.memory_id, or export MEMORY_ID");
    println!("   5. Run: foodclaw doctor");
    println!("   6. Try: foodclaw invoke --actor food-lover-001 --prompt \"What should I cook tonight?\"\n");

    Ok(())
}
