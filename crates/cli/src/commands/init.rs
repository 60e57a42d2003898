//! `hydra init`: Write a default configuration file.

use anyhow::Context;
use hydra_config::AppConfig;
use std::path::Path;

pub fn run(path: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let config_path = super::config_path(path);

    if config_path.exists() && !force {
        println!("⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or re-run with --force.");
        return Ok(());
    }

    if let Some(dir) = config_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    std::fs::write(&config_path, AppConfig::default_toml())
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    println!("✅ Created config at: {}", config_path.display());
    println!();
    println!("📝 Next steps:");
    println!("   1. Export at least one key, e.g. OPENAI_API_KEY=sk-...");
    println!("   2. Add a persona: hydra persona add Janus --role \"Strategist\"");
    println!("   3. Run: hydra chat \"hello\" --user me");

    Ok(())
}
