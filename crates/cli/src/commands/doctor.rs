//! `hydra doctor`: Diagnose configuration and store health.

use hydra_config::{AppConfig, AuthMode};
use std::path::Path;

pub async fn run(path: Option<&Path>) -> anyhow::Result<()> {
    println!("🩺 Hydra Doctor — System Diagnostics");
    println!("===================================\n");

    let mut issues = 0;

    let config_path = super::config_path(path);
    if !config_path.exists() {
        println!("  ⚠️  No config file at {} — using defaults", config_path.display());
        println!("      Run `hydra init` to create one.");
        issues += 1;
    }

    let config = match super::load_config(path) {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e:#}");
            println!("\n  ⚠️  Fix the config file and re-run.");
            return Ok(());
        }
    };

    for finding in config_findings(&config) {
        println!("  {finding}");
        if !finding.starts_with('✅') {
            issues += 1;
        }
    }

    match hydra_gateway::open_backend(&config).await {
        Ok(backend) => {
            println!("  ✅ Store reachable ({})", config.store.backend.as_str());
            match backend.stores.personas.list().await {
                Ok(personas) => {
                    if personas.iter().any(|p| p.name == config.default_persona) {
                        println!("  ✅ Default persona '{}' found", config.default_persona);
                    } else {
                        println!(
                            "  ⚠️  Default persona '{}' missing — run `hydra persona add`",
                            config.default_persona
                        );
                        issues += 1;
                    }
                }
                Err(e) => {
                    println!("  ❌ Personas unreadable: {e}");
                    issues += 1;
                }
            }
        }
        Err(e) => {
            println!("  ❌ Store unavailable: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}

/// Static checks that need no I/O.
fn config_findings(config: &AppConfig) -> Vec<String> {
    let mut findings = Vec::new();

    let available = config.available_providers();
    if available.is_empty() {
        findings.push("❌ No provider API key configured".to_string());
    } else {
        findings.push(format!("✅ Providers available: {}", available.join(", ")));
    }

    let synthesizers: Vec<&str> = config
        .synthesis
        .priority
        .iter()
        .map(String::as_str)
        .filter(|name| available.contains(name))
        .collect();
    if synthesizers.is_empty() && !available.is_empty() {
        findings.push(
            "⚠️  No provider in synthesis.priority is available; unlisted providers will synthesize"
                .to_string(),
        );
    }

    if !available.contains(&config.context.embedding_provider.as_str()) {
        findings.push(format!(
            "⚠️  Embedding provider '{}' unavailable — knowledge base disabled",
            config.context.embedding_provider
        ));
    }

    match config.auth.mode {
        AuthMode::Static if config.auth.tokens.is_empty() => {
            findings.push("⚠️  auth.tokens is empty — every API request will be rejected".into())
        }
        AuthMode::Remote if config.auth.url.is_none() => {
            findings.push("❌ auth.mode = \"remote\" requires auth.url".into())
        }
        _ => findings.push(format!("✅ Auth mode: {:?}", config.auth.mode).to_lowercase()),
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydra_config::ProviderConfig;
    use std::collections::HashMap;

    #[test]
    fn empty_config_reports_missing_keys() {
        let findings = config_findings(&AppConfig::default());
        assert!(findings[0].starts_with('❌'));
        assert!(findings.iter().any(|f| f.contains("auth.tokens is empty")));
    }

    #[test]
    fn healthy_config_passes() {
        let mut config = AppConfig::default();
        config.providers.insert(
            "openai".into(),
            ProviderConfig {
                api_key: Some("sk-test".into()),
                ..ProviderConfig::default()
            },
        );
        config.auth.tokens = HashMap::from([("t".to_string(), "u".to_string())]);

        let findings = config_findings(&config);
        assert!(findings.iter().all(|f| f.starts_with('✅')), "{findings:?}");
    }
}
