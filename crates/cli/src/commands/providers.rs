//! `hydra providers`: Show provider availability and synthesis order.

use hydra_config::{AppConfig, ProviderKind, WELL_KNOWN_PROVIDERS, well_known};
use std::path::Path;

pub fn run(path: Option<&Path>) -> anyhow::Result<()> {
    let config = super::load_config(path)?;

    println!("🤖 LLM Providers");
    println!("================");
    println!();
    println!("  {:<12} {:<14} {:<28} {}", "name", "kind", "model", "key");
    for row in provider_rows(&config) {
        println!(
            "  {:<12} {:<14} {:<28} {}",
            row.name, row.kind, row.model, row.key
        );
    }
    println!();
    println!("  Synthesis order: {}", config.synthesis.priority.join(" → "));
    println!(
        "  Embeddings:      {} ({})",
        config.context.embedding_provider, config.context.embedding_model
    );

    Ok(())
}

struct ProviderRow {
    name: String,
    kind: &'static str,
    model: String,
    key: &'static str,
}

/// Every well-known provider, then any extra configured ones.
fn provider_rows(config: &AppConfig) -> Vec<ProviderRow> {
    let mut names: Vec<String> = WELL_KNOWN_PROVIDERS
        .iter()
        .map(|wk| wk.name.to_string())
        .collect();
    for name in config.providers.keys() {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }

    names
        .into_iter()
        .map(|name| {
            let configured = config.providers.get(&name);
            let kind = configured
                .map(|p| p.resolved_kind(&name))
                .or_else(|| well_known(&name).map(|w| w.kind));
            let kind = match kind {
                Some(ProviderKind::Anthropic) => "anthropic",
                Some(ProviderKind::Gemini) => "gemini",
                _ => "openai_compat",
            };
            let model = configured
                .and_then(|p| p.model.clone())
                .or_else(|| well_known(&name).map(|w| w.model.to_string()))
                .unwrap_or_else(|| "-".into());
            let key = match configured {
                Some(p) if p.is_available() => "present",
                Some(p) if !p.enabled => "disabled",
                _ => "missing",
            };
            ProviderRow {
                name,
                kind,
                model,
                key,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydra_config::ProviderConfig;

    #[test]
    fn lists_well_known_and_custom_providers() {
        let mut config = AppConfig::default();
        config.providers.insert(
            "anthropic".into(),
            ProviderConfig {
                api_key: Some("sk-ant".into()),
                ..ProviderConfig::default()
            },
        );
        config.providers.insert(
            "local".into(),
            ProviderConfig {
                api_key: Some("x".into()),
                model: Some("llama3".into()),
                enabled: false,
                ..ProviderConfig::default()
            },
        );

        let rows = provider_rows(&config);
        assert_eq!(rows.len(), WELL_KNOWN_PROVIDERS.len() + 1);

        let anthropic = rows.iter().find(|r| r.name == "anthropic").unwrap();
        assert_eq!((anthropic.kind, anthropic.key), ("anthropic", "present"));

        let openai = rows.iter().find(|r| r.name == "openai").unwrap();
        assert_eq!(openai.key, "missing");

        let local = rows.last().unwrap();
        assert_eq!(
            (local.name.as_str(), local.model.as_str(), local.key),
            ("local", "llama3", "disabled")
        );
    }
}
