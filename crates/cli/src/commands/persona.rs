//! `hydra persona`: Persona management.

use hydra_core::persona::Persona;
use std::path::Path;

pub async fn add(
    path: Option<&Path>,
    name: &str,
    role: &str,
    attributes: &str,
    summary: &str,
) -> anyhow::Result<()> {
    let config = super::load_config(path)?;
    let backend = hydra_gateway::open_backend(&config).await?;

    let persona = Persona::new(name.trim(), role.trim())
        .with_attributes(attributes.trim())
        .with_summary(summary.trim());
    let stored = backend.stores.personas.upsert(persona).await?;

    println!("🎭 Saved persona {} ({})", stored.name, stored.id);
    Ok(())
}

pub async fn list(path: Option<&Path>) -> anyhow::Result<()> {
    let config = super::load_config(path)?;
    let backend = hydra_gateway::open_backend(&config).await?;

    let personas = backend.stores.personas.list().await?;
    if personas.is_empty() {
        println!("   No personas yet. Add one with `hydra persona add <name> --role <role>`.");
        return Ok(());
    }

    println!("🎭 Personas");
    println!("===========");
    for persona in personas {
        let marker = if persona.name == config.default_persona {
            " (default)"
        } else {
            ""
        };
        println!("  {}{marker} — {}", persona.name, persona.role);
        if !persona.key_attributes.is_empty() {
            println!("      attributes: {}", persona.key_attributes);
        }
    }
    Ok(())
}
