//! `hydra serve`: Start the HTTP API server.

use std::path::Path;

pub async fn run(path: Option<&Path>, port_override: Option<u16>) -> anyhow::Result<()> {
    let mut config = super::load_config(path)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("🐍 Hydra Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Store:     {}", config.store.backend.as_str());
    println!("   Providers: {}", config.available_providers().join(", "));

    hydra_gateway::start(config).await?;

    Ok(())
}
