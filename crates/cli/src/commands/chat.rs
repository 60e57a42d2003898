//! `hydra chat`: Send one message through the synthesis pipeline.

use anyhow::bail;
use hydra_core::identity::UserId;
use hydra_pipeline::{ChatRequest, HydraPipeline};
use std::path::Path;
use tracing::debug;

pub async fn run(
    path: Option<&Path>,
    user: &str,
    message: String,
    persona: Option<String>,
    image_url: Option<String>,
) -> anyhow::Result<()> {
    let config = super::load_config(path)?;

    let registry = hydra_providers::build_from_config(&config);
    if registry.is_empty() {
        eprintln!();
        eprintln!("  ERROR: No provider API key configured!");
        eprintln!();
        eprintln!("  Set one of: OPENAI_API_KEY, CLAUDE_API_KEY, GEMINI_API_KEY,");
        eprintln!("              GROK_API_KEY, DEEPSEEK_API_KEY");
        eprintln!("  or add [providers.<name>] api_key to your config file.");
        eprintln!();
        bail!("NO_PROVIDERS_CONFIGURED");
    }

    let backend = hydra_gateway::open_backend(&config).await?;
    let pipeline = HydraPipeline::from_config(&config, registry, backend.stores, backend.audit);

    let mut request = ChatRequest::new(message);
    request.persona_name = persona;
    request.image_url = image_url;

    eprint!("  Synthesizing...");
    let outcome = pipeline.handle(&UserId::new(user), request).await;
    eprint!("\r                 \r");

    match outcome {
        Ok(reply) => {
            debug!(persona = %reply.persona, chars = reply.reply.len(), "Reply received");
            println!("{} > {}", reply.persona, reply.reply);
            Ok(())
        }
        Err(e) => bail!("{}: {}", e.stage_code(), e.detail()),
    }
}
