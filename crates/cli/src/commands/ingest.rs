//! `hydra ingest`: Add a document to a user's knowledge base.

use anyhow::{Context, bail};
use hydra_core::identity::UserId;
use hydra_pipeline::KnowledgeIngestor;
use std::path::Path;
use tracing::warn;

pub async fn run(
    path: Option<&Path>,
    file: &Path,
    user: &str,
    name: Option<&str>,
) -> anyhow::Result<()> {
    let config = super::load_config(path)?;

    let content = std::fs::read_to_string(file)
        .with_context(|| format!("FILE_MISSING: cannot read {}", file.display()))?;
    let file_name = match name {
        Some(name) => name.to_string(),
        None => file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };

    let registry = hydra_providers::build_from_config(&config);
    if registry.get(&config.context.embedding_provider).is_none() {
        warn!(
            provider = %config.context.embedding_provider,
            "Embedding provider unavailable; ingest will fail"
        );
    }
    let backend = hydra_gateway::open_backend(&config).await?;
    let ingestor = KnowledgeIngestor::from_config(&config, &registry, backend.stores.knowledge);

    match ingestor
        .ingest(&UserId::new(user), &file_name, &content, &backend.audit)
        .await
    {
        Ok(report) => {
            println!(
                "📚 Stored {} chunk(s) from {} for {user}",
                report.chunks, report.file_name
            );
            Ok(())
        }
        Err(e) => bail!("{}: {}", e.stage_code(), e.detail()),
    }
}
