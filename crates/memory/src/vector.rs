//! Vector similarity utilities.

use hydra_core::store::{KnowledgeChunk, KnowledgeMatch};

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Mismatched lengths and zero vectors score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank chunks by cosine similarity to a query embedding.
///
/// Chunks below `min_similarity` are dropped; the rest come back best first,
/// at most `limit` of them.
pub fn top_matches<'a, I>(
    chunks: I,
    query_embedding: &[f32],
    limit: usize,
    min_similarity: f32,
) -> Vec<KnowledgeMatch>
where
    I: IntoIterator<Item = &'a KnowledgeChunk>,
{
    let mut scored: Vec<KnowledgeMatch> = chunks
        .into_iter()
        .filter_map(|chunk| {
            let similarity = cosine_similarity(&chunk.embedding, query_embedding);
            (similarity >= min_similarity).then(|| KnowledgeMatch {
                file_name: chunk.file_name.clone(),
                content: chunk.content.clone(),
                similarity,
            })
        })
        .collect();

    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(limit);
    scored
}
