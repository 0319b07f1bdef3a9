//! Similarity ranking
//!
//! Exact cosine ranking over an in-memory collection. The only I/O is the
//! single query embedding call made through `SimilarityRanker::embed_query`.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};
use crate::llm::EmbeddingOracle;

use super::index::EmbeddingRecord;

/// A record with its similarity to the query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredRecord<'a> {
    pub record: &'a EmbeddingRecord,
    pub score: f32,
}

/// Cosine similarity, clamped to [-1, 1]
///
/// Mismatched lengths and zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    (dot_product / (magnitude_a * magnitude_b)).clamp(-1.0, 1.0)
}

/// Every candidate scored, best first
///
/// The sort is stable, so equal scores keep their input order.
pub fn rank<'a>(query: &[f32], candidates: &'a [EmbeddingRecord]) -> Vec<ScoredRecord<'a>> {
    let mut scored: Vec<ScoredRecord<'a>> = candidates
        .iter()
        .map(|record| ScoredRecord {
            record,
            score: cosine_similarity(query, &record.vector),
        })
        .collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored
}

/// The `min(k, N)` most similar candidates
pub fn top_k<'a>(
    query: &[f32],
    candidates: &'a [EmbeddingRecord],
    k: usize,
) -> Vec<ScoredRecord<'a>> {
    if k == 0 {
        return Vec::new();
    }
    let mut scored = rank(query, candidates);
    scored.truncate(k);
    scored
}

/// Like `top_k`, but each subject key appears at most once
pub fn top_k_distinct<'a>(
    query: &[f32],
    candidates: &'a [EmbeddingRecord],
    k: usize,
) -> Vec<ScoredRecord<'a>> {
    if k == 0 {
        return Vec::new();
    }
    let mut seen = std::collections::HashSet::new();
    rank(query, candidates)
        .into_iter()
        .filter(|scored| seen.insert(scored.record.subject_key()))
        .take(k)
        .collect()
}

/// Produces validated query vectors
#[derive(Clone)]
pub struct SimilarityRanker {
    embedder: Arc<dyn EmbeddingOracle>,
    timeout: Duration,
}

impl SimilarityRanker {
    pub fn new(embedder: Arc<dyn EmbeddingOracle>, timeout: Duration) -> Self {
        Self { embedder, timeout }
    }

    /// Embed the query text
    ///
    /// Every failure is an `EmbeddingFailed`: oracle errors, timeouts, empty
    /// or non-finite vectors, and vectors whose length differs from
    /// `expected_dimension`.
    pub async fn embed_query(
        &self,
        query: &str,
        expected_dimension: Option<usize>,
    ) -> Result<Vec<f32>> {
        let vector = match tokio::time::timeout(self.timeout, self.embedder.embed(query)).await {
            Ok(Ok(vector)) => vector,
            Ok(Err(Error::EmbeddingFailed(msg))) => return Err(Error::EmbeddingFailed(msg)),
            Ok(Err(e)) => return Err(Error::EmbeddingFailed(e.to_string())),
            Err(_) => {
                return Err(Error::EmbeddingFailed(format!(
                    "embedding oracle timed out after {} seconds",
                    self.timeout.as_secs()
                )));
            }
        };

        if vector.is_empty() {
            return Err(Error::EmbeddingFailed("oracle returned no vector".to_string()));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(Error::EmbeddingFailed(
                "oracle returned non-finite values".to_string(),
            ));
        }
        if let Some(expected) = expected_dimension {
            if vector.len() != expected {
                return Err(Error::EmbeddingFailed(format!(
                    "query vector has {} dimensions, index has {}",
                    vector.len(),
                    expected
                )));
            }
        }

        debug!(dimension = vector.len(), "Query embedded");
        Ok(vector)
    }
}
