//! Embedding index construction
//!
//! Embeds `"{name}: {description}"` for every entity and the summary text
//! for every file, then writes an `IndexSnapshot`. A record whose embedding
//! fails is skipped with a warning; the rest of the build continues.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use futures_util::{StreamExt, stream};
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::knowledge::Entity;
use crate::domain::retrieval::{EmbeddingIndex, IndexSnapshot, NodeEmbedding, SummaryEmbedding};
use crate::error::{Error, Result};
use crate::llm::EmbeddingOracle;

/// Embedding requests kept in flight at once
const DEFAULT_CONCURRENCY: usize = 4;

/// Counts from one build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub nodes_embedded: usize,
    pub summaries_embedded: usize,
    pub skipped: Vec<String>,
}

/// Builds index snapshots through an embedding oracle
pub struct IndexBuilder {
    embedder: Arc<dyn EmbeddingOracle>,
    embedding_model: Option<String>,
    concurrency: usize,
}

impl IndexBuilder {
    pub fn new(embedder: Arc<dyn EmbeddingOracle>) -> Self {
        Self {
            embedder,
            embedding_model: None,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Record the model name in the snapshot
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    async fn embed_all(&self, texts: Vec<String>) -> Vec<Result<Vec<f32>>> {
        stream::iter(texts)
            .map(|text| {
                let embedder = self.embedder.clone();
                async move { embedder.embed(&text).await }
            })
            .buffered(self.concurrency)
            .collect()
            .await
    }

    /// Embed entities and summaries into a validated snapshot
    ///
    /// Ids are positional (`node_{i}`, `summary_{i}`) over the records kept.
    pub async fn build(
        &self,
        entities: &[Entity],
        summaries: &BTreeMap<String, String>,
    ) -> Result<(IndexSnapshot, BuildReport)> {
        let mut report = BuildReport::default();
        let mut snapshot = IndexSnapshot {
            built_at: Some(Utc::now()),
            embedding_model: self.embedding_model.clone(),
            ..IndexSnapshot::default()
        };

        let node_vectors = self
            .embed_all(entities.iter().map(Entity::embedding_text).collect())
            .await;
        for (entity, vector) in entities.iter().zip(node_vectors) {
            match vector {
                Ok(embedding) => {
                    snapshot.nodes.push(NodeEmbedding {
                        id: format!("node_{}", snapshot.nodes.len()),
                        name: entity.name.clone(),
                        description: entity.description.clone(),
                        embedding,
                    });
                }
                Err(e) => {
                    warn!(name = %entity.name, error = %e, "Skipping node, embedding failed");
                    report.skipped.push(entity.name.clone());
                }
            }
        }

        let summary_vectors = self.embed_all(summaries.values().cloned().collect()).await;
        for ((file_name, summary), vector) in summaries.iter().zip(summary_vectors) {
            match vector {
                Ok(embedding) => {
                    snapshot.summaries.push(SummaryEmbedding {
                        id: format!("summary_{}", snapshot.summaries.len()),
                        file_name: file_name.clone(),
                        summary: summary.clone(),
                        embedding,
                    });
                }
                Err(e) => {
                    warn!(file = %file_name, error = %e, "Skipping summary, embedding failed");
                    report.skipped.push(file_name.clone());
                }
            }
        }

        report.nodes_embedded = snapshot.nodes.len();
        report.summaries_embedded = snapshot.summaries.len();

        // Reject inconsistent vectors before anything is written
        EmbeddingIndex::from_snapshot(snapshot.clone())
            .map_err(|e| Error::IndexError(format!("built index is invalid: {}", e)))?;

        info!(
            nodes = report.nodes_embedded,
            summaries = report.summaries_embedded,
            skipped = report.skipped.len(),
            "Embedding index built"
        );
        Ok((snapshot, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingEmbedder, FixedEmbedder};

    fn entities() -> Vec<Entity> {
        vec![
            Entity::new("Pawn").with_description("a chess piece"),
            Entity::new("King").with_description("the piece to protect"),
        ]
    }

    fn summaries() -> BTreeMap<String, String> {
        BTreeMap::from([("rules.txt".to_string(), "How pieces move".to_string())])
    }

    #[tokio::test]
    async fn test_build_embeds_name_and_description() {
        let embedder = FixedEmbedder::new(vec![0.0, 1.0])
            .with("Pawn: a chess piece", vec![1.0, 0.0])
            .with("How pieces move", vec![0.5, 0.5]);
        let builder = IndexBuilder::new(Arc::new(embedder)).with_model("nomic-embed-text");

        let (snapshot, report) = builder.build(&entities(), &summaries()).await.unwrap();

        assert_eq!(report.nodes_embedded, 2);
        assert_eq!(report.summaries_embedded, 1);
        assert!(report.skipped.is_empty());
        assert_eq!(snapshot.nodes[0].id, "node_0");
        assert_eq!(snapshot.nodes[0].embedding, vec![1.0, 0.0]);
        assert_eq!(snapshot.nodes[1].embedding, vec![0.0, 1.0]);
        assert_eq!(snapshot.summaries[0].id, "summary_0");
        assert_eq!(snapshot.summaries[0].embedding, vec![0.5, 0.5]);
        assert_eq!(snapshot.embedding_model.as_deref(), Some("nomic-embed-text"));
        assert!(snapshot.built_at.is_some());
    }

    #[tokio::test]
    async fn test_failed_embeddings_are_skipped() {
        let embedder = FailingEmbedder::only(&["Pawn: a chess piece"], vec![1.0, 0.0]);
        let builder = IndexBuilder::new(Arc::new(embedder)).with_concurrency(1);

        let (snapshot, report) = builder.build(&entities(), &summaries()).await.unwrap();

        assert_eq!(report.skipped, vec!["Pawn".to_string()]);
        assert_eq!(snapshot.nodes.len(), 1);
        assert_eq!(snapshot.nodes[0].name, "King");
        assert_eq!(snapshot.nodes[0].id, "node_0");
    }

    #[tokio::test]
    async fn test_inconsistent_dimensions_rejected() {
        let embedder = FixedEmbedder::new(vec![0.0, 1.0]).with("How pieces move", vec![1.0, 0.0, 0.0]);
        let builder = IndexBuilder::new(Arc::new(embedder));

        let err = builder.build(&entities(), &summaries()).await.unwrap_err();
        assert!(matches!(err, Error::IndexError(_)));
    }

    #[tokio::test]
    async fn test_build_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("indexes").join("indexed_embeddings.json");
        let builder = IndexBuilder::new(Arc::new(FixedEmbedder::new(vec![0.3, 0.4])));

        let (snapshot, _) = builder.build(&entities(), &summaries()).await.unwrap();
        snapshot.save(&path).unwrap();

        let index = EmbeddingIndex::load(&path).unwrap();
        assert_eq!(index.nodes().len(), 2);
        assert_eq!(index.summaries().len(), 1);
    }
}
