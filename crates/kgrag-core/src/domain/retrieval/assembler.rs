//! Context assembly
//!
//! Routes a query through classification, then either the relationship
//! short-circuit or similarity-driven local and global retrieval, and merges
//! the evidence into one ordered `Context`.
//!
//! Ordering is a function of scores alone: relationship evidence stands
//! alone, otherwise neighborhoods (best first) precede summaries (best first).
//! A slow or failing neighborhood lookup never drops summary evidence.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tracing::{debug, info, warn};

use crate::config::RetrievalConfig;
use crate::domain::knowledge::GraphStore;
use crate::error::{Error, Result};
use crate::llm::{EmbeddingOracle, TextOracle};

use super::classifier::QueryClassifier;
use super::evidence::{
    Context, EvidenceItem, EvidenceKind, render_lookup_failed, render_summary,
};
use super::graph_evidence::GraphEvidenceRetriever;
use super::index::{EmbeddingIndex, RecordPayload};
use super::intent::QueryIntent;
use super::ranker::{ScoredRecord, SimilarityRanker, top_k_distinct};

/// Neighborhood items plus the store error when no lookup reached the store
#[derive(Default)]
struct LocalEvidence {
    items: Vec<EvidenceItem>,
    store_error: Option<Error>,
}

/// Builds evidence contexts for queries
#[derive(Clone)]
pub struct ContextAssembler {
    classifier: QueryClassifier,
    ranker: SimilarityRanker,
    graph: GraphEvidenceRetriever,
    index: Arc<EmbeddingIndex>,
    graph_timeout: Duration,
    max_file_count: usize,
    concurrent: bool,
}

impl ContextAssembler {
    /// Wire the assembler from its collaborators
    pub fn new(
        text_oracle: Arc<dyn TextOracle>,
        embedder: Arc<dyn EmbeddingOracle>,
        store: Arc<dyn GraphStore>,
        index: Arc<EmbeddingIndex>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            classifier: QueryClassifier::from_config(text_oracle, config),
            ranker: SimilarityRanker::new(embedder, config.embedding_timeout()),
            graph: GraphEvidenceRetriever::new(store),
            index,
            graph_timeout: config.graph_timeout(),
            max_file_count: config.max_file_count,
            concurrent: config.concurrent_retrieval,
        }
    }

    pub fn classifier(&self) -> &QueryClassifier {
        &self.classifier
    }

    pub fn index(&self) -> &EmbeddingIndex {
        &self.index
    }

    /// Classify the query and assemble its context
    pub async fn assemble(&self, query: &str) -> Result<Context> {
        let started = Instant::now();
        let intent = self.classifier.classify(query).await;
        let context = self.assemble_with_intent(query, &intent).await?;

        info!(
            query_len = query.len(),
            %intent,
            items = context.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Context assembled"
        );
        Ok(context)
    }

    /// Assemble a context for an already classified query
    pub async fn assemble_with_intent(&self, query: &str, intent: &QueryIntent) -> Result<Context> {
        if let Some((first, second)) = intent.relationship_pair() {
            let item = self.pairwise(first, second).await?;
            return Ok(Context::new(vec![item]));
        }

        if !intent.wants_local && !intent.wants_global {
            debug!("Intent requests neither local nor global evidence");
            return Ok(Context::empty());
        }

        let query_vector = self
            .ranker
            .embed_query(query, self.index.dimension())
            .await
            .map_err(|e| Error::assembly("query embedding", e))?;

        let (local, global) = if self.concurrent {
            tokio::join!(
                self.local_evidence(&query_vector, intent),
                self.global_evidence(&query_vector, intent)
            )
        } else {
            let local = self.local_evidence(&query_vector, intent).await;
            let global = self.global_evidence(&query_vector, intent).await;
            (local, global)
        };

        let LocalEvidence { mut items, store_error } = local;
        if let Some(e) = store_error {
            if global.is_empty() {
                return Err(Error::assembly("neighborhood lookup", e));
            }
            warn!(error = %e, "Graph store unreachable, keeping summary evidence");
        }
        items.extend(global);
        Ok(Context::new(items))
    }

    async fn pairwise(&self, first: &str, second: &str) -> Result<EvidenceItem> {
        match tokio::time::timeout(self.graph_timeout, self.graph.pairwise_relationship(first, second)).await {
            Ok(result) => result.map_err(|e| Error::assembly("relationship lookup", e)),
            Err(_) => Err(Error::assembly(
                "relationship lookup",
                Error::Timeout("relationship lookup".to_string(), self.graph_timeout.as_secs()),
            )),
        }
    }

    /// Neighborhoods of the nearest nodes, best first
    ///
    /// A failed or timed-out lookup becomes a placeholder item. When every
    /// lookup fails with a store error (not a timeout) that error is kept
    /// alongside the placeholders.
    async fn local_evidence(&self, query_vector: &[f32], intent: &QueryIntent) -> LocalEvidence {
        if !intent.wants_local {
            return LocalEvidence::default();
        }

        let hits = top_k_distinct(query_vector, self.index.nodes(), intent.node_count);
        let lookups = join_all(hits.iter().map(|hit| self.scored_neighborhood(hit))).await;

        let mut items = Vec::with_capacity(lookups.len());
        let mut store_failures = 0;
        let mut store_error = None;
        for (hit, lookup) in hits.iter().zip(lookups) {
            match lookup {
                Ok(item) => items.push(item),
                Err(e) => {
                    let name = hit.record.subject_key();
                    warn!(name, error = %e, "Neighborhood lookup failed, using placeholder");
                    items.push(
                        EvidenceItem::new(
                            EvidenceKind::NodeNeighborhood,
                            name,
                            render_lookup_failed(name, &e.to_string()),
                        )
                        .with_score(hit.score),
                    );
                    if !matches!(e, Error::Timeout(..)) {
                        store_failures += 1;
                        store_error.get_or_insert(e);
                    }
                }
            }
        }

        if store_failures < items.len() {
            store_error = None;
        }

        debug!(count = items.len(), "Local evidence collected");
        LocalEvidence { items, store_error }
    }

    async fn scored_neighborhood(&self, hit: &ScoredRecord<'_>) -> Result<EvidenceItem> {
        let name = hit.record.subject_key();
        match tokio::time::timeout(self.graph_timeout, self.graph.neighborhood(name)).await {
            Ok(result) => result.map(|item| item.with_score(hit.score)),
            Err(_) => Err(Error::Timeout(
                format!("neighborhood lookup for '{}'", name),
                self.graph_timeout.as_secs(),
            )),
        }
    }

    /// Summaries of the nearest files, best first, never more than the cap
    async fn global_evidence(&self, query_vector: &[f32], intent: &QueryIntent) -> Vec<EvidenceItem> {
        if !intent.wants_global {
            return Vec::new();
        }

        let file_count = intent.file_count.min(self.max_file_count);
        let items: Vec<EvidenceItem> = top_k_distinct(query_vector, self.index.summaries(), file_count)
            .into_iter()
            .filter_map(|hit| match &hit.record.payload {
                RecordPayload::Summary { file_name, summary } => Some(
                    EvidenceItem::new(EvidenceKind::Summary, file_name.as_str(), render_summary(file_name, summary))
                        .with_score(hit.score),
                ),
                RecordPayload::Node { .. } => None,
            })
            .collect();

        debug!(count = items.len(), "Global evidence collected");
        items
    }
}
