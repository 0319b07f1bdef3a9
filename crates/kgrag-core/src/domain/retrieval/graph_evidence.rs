//! Graph evidence retrieval
//!
//! Point lookups against the graph store, rendered as evidence items.
//! Zero matching rows is a normal result with explicit "no relationship" /
//! "no neighbors" text; only store failures are errors.

use std::sync::Arc;

use tracing::debug;

use crate::domain::knowledge::GraphStore;
use crate::error::{Error, Result};

use super::evidence::{EvidenceItem, EvidenceKind, render_neighborhood, render_pairwise};

/// Renders pairwise and neighborhood facts from a graph store
#[derive(Clone)]
pub struct GraphEvidenceRetriever {
    store: Arc<dyn GraphStore>,
}

impl GraphEvidenceRetriever {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Both entities' descriptions and every edge between them, either direction
    pub async fn pairwise_relationship(&self, first: &str, second: &str) -> Result<EvidenceItem> {
        let pair = self
            .store
            .get_relationships_between(first, second)
            .await
            .map_err(as_lookup_error)?;

        debug!(
            first,
            second,
            forward = pair.forward.len(),
            backward = pair.backward.len(),
            "Pairwise relationship lookup"
        );

        Ok(EvidenceItem::new(
            EvidenceKind::Relationship,
            format!("{}|{}", first, second),
            render_pairwise(first, second, &pair),
        ))
    }

    /// The entity's incoming and outgoing edges with neighbor descriptions
    ///
    /// The item is unscored; the caller attaches the similarity that selected it.
    pub async fn neighborhood(&self, name: &str) -> Result<EvidenceItem> {
        let neighborhood = self
            .store
            .get_neighborhood(name)
            .await
            .map_err(as_lookup_error)?;

        debug!(
            name,
            found = neighborhood.is_some(),
            edges = neighborhood.as_ref().map_or(0, |n| n.edges.len()),
            "Neighborhood lookup"
        );

        Ok(EvidenceItem::new(
            EvidenceKind::NodeNeighborhood,
            name,
            render_neighborhood(name, neighborhood.as_ref()),
        ))
    }
}

/// Store failures always surface as `GraphLookupFailed`
fn as_lookup_error(error: Error) -> Error {
    match error {
        Error::GraphLookupFailed(msg) => Error::GraphLookupFailed(msg),
        other => Error::GraphLookupFailed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::retrieval::evidence::parse_neighborhood;
    use crate::testing::{FailingGraphStore, chess_graph};

    fn retriever() -> GraphEvidenceRetriever {
        GraphEvidenceRetriever::new(Arc::new(chess_graph()))
    }

    #[tokio::test]
    async fn test_pairwise_no_relationship_is_not_an_error() {
        let item = retriever().pairwise_relationship("King", "Queen").await.unwrap();

        assert_eq!(item.kind, EvidenceKind::Relationship);
        assert_eq!(item.rank_score, None);
        assert!(!item.text.is_empty());
        assert!(item.text.contains("No direct relationship exists between the two nodes."));
    }

    #[tokio::test]
    async fn test_pairwise_reports_stored_direction() {
        let item = retriever().pairwise_relationship("Pawn", "King").await.unwrap();

        assert!(item.text.contains("Relationship: King -[PROTECTED_BY]-> Pawn"));
        assert!(item.text.contains("Node 1 Description: a chess piece"));
    }

    #[tokio::test]
    async fn test_pairwise_unknown_entities() {
        let item = retriever().pairwise_relationship("Dragon", "Wizard").await.unwrap();
        assert!(item.text.contains("not found in graph"));
        assert!(item.text.contains("No direct relationship"));
    }

    #[tokio::test]
    async fn test_neighborhood_round_trips_store_labels() {
        let store = chess_graph();
        let expected = store.get_neighborhood("Pawn").await.unwrap().unwrap();
        let item = GraphEvidenceRetriever::new(Arc::new(store))
            .neighborhood("Pawn")
            .await
            .unwrap();

        let parsed = parse_neighborhood(&item.text).unwrap();
        assert_eq!(parsed.node, "Pawn");
        for label in expected.labels() {
            assert!(parsed.labels().contains(&label), "missing label {}", label);
        }
        assert_eq!(parsed.edges.len(), expected.edges.len());
    }

    #[tokio::test]
    async fn test_neighborhood_missing_entity() {
        let item = retriever().neighborhood("Dragon").await.unwrap();
        assert!(item.text.contains("No neighbors found for Dragon."));
    }

    #[tokio::test]
    async fn test_store_failure_is_lookup_error() {
        let retriever = GraphEvidenceRetriever::new(Arc::new(FailingGraphStore));

        let err = retriever.neighborhood("Pawn").await.unwrap_err();
        assert!(matches!(err, Error::GraphLookupFailed(_)));

        let err = retriever.pairwise_relationship("King", "Queen").await.unwrap_err();
        assert_eq!(err.code(), "E300");
    }

    #[test]
    fn test_as_lookup_error_wraps_other_errors() {
        let err = as_lookup_error(Error::Other("pool closed".to_string()));
        assert!(matches!(err, Error::GraphLookupFailed(ref msg) if msg == "pool closed"));
    }
}
