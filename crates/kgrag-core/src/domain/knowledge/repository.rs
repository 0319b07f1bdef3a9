//! Graph store trait
//!
//! This module defines the contract the retrieval engine relies on for graph
//! access. Reads are point lookups keyed by the unique entity name; the two
//! upserts belong to the ingestion side and exist so every backend honours
//! the same merge semantics (no duplicate edge for the same label).

use async_trait::async_trait;

use crate::error::Result;

use super::entity::Entity;
use super::relationship::{EdgeDirection, Relationship};

/// Graph store used by the query engine and the importer
///
/// Read operations fail with `Error::GraphLookupFailed` only when the store
/// cannot be reached. A lookup that matches nothing is a normal, empty result.
#[async_trait]
pub trait GraphStore: Send + Sync {
    // ========== Read Operations ==========

    /// Get an entity by name
    async fn get_entity(&self, name: &str) -> Result<Option<Entity>>;

    /// Get an entity together with all of its outgoing and incoming edges
    ///
    /// Returns `None` when no entity has this name.
    async fn get_neighborhood(&self, name: &str) -> Result<Option<Neighborhood>>;

    /// Get both entities and every edge between them, in either direction
    async fn get_relationships_between(
        &self,
        first: &str,
        second: &str,
    ) -> Result<PairwiseRelationships>;

    /// Get graph statistics
    async fn get_stats(&self) -> Result<GraphStats>;

    // ========== Write Operations (ingestion only) ==========

    /// Insert an entity, or update its description when the name exists
    async fn upsert_entity(&self, entity: &Entity) -> Result<UpsertOutcome>;

    /// Insert an edge keyed by `(source, target, label)`
    ///
    /// Both endpoints must already exist; otherwise nothing is written and
    /// `UpsertOutcome::MissingEndpoint` is returned.
    async fn upsert_relationship(&self, relationship: &Relationship) -> Result<UpsertOutcome>;
}

/// An entity and the edges that touch it
#[derive(Debug, Clone, PartialEq)]
pub struct Neighborhood {
    /// The inspected entity
    pub entity: Entity,
    /// Edges in stored order: outgoing first, then incoming
    pub edges: Vec<NeighborEdge>,
}

impl Neighborhood {
    /// Distinct labels on every edge touching the entity
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = Vec::new();
        for edge in &self.edges {
            if !labels.contains(&edge.label.as_str()) {
                labels.push(edge.label.as_str());
            }
        }
        labels
    }
}

/// One edge seen from the inspected entity
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborEdge {
    /// Direction relative to the inspected entity
    pub direction: EdgeDirection,
    /// Relationship label
    pub label: String,
    /// Entity at the other end of the edge
    pub neighbor: Entity,
}

impl NeighborEdge {
    /// Rebuild the stored edge given the inspected entity's name
    pub fn to_relationship(&self, center: &str) -> Relationship {
        match self.direction {
            EdgeDirection::Outgoing => {
                Relationship::new(center, self.neighbor.name.clone(), self.label.clone())
            }
            EdgeDirection::Incoming => {
                Relationship::new(self.neighbor.name.clone(), center, self.label.clone())
            }
        }
    }
}

/// Result of a pairwise lookup between two named entities
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairwiseRelationships {
    /// First entity, if present in the graph
    pub first: Option<Entity>,
    /// Second entity, if present in the graph
    pub second: Option<Entity>,
    /// Labels of edges `first -> second`
    pub forward: Vec<String>,
    /// Labels of edges `second -> first`
    pub backward: Vec<String>,
}

impl PairwiseRelationships {
    /// Whether any edge connects the two entities
    pub fn has_relationship(&self) -> bool {
        !self.forward.is_empty() || !self.backward.is_empty()
    }
}

/// Outcome of an idempotent write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new row was written
    Inserted,
    /// An existing row was changed
    Updated,
    /// The row already existed as given
    Unchanged,
    /// The edge refers to an entity that does not exist
    MissingEndpoint,
}

/// Statistics about the graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphStats {
    /// Total number of entities
    pub total_entities: u64,
    /// Total number of relationships
    pub total_relationships: u64,
    /// Number of distinct relationship labels
    pub distinct_labels: u64,
}
