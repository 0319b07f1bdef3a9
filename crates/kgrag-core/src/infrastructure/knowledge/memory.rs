//! In-memory GraphStore
//!
//! Content-keyed maps (`name` for entities, `(source, target, label)` for
//! edges) give the same merge semantics as the SQLite store. Used for tests
//! and for small graphs loaded straight from `nodes.json` / `edges.json`.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::knowledge::{
    EdgeDirection, EdgeKey, Entity, GraphStats, GraphStore, NeighborEdge, Neighborhood,
    PairwiseRelationships, Relationship, UpsertOutcome,
};
use crate::error::Result;

#[derive(Default)]
struct GraphData {
    entities: BTreeMap<String, Entity>,
    edges: BTreeSet<EdgeKey>,
}

/// Graph store held entirely in memory
#[derive(Default)]
pub struct InMemoryGraphStore {
    data: RwLock<GraphData>,
}

impl InMemoryGraphStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from entities and edges, merging duplicates
    ///
    /// Edges whose endpoints are unknown are dropped, matching `upsert_relationship`.
    pub fn from_parts(
        entities: impl IntoIterator<Item = Entity>,
        relationships: impl IntoIterator<Item = Relationship>,
    ) -> Self {
        let mut data = GraphData::default();
        for entity in entities {
            data.entities.insert(entity.name.clone(), entity);
        }
        for relationship in relationships {
            if data.entities.contains_key(&relationship.source)
                && data.entities.contains_key(&relationship.target)
            {
                data.edges.insert(relationship.key());
            }
        }
        Self {
            data: RwLock::new(data),
        }
    }
}

fn sorted_edges(mut edges: Vec<NeighborEdge>) -> Vec<NeighborEdge> {
    edges.sort_by(|a, b| {
        a.label
            .cmp(&b.label)
            .then_with(|| a.neighbor.name.cmp(&b.neighbor.name))
    });
    edges
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn get_entity(&self, name: &str) -> Result<Option<Entity>> {
        Ok(self.data.read().await.entities.get(name).cloned())
    }

    async fn get_neighborhood(&self, name: &str) -> Result<Option<Neighborhood>> {
        let data = self.data.read().await;
        let Some(entity) = data.entities.get(name).cloned() else {
            return Ok(None);
        };

        let neighbor = |other: &str| {
            data.entities
                .get(other)
                .cloned()
                .unwrap_or_else(|| Entity::new(other))
        };

        let mut outgoing = Vec::new();
        let mut incoming = Vec::new();
        for edge in &data.edges {
            if edge.source == name {
                outgoing.push(NeighborEdge {
                    direction: EdgeDirection::Outgoing,
                    label: edge.label.clone(),
                    neighbor: neighbor(&edge.target),
                });
            } else if edge.target == name {
                incoming.push(NeighborEdge {
                    direction: EdgeDirection::Incoming,
                    label: edge.label.clone(),
                    neighbor: neighbor(&edge.source),
                });
            }
        }

        let mut edges = sorted_edges(outgoing);
        edges.extend(sorted_edges(incoming));

        Ok(Some(Neighborhood { entity, edges }))
    }

    async fn get_relationships_between(
        &self,
        first: &str,
        second: &str,
    ) -> Result<PairwiseRelationships> {
        let data = self.data.read().await;

        let labels = |source: &str, target: &str| -> Vec<String> {
            data.edges
                .iter()
                .filter(|edge| edge.source == source && edge.target == target)
                .map(|edge| edge.label.clone())
                .collect()
        };

        Ok(PairwiseRelationships {
            first: data.entities.get(first).cloned(),
            second: data.entities.get(second).cloned(),
            forward: labels(first, second),
            backward: if first == second {
                Vec::new()
            } else {
                labels(second, first)
            },
        })
    }

    async fn get_stats(&self) -> Result<GraphStats> {
        let data = self.data.read().await;
        let labels: BTreeSet<&str> = data.edges.iter().map(|e| e.label.as_str()).collect();

        Ok(GraphStats {
            total_entities: data.entities.len() as u64,
            total_relationships: data.edges.len() as u64,
            distinct_labels: labels.len() as u64,
        })
    }

    async fn upsert_entity(&self, entity: &Entity) -> Result<UpsertOutcome> {
        let mut data = self.data.write().await;
        let outcome = match data.entities.get(&entity.name) {
            None => UpsertOutcome::Inserted,
            Some(existing) if existing.description == entity.description => {
                return Ok(UpsertOutcome::Unchanged);
            }
            Some(_) => UpsertOutcome::Updated,
        };
        data.entities.insert(entity.name.clone(), entity.clone());
        Ok(outcome)
    }

    async fn upsert_relationship(&self, relationship: &Relationship) -> Result<UpsertOutcome> {
        let mut data = self.data.write().await;
        if !data.entities.contains_key(&relationship.source)
            || !data.entities.contains_key(&relationship.target)
        {
            return Ok(UpsertOutcome::MissingEndpoint);
        }

        if data.edges.insert(relationship.key()) {
            Ok(UpsertOutcome::Inserted)
        } else {
            Ok(UpsertOutcome::Unchanged)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chess_store() -> InMemoryGraphStore {
        InMemoryGraphStore::from_parts(
            vec![
                Entity::new("Pawn").with_description("a chess piece"),
                Entity::new("ForwardStep").with_description("one square forward"),
                Entity::new("King").with_description("the piece to protect"),
                Entity::new("Queen").with_description("the strongest piece"),
            ],
            vec![
                Relationship::new("Pawn", "ForwardStep", "MOVES_LIKE"),
                Relationship::new("Pawn", "ForwardStep", "MOVES_LIKE"),
                Relationship::new("King", "Pawn", "PROTECTED_BY"),
                Relationship::new("Pawn", "Nowhere", "DANGLING"),
            ],
        )
    }

    #[tokio::test]
    async fn test_from_parts_merges_and_drops_dangling() {
        let store = chess_store();
        let stats = store.get_stats().await.unwrap();

        assert_eq!(stats.total_entities, 4);
        assert_eq!(stats.total_relationships, 2);
        assert_eq!(stats.distinct_labels, 2);
    }

    #[tokio::test]
    async fn test_neighborhood_ordering_matches_sqlite_store() {
        let store = chess_store();
        let neighborhood = store.get_neighborhood("Pawn").await.unwrap().unwrap();

        assert_eq!(neighborhood.edges.len(), 2);
        assert_eq!(neighborhood.edges[0].direction, EdgeDirection::Outgoing);
        assert_eq!(neighborhood.edges[0].neighbor.name, "ForwardStep");
        assert_eq!(neighborhood.edges[1].direction, EdgeDirection::Incoming);
        assert_eq!(neighborhood.edges[1].neighbor.name, "King");
    }

    #[tokio::test]
    async fn test_self_loop_reported_once() {
        let store = InMemoryGraphStore::from_parts(
            vec![Entity::new("Knight")],
            vec![Relationship::new("Knight", "Knight", "JUMPS_OVER")],
        );

        let neighborhood = store.get_neighborhood("Knight").await.unwrap().unwrap();
        assert_eq!(neighborhood.edges.len(), 1);
        assert_eq!(neighborhood.edges[0].direction, EdgeDirection::Outgoing);
    }

    #[tokio::test]
    async fn test_upserts() {
        let store = InMemoryGraphStore::new();
        let rook = Entity::new("Rook").with_description("straight lines");

        assert_eq!(store.upsert_entity(&rook).await.unwrap(), UpsertOutcome::Inserted);
        assert_eq!(store.upsert_entity(&rook).await.unwrap(), UpsertOutcome::Unchanged);
        assert_eq!(
            store
                .upsert_entity(&Entity::new("Rook").with_description("castles"))
                .await
                .unwrap(),
            UpsertOutcome::Updated
        );

        let edge = Relationship::new("Rook", "Board", "MOVES_ON");
        assert_eq!(
            store.upsert_relationship(&edge).await.unwrap(),
            UpsertOutcome::MissingEndpoint
        );

        store.upsert_entity(&Entity::new("Board")).await.unwrap();
        assert_eq!(
            store.upsert_relationship(&edge).await.unwrap(),
            UpsertOutcome::Inserted
        );
        assert_eq!(
            store.upsert_relationship(&edge).await.unwrap(),
            UpsertOutcome::Unchanged
        );
    }

    #[tokio::test]
    async fn test_relationships_between_missing_entity() {
        let store = chess_store();
        let pair = store.get_relationships_between("Pawn", "Dragon").await.unwrap();

        assert!(pair.first.is_some());
        assert!(pair.second.is_none());
        assert!(!pair.has_relationship());
    }
}
