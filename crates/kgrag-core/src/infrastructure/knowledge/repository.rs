//! SQLite implementation of the GraphStore
//!
//! Entities are keyed by name and edges by `(source_name, target_name, label)`,
//! so both upserts are idempotent at the schema level.

use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::domain::knowledge::{
    EdgeDirection, Entity, GraphStats, GraphStore, NeighborEdge, Neighborhood,
    PairwiseRelationships, Relationship, UpsertOutcome,
};
use crate::error::{Error, Result};

/// SQLite implementation of the graph store
#[derive(Clone)]
pub struct SqliteGraphStore {
    pool: SqlitePool,
}

impl SqliteGraphStore {
    /// Create a new SQLite graph store over a migrated pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn labels_between(&self, source: &str, target: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT label FROM relationships WHERE source_name = ? AND target_name = ? ORDER BY label",
        )
        .bind(source)
        .bind(target)
        .fetch_all(&self.pool)
        .await
        .map_err(lookup_failed)?;

        Ok(rows.into_iter().map(|(label,)| label).collect())
    }
}

/// Reads surface transport failures as graph lookup errors
fn lookup_failed(err: sqlx::Error) -> Error {
    Error::GraphLookupFailed(err.to_string())
}

#[async_trait]
impl GraphStore for SqliteGraphStore {
    // ========== Read Operations ==========

    async fn get_entity(&self, name: &str) -> Result<Option<Entity>> {
        let row: Option<EntityRow> =
            sqlx::query_as("SELECT name, description FROM entities WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .map_err(lookup_failed)?;

        Ok(row.map(EntityRow::into_entity))
    }

    async fn get_neighborhood(&self, name: &str) -> Result<Option<Neighborhood>> {
        let Some(entity) = self.get_entity(name).await? else {
            return Ok(None);
        };

        // Self-loops are reported once, as outgoing
        let rows: Vec<EdgeRow> = sqlx::query_as(
            r#"
            SELECT 0 AS direction, r.label AS label, e.name AS name, e.description AS description
            FROM relationships r
            JOIN entities e ON e.name = r.target_name
            WHERE r.source_name = ?1
            UNION ALL
            SELECT 1 AS direction, r.label AS label, e.name AS name, e.description AS description
            FROM relationships r
            JOIN entities e ON e.name = r.source_name
            WHERE r.target_name = ?1 AND r.source_name <> r.target_name
            ORDER BY direction, label, name
            "#,
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await
        .map_err(lookup_failed)?;

        debug!(entity = %name, edges = rows.len(), "Neighborhood fetched");

        Ok(Some(Neighborhood {
            entity,
            edges: rows.into_iter().map(EdgeRow::into_edge).collect(),
        }))
    }

    async fn get_relationships_between(
        &self,
        first: &str,
        second: &str,
    ) -> Result<PairwiseRelationships> {
        let first_entity = self.get_entity(first).await?;
        let second_entity = self.get_entity(second).await?;

        let forward = self.labels_between(first, second).await?;
        let backward = if first == second {
            Vec::new()
        } else {
            self.labels_between(second, first).await?
        };

        Ok(PairwiseRelationships {
            first: first_entity,
            second: second_entity,
            forward,
            backward,
        })
    }

    async fn get_stats(&self) -> Result<GraphStats> {
        let (entities,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM entities")
            .fetch_one(&self.pool)
            .await
            .map_err(lookup_failed)?;
        let (relationships, labels): (i64, i64) =
            sqlx::query_as("SELECT COUNT(*), COUNT(DISTINCT label) FROM relationships")
                .fetch_one(&self.pool)
                .await
                .map_err(lookup_failed)?;

        Ok(GraphStats {
            total_entities: entities as u64,
            total_relationships: relationships as u64,
            distinct_labels: labels as u64,
        })
    }

    // ========== Write Operations ==========

    async fn upsert_entity(&self, entity: &Entity) -> Result<UpsertOutcome> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<(String,)> =
            sqlx::query_as("SELECT description FROM entities WHERE name = ?")
                .bind(&entity.name)
                .fetch_optional(&mut *tx)
                .await?;

        let outcome = match existing {
            None => {
                sqlx::query("INSERT INTO entities (name, description) VALUES (?, ?)")
                    .bind(&entity.name)
                    .bind(&entity.description)
                    .execute(&mut *tx)
                    .await?;
                UpsertOutcome::Inserted
            }
            Some((description,)) if description == entity.description => UpsertOutcome::Unchanged,
            Some(_) => {
                sqlx::query("UPDATE entities SET description = ? WHERE name = ?")
                    .bind(&entity.description)
                    .bind(&entity.name)
                    .execute(&mut *tx)
                    .await?;
                UpsertOutcome::Updated
            }
        };

        tx.commit().await?;

        debug!(entity = %entity.name, outcome = ?outcome, "Entity upserted");
        Ok(outcome)
    }

    async fn upsert_relationship(&self, relationship: &Relationship) -> Result<UpsertOutcome> {
        let (endpoints,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM entities WHERE name IN (?, ?)")
                .bind(&relationship.source)
                .bind(&relationship.target)
                .fetch_one(&self.pool)
                .await?;

        let expected = if relationship.source == relationship.target {
            1
        } else {
            2
        };
        if endpoints < expected {
            debug!(edge = %relationship, "Skipping edge with missing endpoint");
            return Ok(UpsertOutcome::MissingEndpoint);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO relationships (source_name, target_name, label)
            VALUES (?, ?, ?)
            ON CONFLICT(source_name, target_name, label) DO NOTHING
            "#,
        )
        .bind(&relationship.source)
        .bind(&relationship.target)
        .bind(&relationship.label)
        .execute(&self.pool)
        .await?;

        let outcome = if result.rows_affected() > 0 {
            UpsertOutcome::Inserted
        } else {
            UpsertOutcome::Unchanged
        };

        debug!(edge = %relationship, outcome = ?outcome, "Relationship upserted");
        Ok(outcome)
    }
}

// ========== Database Row Types ==========

#[derive(Debug, FromRow)]
struct EntityRow {
    name: String,
    description: String,
}

impl EntityRow {
    fn into_entity(self) -> Entity {
        Entity {
            name: self.name,
            description: self.description,
        }
    }
}

#[derive(Debug, FromRow)]
struct EdgeRow {
    direction: i64,
    label: String,
    name: String,
    description: String,
}

impl EdgeRow {
    fn into_edge(self) -> NeighborEdge {
        NeighborEdge {
            direction: if self.direction == 0 {
                EdgeDirection::Outgoing
            } else {
                EdgeDirection::Incoming
            },
            label: self.label,
            neighbor: Entity {
                name: self.name,
                description: self.description,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    async fn setup_test_store() -> (Database, SqliteGraphStore) {
        let db = Database::in_memory()
            .await
            .expect("Failed to create in-memory database");
        let store = SqliteGraphStore::new(db.pool().clone());
        (db, store)
    }

    async fn seed_chess(store: &SqliteGraphStore) {
        for (name, description) in [
            ("Pawn", "a chess piece"),
            ("ForwardStep", "one square forward"),
            ("Queen", "the strongest piece"),
            ("King", "the piece to protect"),
        ] {
            store
                .upsert_entity(&Entity::new(name).with_description(description))
                .await
                .unwrap();
        }
        store
            .upsert_relationship(&Relationship::new("Pawn", "ForwardStep", "MOVES_LIKE"))
            .await
            .unwrap();
        store
            .upsert_relationship(&Relationship::new("Pawn", "Queen", "PROMOTES_TO"))
            .await
            .unwrap();
        store
            .upsert_relationship(&Relationship::new("King", "Pawn", "PROTECTED_BY"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_get_entity() {
        let (_db, store) = setup_test_store().await;
        seed_chess(&store).await;

        let pawn = store.get_entity("Pawn").await.unwrap().unwrap();
        assert_eq!(pawn.description, "a chess piece");
        assert!(store.get_entity("Dragon").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_entity_outcomes() {
        let (_db, store) = setup_test_store().await;
        let pawn = Entity::new("Pawn").with_description("a chess piece");

        assert_eq!(store.upsert_entity(&pawn).await.unwrap(), UpsertOutcome::Inserted);
        assert_eq!(store.upsert_entity(&pawn).await.unwrap(), UpsertOutcome::Unchanged);

        let updated = Entity::new("Pawn").with_description("the smallest piece");
        assert_eq!(store.upsert_entity(&updated).await.unwrap(), UpsertOutcome::Updated);
        assert_eq!(
            store.get_entity("Pawn").await.unwrap().unwrap().description,
            "the smallest piece"
        );
        assert_eq!(store.get_stats().await.unwrap().total_entities, 1);
    }

    #[tokio::test]
    async fn test_upsert_relationship_is_idempotent() {
        let (_db, store) = setup_test_store().await;
        seed_chess(&store).await;

        let edge = Relationship::new("Pawn", "ForwardStep", "MOVES_LIKE");
        assert_eq!(
            store.upsert_relationship(&edge).await.unwrap(),
            UpsertOutcome::Unchanged
        );

        // Same pair, different label is a separate edge
        let other = Relationship::new("Pawn", "ForwardStep", "STARTS_WITH");
        assert_eq!(
            store.upsert_relationship(&other).await.unwrap(),
            UpsertOutcome::Inserted
        );

        let stats = store.get_stats().await.unwrap();
        assert_eq!(stats.total_relationships, 4);
        assert_eq!(stats.distinct_labels, 4);
    }

    #[tokio::test]
    async fn test_upsert_relationship_missing_endpoint() {
        let (_db, store) = setup_test_store().await;
        seed_chess(&store).await;

        let edge = Relationship::new("Pawn", "Dragon", "FIGHTS");
        assert_eq!(
            store.upsert_relationship(&edge).await.unwrap(),
            UpsertOutcome::MissingEndpoint
        );
    }

    #[tokio::test]
    async fn test_neighborhood_includes_both_directions() {
        let (_db, store) = setup_test_store().await;
        seed_chess(&store).await;

        let neighborhood = store.get_neighborhood("Pawn").await.unwrap().unwrap();
        assert_eq!(neighborhood.entity.name, "Pawn");
        assert_eq!(neighborhood.edges.len(), 3);

        // Outgoing edges come first, sorted by label
        assert_eq!(neighborhood.edges[0].direction, EdgeDirection::Outgoing);
        assert_eq!(neighborhood.edges[0].label, "MOVES_LIKE");
        assert_eq!(neighborhood.edges[0].neighbor.name, "ForwardStep");
        assert_eq!(neighborhood.edges[0].neighbor.description, "one square forward");
        assert_eq!(neighborhood.edges[1].label, "PROMOTES_TO");

        assert_eq!(neighborhood.edges[2].direction, EdgeDirection::Incoming);
        assert_eq!(
            neighborhood.edges[2].to_relationship("Pawn"),
            Relationship::new("King", "Pawn", "PROTECTED_BY")
        );
    }

    #[tokio::test]
    async fn test_neighborhood_of_isolated_and_missing_entities() {
        let (_db, store) = setup_test_store().await;
        store.upsert_entity(&Entity::new("Lonely")).await.unwrap();

        let lonely = store.get_neighborhood("Lonely").await.unwrap().unwrap();
        assert!(lonely.edges.is_empty());
        assert!(store.get_neighborhood("Ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_relationships_between() {
        let (_db, store) = setup_test_store().await;
        seed_chess(&store).await;

        let pair = store.get_relationships_between("Pawn", "King").await.unwrap();
        assert!(pair.has_relationship());
        assert!(pair.forward.is_empty());
        assert_eq!(pair.backward, vec!["PROTECTED_BY".to_string()]);
        assert_eq!(pair.first.unwrap().name, "Pawn");

        let none = store.get_relationships_between("King", "Queen").await.unwrap();
        assert!(!none.has_relationship());
        assert!(none.first.is_some());
        assert!(none.second.is_some());
    }

    #[tokio::test]
    async fn test_closed_pool_is_lookup_failure() {
        let (db, store) = setup_test_store().await;
        db.close().await;

        let err = store.get_entity("Pawn").await.unwrap_err();
        assert!(matches!(err, Error::GraphLookupFailed(_)));
    }
}
