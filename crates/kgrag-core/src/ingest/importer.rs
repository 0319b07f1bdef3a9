//! Graph import
//!
//! Loads extracted entities and edges into a graph store. Re-running an
//! import is safe: entities merge by name and edges by `(source, target, label)`.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::knowledge::{Entity, GraphStore, Relationship, UpsertOutcome};
use crate::error::Result;

/// Counts from one import run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub entities_inserted: usize,
    pub entities_updated: usize,
    pub entities_unchanged: usize,
    pub edges_inserted: usize,
    pub edges_unchanged: usize,
    /// Edges whose source or target entity does not exist
    pub edges_skipped: usize,
}

impl ImportReport {
    fn record_entity(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.entities_inserted += 1,
            UpsertOutcome::Updated => self.entities_updated += 1,
            UpsertOutcome::Unchanged | UpsertOutcome::MissingEndpoint => {
                self.entities_unchanged += 1
            }
        }
    }

    fn record_edge(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted | UpsertOutcome::Updated => self.edges_inserted += 1,
            UpsertOutcome::Unchanged => self.edges_unchanged += 1,
            UpsertOutcome::MissingEndpoint => self.edges_skipped += 1,
        }
    }
}

/// Writes entities and relationships into a graph store
pub struct GraphImporter {
    store: Arc<dyn GraphStore>,
}

impl GraphImporter {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Upsert all entities, then all edges
    pub async fn import(
        &self,
        entities: &[Entity],
        relationships: &[Relationship],
    ) -> Result<ImportReport> {
        let mut report = ImportReport::default();

        for entity in entities {
            let outcome = self.store.upsert_entity(entity).await?;
            report.record_entity(outcome);
        }

        for relationship in relationships {
            let outcome = self.store.upsert_relationship(relationship).await?;
            if outcome == UpsertOutcome::MissingEndpoint {
                warn!(edge = %relationship, "Skipping edge with unknown endpoint");
            }
            report.record_edge(outcome);
        }

        info!(
            entities = entities.len(),
            edges = relationships.len(),
            skipped = report.edges_skipped,
            "Graph import finished"
        );
        Ok(report)
    }
}
