//! Knowledge graph domain module
//!
//! The graph half of the knowledge base: named entities connected by
//! directed, labeled relationships.
//!
//! ## Data Model
//!
//! - **Entity**: a node keyed by its unique name, with a free-text description
//! - **Relationship**: an edge `source -[label]-> target`; identity is
//!   `(source, target, label)` so repeated ingestion merges instead of duplicating
//! - **GraphStore**: the point-lookup contract used by retrieval
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kgrag_core::domain::knowledge::{Entity, GraphStore, Relationship};
//!
//! store.upsert_entity(&Entity::new("Pawn").with_description("a chess piece")).await?;
//! store.upsert_entity(&Entity::new("ForwardStep")).await?;
//! store.upsert_relationship(&Relationship::new("Pawn", "ForwardStep", "MOVES_LIKE")).await?;
//!
//! let neighborhood = store.get_neighborhood("Pawn").await?;
//! ```

mod entity;
mod relationship;
mod repository;

pub use entity::Entity;
pub use relationship::{EdgeDirection, EdgeKey, Relationship};
pub use repository::{
    GraphStats, GraphStore, NeighborEdge, Neighborhood, PairwiseRelationships, UpsertOutcome,
};
