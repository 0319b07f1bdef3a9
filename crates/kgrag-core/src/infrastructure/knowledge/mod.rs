//! Graph store implementations
//!
//! - `SqliteGraphStore`: persistent store over the sqlx pool
//! - `InMemoryGraphStore`: map-backed store with the same merge semantics

mod memory;
mod repository;

pub use memory::InMemoryGraphStore;
pub use repository::SqliteGraphStore;
