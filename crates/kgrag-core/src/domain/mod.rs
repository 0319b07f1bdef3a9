//! Domain layer
//!
//! - `knowledge`: entities, relationships and the graph store contract
//! - `retrieval`: query routing, ranking and context assembly

pub mod knowledge;
pub mod retrieval;
