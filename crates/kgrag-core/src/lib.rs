//! kgrag Core Library
//!
//! This crate answers natural-language questions over a knowledge base that
//! combines a property graph with vector embeddings:
//! - Query classification (relationship / local / global intent)
//! - Similarity ranking over node and summary embeddings
//! - Graph evidence retrieval (pairwise relationships, neighborhoods)
//! - Context assembly and answer generation
//! - Storage (SQLite graph store) and offline ingestion

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod infrastructure;
pub mod ingest;
pub mod llm;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;


pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::domain::knowledge::{Entity, GraphStore, Relationship};
    pub use crate::domain::retrieval::{Context, ContextAssembler, EmbeddingIndex, QueryIntent};
    pub use crate::engine::{Answer, QueryEngine};
    pub use crate::error::{Error, Result};
    pub use crate::llm::{EmbeddingOracle, LlmClient, TextOracle};
}
