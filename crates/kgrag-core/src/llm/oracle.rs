//! Oracle seams
//!
//! Retrieval only ever talks to models through these two traits, so tests
//! can substitute scripted doubles for the HTTP client.

use async_trait::async_trait;

use crate::error::Result;

/// Free-form text generation
#[async_trait]
pub trait TextOracle: Send + Sync {
    /// Generate a completion for a fully rendered prompt
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Fixed-length vector embeddings
#[async_trait]
pub trait EmbeddingOracle: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
