//! Wire types for the Ollama-compatible model server
//!
//! Only the non-streaming subset is used: `/api/generate` with
//! `stream: false` and `/api/embeddings`.

use serde::{Deserialize, Serialize};

/// Sampling options passed through to the model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// Sampling temperature (0.0 to 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Request body for `/api/generate`
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    /// Model identifier (e.g., "llama3.2")
    pub model: String,
    /// Fully rendered prompt
    pub prompt: String,
    /// Always false; the client reads the whole response at once
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<GenerateOptions>,
}

impl GenerateRequest {
    /// Create a new non-streaming generate request
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            stream: false,
            options: None,
        }
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.options = Some(GenerateOptions {
            temperature: Some(temperature),
        });
        self
    }
}

/// Response body from `/api/generate`
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    /// Model that produced the response
    #[serde(default)]
    pub model: String,
    /// Generated text
    pub response: String,
    /// Whether generation finished
    #[serde(default)]
    pub done: bool,
    /// Number of prompt tokens evaluated
    #[serde(default)]
    pub prompt_eval_count: Option<u32>,
    /// Number of generated tokens
    #[serde(default)]
    pub eval_count: Option<u32>,
}

impl GenerateResponse {
    /// Total tokens reported by the server, when present
    pub fn tokens_used(&self) -> u32 {
        self.prompt_eval_count.unwrap_or(0) + self.eval_count.unwrap_or(0)
    }
}

/// Request body for `/api/embeddings`
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingRequest {
    /// Embedding model identifier (e.g., "nomic-embed-text")
    pub model: String,
    /// Text to embed
    pub prompt: String,
}

impl EmbeddingRequest {
    /// Create a new embedding request
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
        }
    }
}

/// Response body from `/api/embeddings`
///
/// A missing `embedding` field deserializes to an empty vector so the caller
/// can report it as an embedding failure rather than a JSON error.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingResponse {
    #[serde(default)]
    pub embedding: Vec<f32>,
}

/// Model listing from `/api/tags`, used by health checks
#[derive(Debug, Clone, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<ModelTag>,
}

/// One locally available model
#[derive(Debug, Clone, Deserialize)]
pub struct ModelTag {
    pub name: String,
}
