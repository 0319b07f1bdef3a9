//! Model oracles - Ollama-compatible server
//!
//! This module provides:
//! - `TextOracle` / `EmbeddingOracle`: the seams retrieval depends on
//! - `LlmClient`: HTTP implementation of both against a local model server
//! - Prompt templates for classification and answer generation

mod client;
mod oracle;
mod prompt;
mod types;

pub use client::{LlmClient, LlmClientBuilder};
pub use oracle::{EmbeddingOracle, TextOracle};
pub use prompt::{ANSWER_TEMPLATE, CLASSIFICATION_TEMPLATE, PromptTemplate};
pub use types::{
    EmbeddingRequest, EmbeddingResponse, GenerateOptions, GenerateRequest, GenerateResponse,
    ModelTag, TagsResponse,
};
