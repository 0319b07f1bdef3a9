//! Ollama-compatible model client
//!
//! Provides an async HTTP client for a local model server with:
//! - Non-streaming text generation (`/api/generate`)
//! - Embeddings (`/api/embeddings`)
//! - Rate limit / overload handling with exponential backoff

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::error::{Error, Result};

use super::oracle::{EmbeddingOracle, TextOracle};
use super::types::{
    EmbeddingRequest, EmbeddingResponse, GenerateRequest, GenerateResponse, TagsResponse,
};

/// Maximum number of attempts for rate-limited or overloaded requests
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff (in milliseconds)
const BACKOFF_BASE_MS: u64 = 1000;

/// Model server client
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Clone)]
pub struct LlmClient {
    /// HTTP client for making requests
    http_client: HttpClient,
    /// Models and sampling settings
    config: LlmConfig,
    /// Base URL without trailing slash
    base_url: String,
    max_attempts: u32,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("base_url", &self.base_url)
            .field("generation_model", &self.config.generation_model)
            .field("embedding_model", &self.config.embedding_model)
            .finish()
    }
}

/// Builder for creating an LlmClient
#[derive(Default)]
pub struct LlmClientBuilder {
    config: Option<LlmConfig>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    max_attempts: Option<u32>,
}

impl LlmClientBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the LLM configuration
    pub fn config(mut self, config: LlmConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the base URL from the configuration
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Set how many attempts a rate-limited request gets (minimum 1)
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Build the LlmClient
    pub fn build(self) -> Result<LlmClient> {
        let config = self.config.unwrap_or_default();
        let base_url = self
            .base_url
            .unwrap_or_else(|| config.base_url.clone())
            .trim_end_matches('/')
            .to_string();

        if base_url.is_empty() {
            return Err(Error::ConfigError("llm.base_url must not be empty".to_string()));
        }

        let timeout_secs = self.timeout_secs.unwrap_or(config.timeout_secs);

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(Error::NetworkError)?;

        Ok(LlmClient {
            http_client,
            config,
            base_url,
            max_attempts: self.max_attempts.unwrap_or(MAX_RETRY_ATTEMPTS).max(1),
        })
    }
}

impl LlmClient {
    /// Create a new LlmClient from configuration
    pub fn new(config: LlmConfig) -> Result<Self> {
        LlmClientBuilder::new().config(config).build()
    }

    /// Create a new builder for LlmClient
    pub fn builder() -> LlmClientBuilder {
        LlmClientBuilder::new()
    }

    /// Model used for text generation
    pub fn generation_model(&self) -> &str {
        &self.config.generation_model
    }

    /// Model used for embeddings
    pub fn embedding_model(&self) -> &str {
        &self.config.embedding_model
    }

    /// Server base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run a non-streaming generation with the configured model
    pub async fn complete(&self, prompt: &str) -> Result<GenerateResponse> {
        let request = GenerateRequest::new(&self.config.generation_model, prompt)
            .with_temperature(self.config.temperature);

        debug!(
            model = %request.model,
            prompt_len = prompt.len(),
            "Sending generate request"
        );

        let response = self.execute_request("/api/generate", &request).await?;
        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::LLMError(format!("Failed to parse response: {}", e)))?;

        debug!(
            model = %generated.model,
            tokens = generated.tokens_used(),
            "Generate request completed"
        );
        Ok(generated)
    }

    /// Embed a single text with the configured embedding model
    ///
    /// An empty or non-finite vector is reported as `EmbeddingFailed`.
    pub async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest::new(&self.config.embedding_model, text);

        debug!(model = %request.model, text_len = text.len(), "Sending embedding request");

        let response = self.execute_request("/api/embeddings", &request).await?;
        let embedding: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::EmbeddingFailed(format!("Failed to parse response: {}", e)))?;

        if embedding.embedding.is_empty() {
            return Err(Error::EmbeddingFailed(
                "Empty embedding response".to_string(),
            ));
        }
        if embedding.embedding.iter().any(|v| !v.is_finite()) {
            return Err(Error::EmbeddingFailed(
                "Embedding contains non-finite values".to_string(),
            ));
        }

        Ok(embedding.embedding)
    }

    /// List models available on the server
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error("/api/tags", e))?;

        let status = response.status();
        if !status.is_success() {
            return handle_error_response(status, response).await;
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| Error::LLMError(format!("Failed to parse model list: {}", e)))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// POST a JSON body, retrying while the server reports rate limiting
    async fn execute_request<T: Serialize + Sync>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.send_request(path, body).await {
                Ok(response) => return Ok(response),
                Err(Error::RateLimited(wait_secs)) if attempts < self.max_attempts => {
                    let backoff = calculate_backoff(attempts, wait_secs);
                    warn!(
                        path,
                        attempt = attempts,
                        wait_ms = backoff,
                        "Rate limited, retrying after backoff"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Send a single request to the server
    async fn send_request<T: Serialize + Sync>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(path, e))?;

        let status = response.status();
        if !status.is_success() {
            return handle_error_response(status, response).await;
        }

        Ok(response)
    }

    fn transport_error(&self, path: &str, error: reqwest::Error) -> Error {
        if error.is_timeout() {
            Error::Timeout(path.to_string(), self.config.timeout_secs)
        } else {
            Error::NetworkError(error)
        }
    }
}

#[async_trait]
impl TextOracle for LlmClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        Ok(self.complete(prompt).await?.response)
    }
}

#[async_trait]
impl EmbeddingOracle for LlmClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_text(text).await
    }
}

/// Map a non-success status to an error
async fn handle_error_response<T>(
    status: reqwest::StatusCode,
    response: reqwest::Response,
) -> Result<T> {
    let header_wait = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    let message = extract_error_message(&body).unwrap_or_else(|| body.clone());

    match status.as_u16() {
        429 => Err(Error::RateLimited(
            header_wait.or_else(|| extract_retry_after(&body)).unwrap_or(5),
        )),
        503 => Err(Error::RateLimited(
            header_wait.or_else(|| extract_retry_after(&body)).unwrap_or(1),
        )),
        400 => Err(Error::LLMError(format!("Bad request: {}", message))),
        404 => Err(Error::LLMError(format!(
            "Model not found or endpoint unavailable: {}. Pull the model on the server first.",
            message
        ))),
        500..=599 => Err(Error::LLMError(format!(
            "Server error ({}): {}",
            status, message
        ))),
        _ => Err(Error::LLMError(format!("HTTP error {}: {}", status, message))),
    }
}

/// Calculate backoff delay with jitter
fn calculate_backoff(attempt: u32, suggested_wait: u64) -> u64 {
    let base = BACKOFF_BASE_MS.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
    let max_wait = suggested_wait.saturating_mul(1000);

    let delay = base.max(max_wait);

    // ~10% jitter
    let jitter = delay / 10;
    delay.saturating_add(rand_jitter() % jitter.max(1))
}

/// Generate a pseudo-random jitter value
fn rand_jitter() -> u64 {
    use std::time::SystemTime;
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64 % 1000)
        .unwrap_or(0)
}

/// Extract retry-after value from an error body
fn extract_retry_after(body: &str) -> Option<u64> {
    let json = serde_json::from_str::<serde_json::Value>(body).ok()?;
    json.get("retry_after")
        .and_then(|v| v.as_u64())
        .or_else(|| {
            json.get("error")
                .and_then(|e| e.get("retry_after"))
                .and_then(|v| v.as_u64())
        })
}

/// Ollama reports failures as `{"error": "..."}`
fn extract_error_message(body: &str) -> Option<String> {
    let json = serde_json::from_str::<serde_json::Value>(body).ok()?;
    json.get("error")
        .and_then(|e| e.as_str())
        .map(|s| s.to_string())
}
