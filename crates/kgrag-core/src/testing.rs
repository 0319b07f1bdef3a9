//! Test doubles for oracles and graph stores

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::knowledge::{
    Entity, GraphStats, GraphStore, Neighborhood, PairwiseRelationships, Relationship,
    UpsertOutcome,
};
use crate::error::{Error, Result};
use crate::infrastructure::knowledge::InMemoryGraphStore;
use crate::llm::{EmbeddingOracle, TextOracle};

/// Replies to every prompt with the same text and records the prompts
pub struct ScriptedTextOracle {
    response: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedTextOracle {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextOracle for ScriptedTextOracle {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.response.clone())
    }
}

/// Always fails as if the model server were down
pub struct FailingTextOracle;

#[async_trait]
impl TextOracle for FailingTextOracle {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(Error::LLMError("connection refused".to_string()))
    }
}

/// Answers after a delay
pub struct SlowTextOracle {
    delay: Duration,
    response: String,
}

impl SlowTextOracle {
    pub fn new(delay: Duration, response: impl Into<String>) -> Self {
        Self {
            delay,
            response: response.into(),
        }
    }
}

#[async_trait]
impl TextOracle for SlowTextOracle {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        tokio::time::sleep(self.delay).await;
        Ok(self.response.clone())
    }
}

/// Returns fixed vectors per text and counts calls
pub struct FixedEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    fallback: Vec<f32>,
    calls: AtomicUsize,
}

impl FixedEmbedder {
    /// Every text not registered with `with` embeds to `fallback`
    pub fn new(fallback: Vec<f32>) -> Self {
        Self {
            vectors: HashMap::new(),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.into(), vector);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingOracle for FixedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}

/// Fails for every text, or only for texts listed in `failing`
pub struct FailingEmbedder {
    failing: Option<Vec<String>>,
    vector: Vec<f32>,
    calls: AtomicUsize,
}

impl FailingEmbedder {
    pub fn always() -> Self {
        Self {
            failing: None,
            vector: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn only(texts: &[&str], vector: Vec<f32>) -> Self {
        Self {
            failing: Some(texts.iter().map(|t| t.to_string()).collect()),
            vector,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingOracle for FailingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let fails = match &self.failing {
            None => true,
            Some(texts) => texts.iter().any(|t| t == text),
        };
        if fails {
            Err(Error::LLMError("connection refused".to_string()))
        } else {
            Ok(self.vector.clone())
        }
    }
}

/// Graph store whose every call fails with a transport error
pub struct FailingGraphStore;

#[async_trait]
impl GraphStore for FailingGraphStore {
    async fn get_entity(&self, _name: &str) -> Result<Option<Entity>> {
        Err(Error::GraphLookupFailed("connection reset".to_string()))
    }

    async fn get_neighborhood(&self, _name: &str) -> Result<Option<Neighborhood>> {
        Err(Error::GraphLookupFailed("connection reset".to_string()))
    }

    async fn get_relationships_between(
        &self,
        _first: &str,
        _second: &str,
    ) -> Result<PairwiseRelationships> {
        Err(Error::GraphLookupFailed("connection reset".to_string()))
    }

    async fn get_stats(&self) -> Result<GraphStats> {
        Err(Error::GraphLookupFailed("connection reset".to_string()))
    }

    async fn upsert_entity(&self, _entity: &Entity) -> Result<UpsertOutcome> {
        Err(Error::GraphLookupFailed("connection reset".to_string()))
    }

    async fn upsert_relationship(&self, _relationship: &Relationship) -> Result<UpsertOutcome> {
        Err(Error::GraphLookupFailed("connection reset".to_string()))
    }
}

/// Wraps an in-memory store, delaying or failing neighborhood lookups per name
pub struct FlakyGraphStore {
    inner: InMemoryGraphStore,
    slow: Vec<String>,
    broken: Vec<String>,
    delay: Duration,
}

impl FlakyGraphStore {
    pub fn new(inner: InMemoryGraphStore) -> Self {
        Self {
            inner,
            slow: Vec::new(),
            broken: Vec::new(),
            delay: Duration::from_secs(60),
        }
    }

    pub fn slow(mut self, name: &str) -> Self {
        self.slow.push(name.to_string());
        self
    }

    pub fn broken(mut self, name: &str) -> Self {
        self.broken.push(name.to_string());
        self
    }
}

#[async_trait]
impl GraphStore for FlakyGraphStore {
    async fn get_entity(&self, name: &str) -> Result<Option<Entity>> {
        self.inner.get_entity(name).await
    }

    async fn get_neighborhood(&self, name: &str) -> Result<Option<Neighborhood>> {
        if self.broken.iter().any(|n| n == name) {
            return Err(Error::GraphLookupFailed("connection reset".to_string()));
        }
        if self.slow.iter().any(|n| n == name) {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.get_neighborhood(name).await
    }

    async fn get_relationships_between(
        &self,
        first: &str,
        second: &str,
    ) -> Result<PairwiseRelationships> {
        self.inner.get_relationships_between(first, second).await
    }

    async fn get_stats(&self) -> Result<GraphStats> {
        self.inner.get_stats().await
    }

    async fn upsert_entity(&self, entity: &Entity) -> Result<UpsertOutcome> {
        self.inner.upsert_entity(entity).await
    }

    async fn upsert_relationship(&self, relationship: &Relationship) -> Result<UpsertOutcome> {
        self.inner.upsert_relationship(relationship).await
    }
}

/// The small chess graph used across retrieval tests
pub fn chess_graph() -> InMemoryGraphStore {
    InMemoryGraphStore::from_parts(
        vec![
            Entity::new("Pawn").with_description("a chess piece"),
            Entity::new("ForwardStep").with_description("one square forward"),
            Entity::new("King").with_description("the piece to protect"),
            Entity::new("Queen").with_description("the strongest piece"),
            Entity::new("Knight").with_description("moves in an L shape"),
        ],
        vec![
            Relationship::new("Pawn", "ForwardStep", "MOVES_LIKE"),
            Relationship::new("Pawn", "Queen", "PROMOTES_TO"),
            Relationship::new("King", "Pawn", "PROTECTED_BY"),
        ],
    )
}
