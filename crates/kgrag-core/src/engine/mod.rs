//! Query engine
//!
//! The single `answer(query)` entry point: assemble evidence, then ask the
//! text oracle to answer from it. An empty context is still sent; the answer
//! prompt instructs the model to say there is not enough context.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::domain::retrieval::{Context, ContextAssembler, EmbeddingIndex};
use crate::error::{Error, Result};
use crate::infrastructure::knowledge::SqliteGraphStore;
use crate::llm::{LlmClient, PromptTemplate, TextOracle};
use crate::storage::Database;

/// A generated answer with the context it was based on
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub query: String,
    pub context: Context,
    pub response: String,
}

/// Trim a query, rejecting blank input
pub fn validate_query(query: &str) -> Result<&str> {
    let query = query.trim();
    if query.is_empty() {
        return Err(Error::InvalidInput("query must not be empty".to_string()));
    }
    Ok(query)
}

/// Answers queries over the knowledge base
pub struct QueryEngine {
    assembler: ContextAssembler,
    generator: Arc<dyn TextOracle>,
    template: PromptTemplate,
    database: Option<Database>,
}

impl QueryEngine {
    /// Build an engine from injected collaborators
    pub fn new(assembler: ContextAssembler, generator: Arc<dyn TextOracle>) -> Self {
        Self {
            assembler,
            generator,
            template: PromptTemplate::answer(),
            database: None,
        }
    }

    /// Open the configured graph database, index and model client
    ///
    /// Everything is constructed once here and shared by every query.
    pub async fn connect(config: &Config) -> Result<Self> {
        let index = EmbeddingIndex::load(&config.storage.index_path)?;

        let database = Database::open(&config.storage.database_path)
            .await
            .map_err(|e| Error::GraphLookupFailed(format!("{:#}", e)))?;
        let store = Arc::new(SqliteGraphStore::new(database.pool().clone()));

        let client = Arc::new(LlmClient::new(config.llm.clone())?);

        let assembler = ContextAssembler::new(
            client.clone(),
            client.clone(),
            store,
            Arc::new(index),
            &config.retrieval,
        );

        info!(
            database = %config.storage.database_path.display(),
            index = %config.storage.index_path.display(),
            model = client.generation_model(),
            "Query engine ready"
        );

        let mut engine = Self::new(assembler, client);
        engine.database = Some(database);
        Ok(engine)
    }

    pub fn assembler(&self) -> &ContextAssembler {
        &self.assembler
    }

    /// Answer a query, returning only the response text
    pub async fn answer(&self, query: &str) -> Result<String> {
        Ok(self.answer_with_context(query).await?.response)
    }

    /// Answer a query and keep the assembled context
    pub async fn answer_with_context(&self, query: &str) -> Result<Answer> {
        let query = validate_query(query)?;

        let context = self.assembler.assemble(query).await?;
        let rendered = context.render();
        let prompt = self.template.render(&HashMap::from([
            ("query", query),
            ("context", rendered.as_str()),
        ]));

        debug!(context_len = rendered.len(), "Generating answer");
        let response = self.generator.generate(&prompt).await?;

        Ok(Answer {
            query: query.to_string(),
            context,
            response: response.trim().to_string(),
        })
    }

    /// Close the graph database, if this engine opened it
    pub async fn close(self) {
        if let Some(database) = self.database {
            database.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetrievalConfig;
    use crate::domain::retrieval::EmbeddingRecord;
    use crate::llm::TextOracle;
    use crate::testing::{FailingEmbedder, FixedEmbedder, ScriptedTextOracle, chess_graph};

    fn index() -> Arc<EmbeddingIndex> {
        Arc::new(
            EmbeddingIndex::new(
                vec![EmbeddingRecord::node("node_0", "Pawn", "a chess piece", vec![1.0, 0.0])],
                vec![EmbeddingRecord::summary("summary_0", "rules.txt", "How pieces move", vec![0.0, 1.0])],
            )
            .unwrap(),
        )
    }

    fn engine(
        classifier_reply: &str,
        embedder: Arc<dyn crate::llm::EmbeddingOracle>,
        generator: Arc<dyn TextOracle>,
    ) -> QueryEngine {
        let assembler = ContextAssembler::new(
            Arc::new(ScriptedTextOracle::new(classifier_reply)),
            embedder,
            Arc::new(chess_graph()),
            index(),
            &RetrievalConfig::default(),
        );
        QueryEngine::new(assembler, generator)
    }

    #[test]
    fn test_validate_query_trims_and_rejects_blank() {
        assert_eq!(validate_query("  pawn moves \n").unwrap(), "pawn moves");
        let err = validate_query(" \t ").unwrap_err();
        assert_eq!(err.code(), "E801");
    }

    #[tokio::test]
    async fn test_answer_sends_context_to_generator() {
        let generator = Arc::new(ScriptedTextOracle::new("  A pawn moves one square forward.\n"));
        let engine = engine(
            "Relationship: no, Global: no, Local: yes, Nodes: 1, Files: 0",
            Arc::new(FixedEmbedder::new(vec![1.0, 0.0])),
            generator.clone(),
        );

        let answer = engine.answer("How does a pawn move?").await.unwrap();
        assert_eq!(answer, "A pawn moves one square forward.");

        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].starts_with("Query: How does a pawn move?"));
        assert!(prompts[0].contains("Pawn -[MOVES_LIKE]-> ForwardStep"));
        assert!(prompts[0].contains("not enough context"));
    }

    #[tokio::test]
    async fn test_empty_context_still_generates() {
        let generator = Arc::new(ScriptedTextOracle::new("not enough context"));
        let engine = engine(
            "Relationship: no, Global: no, Local: no",
            Arc::new(FixedEmbedder::new(vec![1.0, 0.0])),
            generator.clone(),
        );

        let answer = engine.answer_with_context("Who won in 1972?").await.unwrap();
        assert!(answer.context.is_empty());
        assert_eq!(answer.response, "not enough context");
        assert!(generator.prompts()[0].contains("Context: \n"));
    }

    #[tokio::test]
    async fn test_embedding_failure_reaches_caller() {
        let generator = Arc::new(ScriptedTextOracle::new("unused"));
        let engine = engine(
            "Relationship: no, Global: yes, Local: yes, Nodes: 1, Files: 1",
            Arc::new(FailingEmbedder::always()),
            generator.clone(),
        );

        let err = engine.answer("How does a pawn move?").await.unwrap_err();
        assert!(matches!(err.root_cause(), Error::EmbeddingFailed(_)));
        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_blank_query_rejected() {
        let engine = engine(
            "Relationship: no",
            Arc::new(FixedEmbedder::new(vec![1.0, 0.0])),
            Arc::new(ScriptedTextOracle::new("")),
        );
        assert!(matches!(engine.answer("   ").await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_connect_requires_index() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.index_path = dir.path().join("missing.json");
        config.storage.database_path = dir.path().join("graph.db");

        let err = QueryEngine::connect(&config).await.err().unwrap();
        assert_eq!(err.code(), "E700");
    }
}
