//! Query classifier
//!
//! Asks the text oracle what kind of evidence a query needs. Classification
//! never blocks retrieval: unparsable responses, oracle errors and timeouts
//! all degrade to the retrieve-broadly fallback intent.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::RetrievalConfig;
use crate::error::{Error, Result};
use crate::llm::{PromptTemplate, TextOracle};

use super::intent::{IntentParser, ParseOutcome, QueryIntent};

/// Classifies free-text queries into a `QueryIntent`
#[derive(Clone)]
pub struct QueryClassifier {
    oracle: Arc<dyn TextOracle>,
    template: PromptTemplate,
    parser: IntentParser,
    timeout: Duration,
}

impl std::fmt::Debug for QueryClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryClassifier")
            .field("parser", &self.parser)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl QueryClassifier {
    /// Create a classifier with the built-in prompt and default limits
    pub fn new(oracle: Arc<dyn TextOracle>) -> Self {
        Self::from_config(oracle, &RetrievalConfig::default())
    }

    /// Create a classifier using retrieval limits from configuration
    pub fn from_config(oracle: Arc<dyn TextOracle>, config: &RetrievalConfig) -> Self {
        Self {
            oracle,
            template: PromptTemplate::classification(),
            parser: IntentParser::new(config.max_file_count, config.default_node_count),
            timeout: config.classifier_timeout(),
        }
    }

    /// Ask the oracle and parse its answer
    ///
    /// Errors only when the oracle itself fails or times out.
    async fn classify_outcome(&self, query: &str) -> Result<ParseOutcome> {
        let prompt = self.template.render_query(query);

        let response = tokio::time::timeout(self.timeout, self.oracle.generate(&prompt))
            .await
            .map_err(|_| Error::Timeout("query classification".to_string(), self.timeout.as_secs()))??;

        debug!(response_len = response.len(), "Classifier responded");
        Ok(self.parser.parse(&response))
    }

    /// Classify a query, degrading to the fallback intent on any failure
    pub async fn classify(&self, query: &str) -> QueryIntent {
        match self.classify_strict(query).await {
            Ok(intent) => {
                debug!(%intent, "Query classified");
                intent
            }
            Err(e) => {
                warn!(error = %e, "Classification failed, retrieving broadly");
                QueryIntent::fallback(self.parser.default_node_count)
            }
        }
    }

    /// Classify a query, surfacing every failure as `ClassificationFailed`
    pub async fn classify_strict(&self, query: &str) -> Result<QueryIntent> {
        match self.classify_outcome(query).await {
            Ok(ParseOutcome::Parsed(intent)) => Ok(intent),
            Ok(ParseOutcome::Default { reason, .. }) => Err(Error::ClassificationFailed(reason)),
            Err(e) => Err(Error::ClassificationFailed(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingTextOracle, ScriptedTextOracle, SlowTextOracle};

    #[tokio::test]
    async fn test_classify_parsed_intent() {
        let oracle = Arc::new(ScriptedTextOracle::new(
            "Relationship: no\nGlobal: no, Local: yes, Nodes: 2, Files: 0",
        ));
        let classifier = QueryClassifier::new(oracle.clone());

        let intent = classifier.classify("How does a pawn move?").await;
        assert!(intent.wants_local);
        assert!(!intent.wants_global);
        assert_eq!(intent.node_count, 2);

        let prompts = oracle.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Query: How does a pawn move?"));
    }

    #[tokio::test]
    async fn test_classify_garbage_degrades() {
        let classifier = QueryClassifier::new(Arc::new(ScriptedTextOracle::new("no idea")));
        assert_eq!(classifier.classify("q").await, QueryIntent::fallback(1));
    }

    #[tokio::test]
    async fn test_classify_oracle_error_degrades() {
        let classifier = QueryClassifier::new(Arc::new(FailingTextOracle));
        assert_eq!(classifier.classify("q").await, QueryIntent::fallback(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_classify_timeout_degrades() {
        let config = RetrievalConfig {
            classifier_timeout_secs: 5,
            ..RetrievalConfig::default()
        };
        let classifier = QueryClassifier::from_config(
            Arc::new(SlowTextOracle::new(
                Duration::from_secs(120),
                "Relationship: yes, Node1: King, Node2: Queen",
            )),
            &config,
        );

        assert_eq!(classifier.classify("q").await, QueryIntent::fallback(1));
    }

    #[tokio::test]
    async fn test_classify_strict_reports_failure() {
        let classifier = QueryClassifier::new(Arc::new(ScriptedTextOracle::new(
            "Relationship: yes, Node1: King",
        )));

        let err = classifier.classify_strict("q").await.unwrap_err();
        assert!(matches!(err, Error::ClassificationFailed(_)));
        assert_eq!(err.code(), "E100");
    }

    #[tokio::test]
    async fn test_fallback_uses_configured_node_count() {
        let config = RetrievalConfig {
            default_node_count: 3,
            ..RetrievalConfig::default()
        };
        let classifier = QueryClassifier::from_config(Arc::new(FailingTextOracle), &config);
        assert_eq!(classifier.classify("q").await.node_count, 3);
    }
}
