//! Error types for kgrag

use thiserror::Error;

/// Result type alias using kgrag's Error
pub type Result<T> = std::result::Result<T, Error>;

/// kgrag error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Classification errors (E100-E199)
    #[error("Query classification failed: {0}")]
    ClassificationFailed(String),

    // Embedding errors (E200-E299)
    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    // Graph errors (E300-E399)
    #[error("Graph lookup failed: {0}. Check that the graph store is reachable.")]
    GraphLookupFailed(String),

    // Assembly errors (E400-E499)
    #[error("Context assembly failed during {stage}: {source}")]
    Assembly {
        stage: &'static str,
        #[source]
        source: Box<Error>,
    },

    // Network / oracle errors (E500-E599)
    #[error("Network error: {0}. Is the model server running?")]
    NetworkError(#[from] reqwest::Error),

    #[error("LLM API error: {0}")]
    LLMError(String),

    #[error("Rate limited. Waiting {0} seconds before retry.")]
    RateLimited(u64),

    #[error("Operation '{0}' timed out after {1} seconds")]
    Timeout(String, u64),

    // Database errors (E600-E699)
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Index errors (E700-E799)
    #[error("Embedding index error: {0}")]
    IndexError(String),

    // Config / input errors (E800-E899)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Generic errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap an unrecovered failure from one of the retrieval stages
    pub fn assembly(stage: &'static str, source: Error) -> Self {
        Self::Assembly {
            stage,
            source: Box::new(source),
        }
    }

    /// The innermost error, with any assembly wrappers removed
    pub fn root_cause(&self) -> &Error {
        match self {
            Self::Assembly { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::ClassificationFailed(_) => "E100",
            Self::EmbeddingFailed(_) => "E200",
            Self::GraphLookupFailed(_) => "E300",
            Self::Assembly { .. } => "E400",
            Self::NetworkError(_) => "E500",
            Self::LLMError(_) => "E501",
            Self::RateLimited(_) => "E502",
            Self::Timeout(..) => "E503",
            Self::DatabaseError(_) => "E600",
            Self::IndexError(_) => "E700",
            Self::ConfigError(_) => "E800",
            Self::InvalidInput(_) => "E801",
            Self::Json(_) | Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::Assembly { source, .. } => source.suggestion(),
            Self::NetworkError(_) | Self::Timeout(..) => {
                Some("kgrag config get llm.base_url".to_string())
            }
            Self::EmbeddingFailed(_) => Some("kgrag config get llm.embedding_model".to_string()),
            Self::GraphLookupFailed(_) | Self::DatabaseError(_) => Some("kgrag doctor".to_string()),
            Self::IndexError(_) => Some("kgrag index build".to_string()),
            Self::ConfigError(_) => Some("kgrag config list".to_string()),
            _ => None,
        }
    }
}
