//! Embedding index snapshot
//!
//! Node and summary embeddings live in one JSON file:
//!
//! ```json
//! {
//!   "nodes": [{"id": "node_0", "name": "Pawn", "description": "...", "embedding": [..]}],
//!   "summaries": [{"id": "summary_0", "file_name": "rules.txt", "summary": "...", "embedding": [..]}],
//!   "relationships": []
//! }
//! ```
//!
//! The snapshot is loaded once and shared read-only. Node and summary
//! vectors form two separate collections that are never compared with
//! each other.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::knowledge::Relationship;
use crate::error::{Error, Result};

/// Which collection a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    Node,
    Summary,
}

impl std::fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubjectKind::Node => write!(f, "node"),
            SubjectKind::Summary => write!(f, "summary"),
        }
    }
}

/// Text carried alongside a vector
#[derive(Debug, Clone, PartialEq)]
pub enum RecordPayload {
    Node { name: String, description: String },
    Summary { file_name: String, summary: String },
}

/// One embedded subject
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: RecordPayload,
}

impl EmbeddingRecord {
    pub fn node(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        vector: Vec<f32>,
    ) -> Self {
        Self {
            id: id.into(),
            vector,
            payload: RecordPayload::Node {
                name: name.into(),
                description: description.into(),
            },
        }
    }

    pub fn summary(
        id: impl Into<String>,
        file_name: impl Into<String>,
        summary: impl Into<String>,
        vector: Vec<f32>,
    ) -> Self {
        Self {
            id: id.into(),
            vector,
            payload: RecordPayload::Summary {
                file_name: file_name.into(),
                summary: summary.into(),
            },
        }
    }

    pub fn kind(&self) -> SubjectKind {
        match self.payload {
            RecordPayload::Node { .. } => SubjectKind::Node,
            RecordPayload::Summary { .. } => SubjectKind::Summary,
        }
    }

    /// Entity name for nodes, file name for summaries
    pub fn subject_key(&self) -> &str {
        match &self.payload {
            RecordPayload::Node { name, .. } => name,
            RecordPayload::Summary { file_name, .. } => file_name,
        }
    }
}

/// Serialized node record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEmbedding {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub embedding: Vec<f32>,
}

/// Serialized summary record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryEmbedding {
    pub id: String,
    pub file_name: String,
    pub summary: String,
    pub embedding: Vec<f32>,
}

/// On-disk form of the index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub built_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(default)]
    pub nodes: Vec<NodeEmbedding>,
    #[serde(default)]
    pub summaries: Vec<SummaryEmbedding>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl IndexSnapshot {
    /// Write the snapshot as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Record counts and shape of a loaded index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub node_count: usize,
    pub summary_count: usize,
    pub dimension: Option<usize>,
    pub built_at: Option<DateTime<Utc>>,
    pub embedding_model: Option<String>,
}

/// Validated, read-only embedding collections
#[derive(Debug, Clone, Default)]
pub struct EmbeddingIndex {
    nodes: Vec<EmbeddingRecord>,
    summaries: Vec<EmbeddingRecord>,
    dimension: Option<usize>,
    built_at: Option<DateTime<Utc>>,
    embedding_model: Option<String>,
}

impl EmbeddingIndex {
    /// Build an index from records, validating every vector
    pub fn new(nodes: Vec<EmbeddingRecord>, summaries: Vec<EmbeddingRecord>) -> Result<Self> {
        let mut dimension = None;
        for (expected, record) in nodes
            .iter()
            .map(|r| (SubjectKind::Node, r))
            .chain(summaries.iter().map(|r| (SubjectKind::Summary, r)))
        {
            if record.kind() != expected {
                return Err(Error::IndexError(format!(
                    "record '{}' is a {} but was placed in the {} collection",
                    record.id,
                    record.kind(),
                    expected
                )));
            }
            validate_vector(&record.id, &record.vector, &mut dimension)?;
        }

        Ok(Self {
            nodes,
            summaries,
            dimension,
            built_at: None,
            embedding_model: None,
        })
    }

    /// Convert a deserialized snapshot
    pub fn from_snapshot(snapshot: IndexSnapshot) -> Result<Self> {
        let nodes = snapshot
            .nodes
            .into_iter()
            .map(|n| EmbeddingRecord::node(n.id, n.name, n.description, n.embedding))
            .collect();
        let summaries = snapshot
            .summaries
            .into_iter()
            .map(|s| EmbeddingRecord::summary(s.id, s.file_name, s.summary, s.embedding))
            .collect();

        let mut index = Self::new(nodes, summaries)?;
        index.built_at = snapshot.built_at;
        index.embedding_model = snapshot.embedding_model;
        Ok(index)
    }

    /// Load and validate a snapshot file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::IndexError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let snapshot: IndexSnapshot = serde_json::from_str(&content).map_err(|e| {
            Error::IndexError(format!("cannot parse {}: {}", path.display(), e))
        })?;

        let index = Self::from_snapshot(snapshot)?;
        info!(
            path = %path.display(),
            nodes = index.nodes.len(),
            summaries = index.summaries.len(),
            dimension = ?index.dimension,
            "Loaded embedding index"
        );
        Ok(index)
    }

    pub fn nodes(&self) -> &[EmbeddingRecord] {
        &self.nodes
    }

    pub fn summaries(&self) -> &[EmbeddingRecord] {
        &self.summaries
    }

    /// Shared vector length, `None` for an empty index
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.summaries.is_empty()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            node_count: self.nodes.len(),
            summary_count: self.summaries.len(),
            dimension: self.dimension,
            built_at: self.built_at,
            embedding_model: self.embedding_model.clone(),
        }
    }
}

fn validate_vector(id: &str, vector: &[f32], dimension: &mut Option<usize>) -> Result<()> {
    if vector.is_empty() {
        return Err(Error::IndexError(format!("record '{}' has an empty vector", id)));
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(Error::IndexError(format!(
            "record '{}' contains non-finite values",
            id
        )));
    }
    match *dimension {
        None => *dimension = Some(vector.len()),
        Some(expected) if expected != vector.len() => {
            return Err(Error::IndexError(format!(
                "record '{}' has dimension {} but the index uses {}",
                id,
                vector.len(),
                expected
            )));
        }
        Some(_) => {}
    }
    Ok(())
}
