//! Knowledge relationships
//!
//! Relationships are directed, labeled edges between two entities. The same
//! pair of entities may be connected by several edges as long as their
//! labels differ; `(source, target, label)` is the identity of an edge.

use serde::{Deserialize, Serialize};

/// A directed edge `source -[label]-> target`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Relationship {
    /// Name of the source entity
    pub source: String,
    /// Name of the target entity
    pub target: String,
    /// Relationship label (e.g. `MOVES_LIKE`)
    pub label: String,
}

impl Relationship {
    /// Create a new relationship between two entities
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            label: label.into(),
        }
    }

    /// Identity of this edge for idempotent merges
    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            source: self.source.clone(),
            target: self.target.clone(),
            label: self.label.clone(),
        }
    }
}

/// `edges.json` rows are `[source, target, label]` triples
impl From<(String, String, String)> for Relationship {
    fn from((source, target, label): (String, String, String)) -> Self {
        Self {
            source,
            target,
            label,
        }
    }
}

impl std::fmt::Display for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -[{}]-> {}", self.source, self.label, self.target)
    }
}

/// Content key of an edge: `(source, target, label)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    pub source: String,
    pub target: String,
    pub label: String,
}

/// Which way an edge points relative to the entity being inspected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDirection {
    /// The inspected entity is the source
    Outgoing,
    /// The inspected entity is the target
    Incoming,
}
