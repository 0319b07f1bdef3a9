//! Knowledge entity types
//!
//! Entities are the nodes of the knowledge graph. They are produced by the
//! extraction step and are read-only from the query side.

use serde::{Deserialize, Serialize};

/// A named node in the knowledge graph
///
/// `name` is the unique key; two entities with the same name are the same
/// entity regardless of description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique name of the entity
    pub name: String,
    /// Free-text description
    #[serde(default)]
    pub description: String,
}

impl Entity {
    /// Create a new entity with an empty description
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Text used to embed this entity (`"{name}: {description}"`)
    pub fn embedding_text(&self) -> String {
        format!("{}: {}", self.name, self.description)
    }

    /// Description, or a marker when the extractor left it empty
    pub fn display_description(&self) -> &str {
        if self.description.trim().is_empty() {
            "no description"
        } else {
            &self.description
        }
    }
}

/// `nodes.json` rows are `[name, description]` pairs
impl From<(String, String)> for Entity {
    fn from((name, description): (String, String)) -> Self {
        Self { name, description }
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
