//! Query intent and the classifier response parser
//!
//! The text oracle is asked for two lines of labeled fields:
//!
//! ```text
//! Relationship: <yes/no>, Node1: <name>, Node2: <name>
//! Global: <yes/no>, Local: <yes/no>, Nodes: <number>, Files: <number>
//! ```
//!
//! Models rarely follow that exactly. The parser flattens the response,
//! puts a separator in front of every known label and reads fields by label,
//! never by position.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Labels the parser recognizes, in the order the oracle is asked to emit them
const FIELD_LABELS: &[&str] = &["Relationship", "Node1", "Node2", "Global", "Local", "Nodes", "Files"];

/// Structured shape of a query's information need
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryIntent {
    /// Asks about the relationship between exactly two entities
    pub is_relationship: bool,
    pub node1: Option<String>,
    pub node2: Option<String>,
    /// Wants node-centric (neighborhood) evidence
    pub wants_local: bool,
    /// Wants document summary evidence
    pub wants_global: bool,
    /// Number of nearest nodes to expand
    pub node_count: usize,
    /// Number of nearest summaries, already clamped
    pub file_count: usize,
}

impl QueryIntent {
    /// The retrieve-broadly intent used whenever classification fails
    pub fn fallback(node_count: usize) -> Self {
        Self {
            is_relationship: false,
            node1: None,
            node2: None,
            wants_local: true,
            wants_global: true,
            node_count,
            file_count: 1,
        }
    }

    /// An intent for a pairwise relationship lookup
    pub fn relationship(node1: impl Into<String>, node2: impl Into<String>) -> Self {
        Self {
            is_relationship: true,
            node1: Some(node1.into()),
            node2: Some(node2.into()),
            wants_local: false,
            wants_global: false,
            node_count: 0,
            file_count: 0,
        }
    }

    /// Both entity names, when this is a well-formed relationship intent
    pub fn relationship_pair(&self) -> Option<(&str, &str)> {
        if !self.is_relationship {
            return None;
        }
        match (self.node1.as_deref(), self.node2.as_deref()) {
            (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => Some((a, b)),
            _ => None,
        }
    }

    /// Apply the global-context bound
    pub fn clamp_files(mut self, max_file_count: usize) -> Self {
        self.file_count = self.file_count.min(max_file_count);
        self
    }
}

impl fmt::Display for QueryIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.relationship_pair() {
            Some((a, b)) => write!(f, "relationship({}, {})", a, b),
            None => write!(
                f,
                "local={} global={} nodes={} files={}",
                self.wants_local, self.wants_global, self.node_count, self.file_count
            ),
        }
    }
}

/// Result of parsing a classifier response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// The response carried a usable intent
    Parsed(QueryIntent),
    /// The response was unusable; the fallback intent applies
    Default { intent: QueryIntent, reason: String },
}

impl ParseOutcome {
    fn default_for(reason: impl Into<String>, default_node_count: usize) -> Self {
        Self::Default {
            intent: QueryIntent::fallback(default_node_count),
            reason: reason.into(),
        }
    }

    /// The intent to act on, whichever branch was taken
    pub fn intent(&self) -> &QueryIntent {
        match self {
            Self::Parsed(intent) | Self::Default { intent, .. } => intent,
        }
    }

    pub fn into_intent(self) -> QueryIntent {
        match self {
            Self::Parsed(intent) | Self::Default { intent, .. } => intent,
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default { .. })
    }
}

/// Parser for the oracle's labeled-field text
#[derive(Debug, Clone, Copy)]
pub struct IntentParser {
    /// Upper bound on `file_count`
    pub max_file_count: usize,
    /// Node count when the response omits or garbles `Nodes`
    pub default_node_count: usize,
}

impl Default for IntentParser {
    fn default() -> Self {
        Self {
            max_file_count: 1,
            default_node_count: 1,
        }
    }
}

#[derive(Default)]
struct RawFields<'a> {
    relationship: Option<&'a str>,
    node1: Option<&'a str>,
    node2: Option<&'a str>,
    global: Option<&'a str>,
    local: Option<&'a str>,
    nodes: Option<&'a str>,
    files: Option<&'a str>,
}

impl<'a> RawFields<'a> {
    fn slot(&mut self, label: &str) -> Option<&mut Option<&'a str>> {
        match label {
            "Relationship" => Some(&mut self.relationship),
            "Node1" => Some(&mut self.node1),
            "Node2" => Some(&mut self.node2),
            "Global" => Some(&mut self.global),
            "Local" => Some(&mut self.local),
            "Nodes" => Some(&mut self.nodes),
            "Files" => Some(&mut self.files),
            _ => None,
        }
    }

    fn is_empty(&self) -> bool {
        self.relationship.is_none()
            && self.global.is_none()
            && self.local.is_none()
            && self.nodes.is_none()
            && self.files.is_none()
    }
}

/// Flatten the response and put a `,` separator before every known label
pub fn normalize_response(response: &str) -> String {
    let mut normalized = response.replace(['\r', '\n'], " ");
    for label in FIELD_LABELS {
        normalized = normalized.replace(&format!("{}:", label), &format!(", {}:", label));
    }
    normalized.trim().to_string()
}

fn is_yes(value: &str) -> bool {
    value.to_lowercase().contains("yes")
}

/// Leading integer of a field value (`"2 nodes"` -> 2)
fn parse_count(value: &str) -> Option<usize> {
    let digits: String = value
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn clean_name(value: &str) -> Option<String> {
    let name = value
        .trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '*' | '`' | '<' | '>' | '.'))
        .trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

impl IntentParser {
    pub fn new(max_file_count: usize, default_node_count: usize) -> Self {
        Self {
            max_file_count,
            default_node_count,
        }
    }

    /// Parse a raw classifier response
    ///
    /// A response with no recognizable field, or a relationship answer that
    /// is missing either entity name, yields `ParseOutcome::Default`. Other
    /// missing or unparsable fields take their individual safe defaults.
    pub fn parse(&self, response: &str) -> ParseOutcome {
        let normalized = normalize_response(response);

        let mut fields = RawFields::default();
        for segment in normalized.split(',') {
            let Some((label, value)) = segment.split_once(':') else {
                continue;
            };
            if let Some(slot) = fields.slot(label.trim()) {
                if slot.is_none() {
                    *slot = Some(value.trim());
                }
            }
        }

        if fields.is_empty() {
            return ParseOutcome::default_for("no labeled fields in response", self.default_node_count);
        }

        let is_relationship = fields.relationship.is_some_and(is_yes);
        if is_relationship {
            let node1 = fields.node1.and_then(clean_name);
            let node2 = fields.node2.and_then(clean_name);
            return match (node1, node2) {
                (Some(a), Some(b)) => ParseOutcome::Parsed(QueryIntent::relationship(a, b)),
                _ => ParseOutcome::default_for(
                    "relationship query without both entity names",
                    self.default_node_count,
                ),
            };
        }

        let intent = QueryIntent {
            is_relationship: false,
            node1: None,
            node2: None,
            wants_local: fields.local.is_none_or(is_yes),
            wants_global: fields.global.is_none_or(is_yes),
            node_count: fields
                .nodes
                .and_then(parse_count)
                .unwrap_or(self.default_node_count),
            file_count: fields.files.and_then(parse_count).unwrap_or(1),
        };

        ParseOutcome::Parsed(intent.clamp_files(self.max_file_count))
    }
}
