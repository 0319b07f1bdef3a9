//! Evidence items and their text rendering
//!
//! Everything the answer model sees passes through the renderers here. The
//! neighborhood format is also parsed back by `parse_neighborhood`, so the
//! two must stay in sync.

use std::fmt;

use serde::Serialize;

use crate::domain::knowledge::{Entity, Neighborhood, PairwiseRelationships, Relationship};

/// Separator placed between rendered items
pub const ITEM_SEPARATOR: &str = "\n---\n";

const NO_RELATIONSHIP: &str = "No direct relationship exists between the two nodes.";
const NOT_FOUND: &str = "not found in graph";

/// Where an evidence item came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Relationship,
    NodeNeighborhood,
    Summary,
}

impl fmt::Display for EvidenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvidenceKind::Relationship => write!(f, "relationship"),
            EvidenceKind::NodeNeighborhood => write!(f, "node_neighborhood"),
            EvidenceKind::Summary => write!(f, "summary"),
        }
    }
}

/// One unit of retrieved context
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceItem {
    pub kind: EvidenceKind,
    /// Entity name, `"A|B"` for a pair, or file name
    pub subject_key: String,
    /// Similarity that selected this item; relationship evidence is unscored
    pub rank_score: Option<f32>,
    pub text: String,
}

impl EvidenceItem {
    pub fn new(kind: EvidenceKind, subject_key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind,
            subject_key: subject_key.into(),
            rank_score: None,
            text: text.into(),
        }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.rank_score = Some(score);
        self
    }

    /// Text as it appears in the context, prefixed with its score when scored
    pub fn rendered(&self) -> String {
        let text = self.text.trim_end();
        match self.rank_score {
            Some(score) => format!("Similarity: {:.2}\n{}", score, text),
            None => text.to_string(),
        }
    }
}

/// Ordered evidence handed to answer generation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Context {
    items: Vec<EvidenceItem>,
}

impl Context {
    pub fn new(items: Vec<EvidenceItem>) -> Self {
        Self { items }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[EvidenceItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Number of items of one kind
    pub fn count(&self, kind: EvidenceKind) -> usize {
        self.items.iter().filter(|i| i.kind == kind).count()
    }

    /// The context string, items joined by `ITEM_SEPARATOR`
    pub fn render(&self) -> String {
        self.items
            .iter()
            .map(EvidenceItem::rendered)
            .collect::<Vec<_>>()
            .join(ITEM_SEPARATOR)
            .trim_end()
            .to_string()
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn describe(entity: Option<&Entity>) -> &str {
    entity.map(Entity::display_description).unwrap_or(NOT_FOUND)
}

/// Pairwise lookup text; states explicitly when no edge connects the two
pub fn render_pairwise(first: &str, second: &str, pair: &PairwiseRelationships) -> String {
    let mut lines = vec![
        format!("Node 1: {}", first),
        format!("Node 2: {}", second),
        format!("Node 1 Description: {}", describe(pair.first.as_ref())),
        format!("Node 2 Description: {}", describe(pair.second.as_ref())),
    ];

    for label in &pair.forward {
        lines.push(format!("Relationship: {} -[{}]-> {}", first, label, second));
    }
    for label in &pair.backward {
        lines.push(format!("Relationship: {} -[{}]-> {}", second, label, first));
    }
    if !pair.has_relationship() {
        lines.push(NO_RELATIONSHIP.to_string());
    }

    lines.join("\n")
}

/// Neighborhood text; every edge keeps its stored direction
pub fn render_neighborhood(name: &str, neighborhood: Option<&Neighborhood>) -> String {
    let mut lines = vec![format!("Node: {}", name)];

    match neighborhood {
        Some(n) if !n.edges.is_empty() => {
            for edge in &n.edges {
                let relationship = edge.to_relationship(name);
                lines.push(format!(
                    "{} -[{}]-> {} ({})",
                    relationship.source,
                    relationship.label,
                    relationship.target,
                    edge.neighbor.display_description()
                ));
            }
        }
        _ => lines.push(format!("No neighbors found for {}.", name)),
    }

    lines.join("\n")
}

/// Placeholder for a neighborhood lookup that failed or timed out
pub fn render_lookup_failed(name: &str, reason: &str) -> String {
    format!("Node: {}\nLookup failed for {}: {}", name, name, reason)
}

pub fn render_summary(file_name: &str, summary: &str) -> String {
    format!("File: {}\nSummary: {}", file_name, summary)
}

/// A neighborhood item read back from its text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedNeighborhood {
    pub node: String,
    pub edges: Vec<Relationship>,
}

impl ParsedNeighborhood {
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.edges.iter().map(|e| e.label.as_str()).collect();
        labels.sort_unstable();
        labels.dedup();
        labels
    }
}

fn parse_edge_line(line: &str) -> Option<Relationship> {
    let (source, rest) = line.split_once(" -[")?;
    let (label, rest) = rest.split_once("]-> ")?;
    let target = match rest.rfind(" (") {
        Some(pos) if rest.ends_with(')') => &rest[..pos],
        _ => rest,
    };
    Some(Relationship::new(source, target, label))
}

/// Parse rendered neighborhood text, with or without its similarity prefix
pub fn parse_neighborhood(text: &str) -> Option<ParsedNeighborhood> {
    let mut lines = text.lines().skip_while(|l| l.starts_with("Similarity: "));
    let node = lines.next()?.strip_prefix("Node: ")?.to_string();
    let edges = lines.filter_map(parse_edge_line).collect();
    Some(ParsedNeighborhood { node, edges })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::knowledge::{EdgeDirection, NeighborEdge};

    fn pawn_neighborhood() -> Neighborhood {
        Neighborhood {
            entity: Entity::new("Pawn").with_description("a chess piece"),
            edges: vec![
                NeighborEdge {
                    direction: EdgeDirection::Outgoing,
                    label: "MOVES_LIKE".to_string(),
                    neighbor: Entity::new("ForwardStep").with_description("one square forward"),
                },
                NeighborEdge {
                    direction: EdgeDirection::Incoming,
                    label: "PROTECTED_BY".to_string(),
                    neighbor: Entity::new("King (white)"),
                },
            ],
        }
    }

    #[test]
    fn test_render_neighborhood() {
        let text = render_neighborhood("Pawn", Some(&pawn_neighborhood()));
        assert_eq!(
            text,
            "Node: Pawn\n\
             Pawn -[MOVES_LIKE]-> ForwardStep (one square forward)\n\
             King (white) -[PROTECTED_BY]-> Pawn (no description)"
        );
    }

    #[test]
    fn test_render_neighborhood_missing_or_isolated() {
        assert_eq!(render_neighborhood("Ghost", None), "Node: Ghost\nNo neighbors found for Ghost.");

        let isolated = Neighborhood {
            entity: Entity::new("Knight"),
            edges: Vec::new(),
        };
        assert!(render_neighborhood("Knight", Some(&isolated)).ends_with("No neighbors found for Knight."));
    }

    #[test]
    fn test_neighborhood_round_trip() {
        let neighborhood = pawn_neighborhood();
        let item = EvidenceItem::new(
            EvidenceKind::NodeNeighborhood,
            "Pawn",
            render_neighborhood("Pawn", Some(&neighborhood)),
        )
        .with_score(0.91);

        let parsed = parse_neighborhood(&item.rendered()).unwrap();
        assert_eq!(parsed.node, "Pawn");
        let mut expected = neighborhood.labels();
        expected.sort_unstable();
        assert_eq!(parsed.labels(), expected);
        assert_eq!(parsed.edges[1], Relationship::new("King (white)", "Pawn", "PROTECTED_BY"));
    }

    #[test]
    fn test_parse_neighborhood_rejects_other_text() {
        assert!(parse_neighborhood("File: rules.txt\nSummary: chess").is_none());
        assert!(parse_neighborhood("").is_none());
    }

    #[test]
    fn test_render_pairwise_without_relationship() {
        let pair = PairwiseRelationships {
            first: Some(Entity::new("King").with_description("the piece to protect")),
            second: Some(Entity::new("Queen").with_description("the strongest piece")),
            forward: Vec::new(),
            backward: Vec::new(),
        };

        let text = render_pairwise("King", "Queen", &pair);
        assert_eq!(
            text,
            "Node 1: King\n\
             Node 2: Queen\n\
             Node 1 Description: the piece to protect\n\
             Node 2 Description: the strongest piece\n\
             No direct relationship exists between the two nodes."
        );
    }

    #[test]
    fn test_render_pairwise_both_directions() {
        let pair = PairwiseRelationships {
            first: Some(Entity::new("King")),
            second: None,
            forward: vec!["PROTECTED_BY".to_string()],
            backward: vec!["GUARDS".to_string()],
        };

        let text = render_pairwise("King", "Pawn", &pair);
        assert!(text.contains("Node 2 Description: not found in graph"));
        assert!(text.contains("Relationship: King -[PROTECTED_BY]-> Pawn"));
        assert!(text.contains("Relationship: Pawn -[GUARDS]-> King"));
        assert!(!text.contains("No direct relationship"));
    }

    #[test]
    fn test_rendered_score_prefix() {
        let item = EvidenceItem::new(EvidenceKind::Summary, "rules.txt", render_summary("rules.txt", "Chess rules\n"))
            .with_score(0.876);
        assert_eq!(item.rendered(), "Similarity: 0.88\nFile: rules.txt\nSummary: Chess rules");
    }

    #[test]
    fn test_context_render() {
        let context = Context::new(vec![
            EvidenceItem::new(EvidenceKind::NodeNeighborhood, "Pawn", "Node: Pawn").with_score(0.9),
            EvidenceItem::new(EvidenceKind::Summary, "rules.txt", "File: rules.txt\nSummary: s").with_score(0.5),
        ]);

        assert_eq!(
            context.render(),
            "Similarity: 0.90\nNode: Pawn\n---\nSimilarity: 0.50\nFile: rules.txt\nSummary: s"
        );
        assert_eq!(context.count(EvidenceKind::Summary), 1);
        assert_eq!(Context::empty().render(), "");
    }
}
