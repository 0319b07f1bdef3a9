//! Extraction output files
//!
//! - `nodes.json`: `[[name, description], ...]`
//! - `edges.json`: `[[source, target, label], ...]`
//! - `file_summaries.json`: `{"file_name": "summary", ...}`

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::domain::knowledge::{Entity, Relationship};
use crate::error::{Error, Result};

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .map_err(|e| Error::InvalidInput(format!("cannot read {}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| Error::InvalidInput(format!("cannot parse {}: {}", path.display(), e)))
}

/// Load entities from a `nodes.json` file
pub fn read_nodes(path: &Path) -> Result<Vec<Entity>> {
    let rows: Vec<(String, String)> = read_json(path)?;
    Ok(rows.into_iter().map(Entity::from).collect())
}

/// Load relationships from an `edges.json` file
pub fn read_edges(path: &Path) -> Result<Vec<Relationship>> {
    let rows: Vec<(String, String, String)> = read_json(path)?;
    Ok(rows.into_iter().map(Relationship::from).collect())
}

/// Load per-file summaries, ordered by file name
pub fn read_summaries(path: &Path) -> Result<BTreeMap<String, String>> {
    read_json(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_sources() {
        let dir = tempfile::tempdir().unwrap();
        let nodes = dir.path().join("nodes.json");
        let edges = dir.path().join("edges.json");
        let summaries = dir.path().join("file_summaries.json");

        fs::write(&nodes, r#"[["Pawn", "a chess piece"], ["ForwardStep", "one square"]]"#).unwrap();
        fs::write(&edges, r#"[["Pawn", "ForwardStep", "MOVES_LIKE"]]"#).unwrap();
        fs::write(&summaries, r#"{"rules.txt": "How pieces move", "a.txt": "Intro"}"#).unwrap();

        let entities = read_nodes(&nodes).unwrap();
        assert_eq!(entities[0], Entity::new("Pawn").with_description("a chess piece"));

        let relationships = read_edges(&edges).unwrap();
        assert_eq!(relationships, vec![Relationship::new("Pawn", "ForwardStep", "MOVES_LIKE")]);

        let summaries = read_summaries(&summaries).unwrap();
        assert_eq!(summaries.keys().collect::<Vec<_>>(), vec!["a.txt", "rules.txt"]);
    }

    #[test]
    fn test_malformed_rows_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let edges = dir.path().join("edges.json");
        fs::write(&edges, r#"[["Pawn", "ForwardStep"]]"#).unwrap();

        let err = read_edges(&edges).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(err.to_string().contains("edges.json"));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            read_nodes(Path::new("/nonexistent/nodes.json")),
            Err(Error::InvalidInput(_))
        ));
    }
}
