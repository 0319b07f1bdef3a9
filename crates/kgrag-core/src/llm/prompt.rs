//! Prompt templates
//!
//! Templates use `{name}` placeholders. Unknown placeholders are left in
//! place so a missing variable is visible in the rendered prompt.

use std::collections::HashMap;

/// Instruction sent to the text oracle to classify a query
pub const CLASSIFICATION_TEMPLATE: &str = "\
You are a query classifier for a knowledge graph question answering system.

Query: {query}

Decide whether the query asks about the relationship between exactly two named entities.
If it does, reply with:
Relationship: yes, Node1: <first entity name>, Node2: <second entity name>

Otherwise reply with:
Relationship: no

Then, on the next line, decide whether answering needs global context from document
summaries and/or local context from individual entities, and how many of each:
Global: <yes/no>, Local: <yes/no>, Nodes: <number>, Files: <number>

Reply with these labeled fields only.";

/// Instruction sent to the text oracle to answer from assembled context
pub const ANSWER_TEMPLATE: &str = "\
Query: {query}
Context: {context}
Task: Answer the query based on the given context.
Note: The context is arranged in decreasing order of relevance. \
If query is not matching with given context then reply with not enough context.";

/// A prompt with `{variable}` placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Create a template from text
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// The query classification template
    pub fn classification() -> Self {
        Self::new(CLASSIFICATION_TEMPLATE)
    }

    /// The answer generation template
    pub fn answer() -> Self {
        Self::new(ANSWER_TEMPLATE)
    }

    /// Raw template text
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Placeholder names in order of first appearance
    pub fn variables(&self) -> Vec<&str> {
        let mut names = Vec::new();
        let mut rest = self.template.as_str();
        while let Some(start) = rest.find('{') {
            let after = &rest[start + 1..];
            let Some(end) = after.find('}') else {
                break;
            };
            let name = &after[..end];
            if is_placeholder_name(name) && !names.contains(&name) {
                names.push(name);
            }
            rest = &after[end + 1..];
        }
        names
    }

    /// Substitute variables into the template
    ///
    /// Values are inserted verbatim and never re-scanned, so a value that
    /// itself contains `{query}` is not expanded.
    pub fn render(&self, variables: &HashMap<&str, &str>) -> String {
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            match after.find('}') {
                Some(end) if is_placeholder_name(&after[..end]) => {
                    let name = &after[..end];
                    match variables.get(name) {
                        Some(value) => out.push_str(value),
                        None => {
                            out.push('{');
                            out.push_str(name);
                            out.push('}');
                        }
                    }
                    rest = &after[end + 1..];
                }
                _ => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }

    /// Convenience for templates with a single `{query}` variable
    pub fn render_query(&self, query: &str) -> String {
        self.render(&HashMap::from([("query", query)]))
    }
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
