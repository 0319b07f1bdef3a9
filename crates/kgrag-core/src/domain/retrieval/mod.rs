//! Query routing and hybrid retrieval
//!
//! ## Pipeline
//!
//! ```text
//! query -> QueryClassifier -> QueryIntent
//!       -> relationship?  GraphEvidenceRetriever::pairwise_relationship  (alone)
//!       -> otherwise      SimilarityRanker (one query embedding)
//!                           -> local:  nearest nodes -> neighborhoods
//!                           -> global: nearest summaries (at most one)
//!       -> Context
//! ```
//!
//! - **QueryClassifier**: text oracle + tolerant labeled-field parser
//! - **SimilarityRanker**: exact cosine top-k over an `EmbeddingIndex`
//! - **GraphEvidenceRetriever**: point lookups rendered as evidence text
//! - **ContextAssembler**: routing, fan-out and deterministic merge

mod assembler;
mod classifier;
mod evidence;
mod graph_evidence;
mod index;
mod intent;
mod ranker;

pub use assembler::ContextAssembler;
pub use classifier::QueryClassifier;
pub use evidence::{
    Context, EvidenceItem, EvidenceKind, ITEM_SEPARATOR, ParsedNeighborhood, parse_neighborhood,
    render_lookup_failed, render_neighborhood, render_pairwise, render_summary,
};
pub use graph_evidence::GraphEvidenceRetriever;
pub use index::{
    EmbeddingIndex, EmbeddingRecord, IndexSnapshot, IndexStats, NodeEmbedding, RecordPayload,
    SubjectKind, SummaryEmbedding,
};
pub use intent::{IntentParser, ParseOutcome, QueryIntent, normalize_response};
pub use ranker::{ScoredRecord, SimilarityRanker, cosine_similarity, rank, top_k, top_k_distinct};
