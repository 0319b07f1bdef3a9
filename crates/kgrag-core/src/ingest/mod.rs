//! Offline ingestion into the stores retrieval reads from
//!
//! - `sources`: readers for the extraction output files
//! - `GraphImporter`: idempotent graph loading
//! - `IndexBuilder`: node and summary embedding snapshots

mod importer;
mod index_builder;
mod sources;

pub use importer::{GraphImporter, ImportReport};
pub use index_builder::{BuildReport, IndexBuilder};
pub use sources::{read_edges, read_nodes, read_summaries};
