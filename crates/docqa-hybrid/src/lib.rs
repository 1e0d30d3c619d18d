//! docqa-hybrid
//!
//! Hybrid retrieval over a fixed document corpus: the ingestion pipeline
//! builds a dense + lexical index pair from the identical passage set, and
//! the engine fuses both strategies into one ranked, deduplicated,
//! scope-filtered result list.

pub mod engine;
pub mod extract;
pub mod fusion;
pub mod manifest;
pub mod pipeline;
pub mod scope;
pub mod store;

pub use engine::{HybridRetriever, RetrieverConfig, RetrieverService};
pub use pipeline::IngestionPipeline;
pub use store::{IndexPair, IndexStore};
