//! docqa-text
//!
//! Tantivy-backed lexical (BM25) passage index. See `index` for the build,
//! open, and search paths, and `schema` for the shared schema and analyzer.

pub mod index;
pub mod schema;

pub use index::LexicalIndex;
