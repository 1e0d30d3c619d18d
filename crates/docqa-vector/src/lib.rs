//! docqa-vector
//!
//! LanceDB-backed dense passage index. The table is written once per
//! ingestion run from caller-supplied embeddings and reopened read-only at
//! query time, so process startup never re-embeds anything.

pub mod index;
pub mod schema;

pub use index::{VectorIndex, PASSAGE_TABLE};
