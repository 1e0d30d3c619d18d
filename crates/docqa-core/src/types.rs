//! Domain types shared by the lexical and dense engines.

use serde::{Deserialize, Serialize};

pub type PassageId = String;

/// One page of extracted document text. Page numbers start at 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

/// A source document. `id` is the canonical path of the source file and is
/// the document's identity everywhere in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub pages: Vec<PageText>,
}

/// A bounded span of one page, the unit of indexing and retrieval.
///
/// Never mutated after creation; replaced only by a full index rebuild.
/// Global insertion order (position in the ingestion-time passage slice)
/// is the stable tie-break everywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    pub id: PassageId,
    pub document_id: String,
    pub page_number: u32,
    pub text: String,
    /// Character offset of this passage within its page.
    pub start_offset: usize,
}

/// Which strategy produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchOrigin {
    Dense,
    Lexical,
}

/// A raw per-strategy hit. `score` is strategy-specific; higher is always
/// better.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub passage_id: PassageId,
    pub text: String,
    pub document_id: String,
    pub page_number: u32,
    pub score: f32,
    pub origin: SearchOrigin,
}

/// Restricts retrieval to passages of one source document when set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeFilter {
    pub document_id: Option<String>,
}

impl ScopeFilter {
    pub fn all() -> Self {
        Self { document_id: None }
    }

    pub fn document(id: impl Into<String>) -> Self {
        Self {
            document_id: Some(id.into()),
        }
    }

    pub fn matches(&self, document_id: &str) -> bool {
        self.document_id.as_deref().map_or(true, |d| d == document_id)
    }
}

/// One fused, deduplicated result per distinct passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
    pub passage_id: PassageId,
    pub text: String,
    pub document_id: String,
    pub page_number: u32,
    pub fused_score: f32,
}

/// The retrieval engine's response envelope.
///
/// Empty `results` with `degraded == false` means the query genuinely
/// matched nothing; it is not an error. `degraded` is set when one search
/// origin failed and the other answered alone. `warning` carries
/// scope-resolution notices.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Retrieval {
    pub results: Vec<FusedResult>,
    pub degraded: bool,
    pub warning: Option<String>,
}
