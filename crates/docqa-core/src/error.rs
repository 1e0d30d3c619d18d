use thiserror::Error;

/// Failure taxonomy for ingestion and retrieval.
///
/// `Extraction` and `Embedding` are recovered locally during ingestion
/// (skip the document or passage, log, continue). `IndexBuild` aborts an
/// ingestion run. `Retrieval` surfaces backend failures to the caller and
/// is never retried internally. `ScopeNotFound` makes the engine fall back
/// to an unfiltered search and report a warning.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to extract {path}: {reason}")]
    Extraction { path: String, reason: String },

    #[error("failed to embed text: {0}")]
    Embedding(String),

    #[error("index build failed: {0}")]
    IndexBuild(String),

    #[error("retrieval backend error: {0}")]
    Retrieval(String),

    #[error("scope '{0}' does not match exactly one known document")]
    ScopeNotFound(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn extraction(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::Extraction {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn embedding(reason: impl ToString) -> Self {
        Self::Embedding(reason.to_string())
    }

    pub fn index_build(reason: impl ToString) -> Self {
        Self::IndexBuild(reason.to_string())
    }

    pub fn retrieval(reason: impl ToString) -> Self {
        Self::Retrieval(reason.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
