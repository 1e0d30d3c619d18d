use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{PageText, RetrievalResult, ScopeFilter};

/// Maps text to fixed-length L2-normalized vectors. Dimensionality is
/// constant for the lifetime of a deployment.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Extracts per-page text from a source file.
pub trait TextExtractor: Send + Sync {
    /// Whether this extractor can handle the given file.
    fn supports(&self, path: &Path) -> bool;
    fn extract(&self, path: &Path) -> Result<Vec<PageText>>;
}

/// Rewrites one query into several paraphrases to broaden recall.
///
/// Must return at least one element; the original query comes first by
/// convention.
pub trait QueryExpander: Send + Sync {
    fn expand(&self, query: &str) -> Result<Vec<String>>;
}

/// Term-frequency ranked search over the passage set.
#[async_trait]
pub trait LexicalSearch: Send + Sync {
    async fn search(&self, query: &str, k: usize, scope: &ScopeFilter)
        -> Result<Vec<RetrievalResult>>;
}

/// Embedding-similarity search over the passage set.
#[async_trait]
pub trait DenseSearch: Send + Sync {
    async fn search(&self, query_vec: &[f32], k: usize, scope: &ScopeFilter)
        -> Result<Vec<RetrievalResult>>;
}

#[async_trait]
impl<T: LexicalSearch + ?Sized> LexicalSearch for Arc<T> {
    async fn search(
        &self,
        query: &str,
        k: usize,
        scope: &ScopeFilter,
    ) -> Result<Vec<RetrievalResult>> {
        (**self).search(query, k, scope).await
    }
}

#[async_trait]
impl<T: DenseSearch + ?Sized> DenseSearch for Arc<T> {
    async fn search(
        &self,
        query_vec: &[f32],
        k: usize,
        scope: &ScopeFilter,
    ) -> Result<Vec<RetrievalResult>> {
        (**self).search(query_vec, k, scope).await
    }
}
