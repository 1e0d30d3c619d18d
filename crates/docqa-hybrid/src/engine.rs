//! Query-time orchestration: scope resolution, query expansion fan-out,
//! per-origin search, fusion, and degraded fallback when one strategy
//! fails.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use docqa_core::traits::{DenseSearch, Embedder, LexicalSearch, QueryExpander};
use docqa_core::types::{Retrieval, RetrievalResult, ScopeFilter};
use docqa_core::{Error, Result};

use crate::fusion::{fuse, FusionWeights};
use crate::scope::ScopeResolver;
use crate::store::IndexStore;

#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Hits requested from each strategy, per query variant.
    pub dense_k: usize,
    pub lexical_k: usize,
    /// Size of the final fused result list.
    pub final_k: usize,
    pub weights: FusionWeights,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            dense_k: 4,
            lexical_k: 4,
            final_k: 6,
            weights: FusionWeights::default(),
        }
    }
}

/// Fixed two-strategy retriever. Generic over the search seams so tests
/// can substitute canned or failing backends.
pub struct HybridRetriever<L, D> {
    lexical: L,
    dense: D,
    embedder: Arc<dyn Embedder>,
    expander: Option<Arc<dyn QueryExpander>>,
    resolver: ScopeResolver,
    config: RetrieverConfig,
}

impl<L: LexicalSearch, D: DenseSearch> HybridRetriever<L, D> {
    pub fn new(
        lexical: L,
        dense: D,
        embedder: Arc<dyn Embedder>,
        resolver: ScopeResolver,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            lexical,
            dense,
            embedder,
            expander: None,
            resolver,
            config,
        }
    }

    #[must_use]
    pub fn with_expander(mut self, expander: Arc<dyn QueryExpander>) -> Self {
        self.expander = Some(expander);
        self
    }

    /// Retrieve fused passages for `query`, optionally restricted to the
    /// document matching `scope_keyword`.
    ///
    /// An unresolvable scope degrades to an unfiltered search and sets
    /// `warning`. A failed origin is discarded entirely (never blended
    /// with substitute scores) and sets `degraded`; only when both origins
    /// fail does the call error.
    pub async fn retrieve(&self, query: &str, scope_keyword: Option<&str>) -> Result<Retrieval> {
        let (scope, warning) = self.resolve_scope(scope_keyword);
        let variants = self.variants(query);

        let mut per_variant: Vec<(Vec<RetrievalResult>, Vec<RetrievalResult>)> = Vec::new();
        let mut dense_err: Option<Error> = None;
        let mut lexical_err: Option<Error> = None;
        for variant in &variants {
            let mut dense_hits = Vec::new();
            let mut lexical_hits = Vec::new();
            if dense_err.is_none() {
                match self.dense_search(variant, &scope).await {
                    Ok(hits) => dense_hits = hits,
                    Err(e) => {
                        warn!(error = %e, "dense search failed");
                        dense_err = Some(e);
                    }
                }
            }
            if lexical_err.is_none() {
                match self
                    .lexical
                    .search(variant, self.config.lexical_k, &scope)
                    .await
                {
                    Ok(hits) => lexical_hits = hits,
                    Err(e) => {
                        warn!(error = %e, "lexical search failed");
                        lexical_err = Some(e);
                    }
                }
            }
            per_variant.push((dense_hits, lexical_hits));
        }

        if let (Some(d), Some(l)) = (&dense_err, &lexical_err) {
            return Err(Error::retrieval(format!(
                "both retrieval strategies failed: dense: {d}; lexical: {l}"
            )));
        }
        let degraded = dense_err.is_some() || lexical_err.is_some();

        let mut pooled = Vec::new();
        for (dense_hits, lexical_hits) in per_variant {
            if dense_err.is_none() {
                pooled.extend(dense_hits);
            }
            if lexical_err.is_none() {
                pooled.extend(lexical_hits);
            }
        }
        let results = fuse(&pooled, self.config.weights, self.config.final_k);
        debug!(
            variants = variants.len(),
            results = results.len(),
            degraded,
            "retrieval complete"
        );
        Ok(Retrieval {
            results,
            degraded,
            warning,
        })
    }

    fn resolve_scope(&self, keyword: Option<&str>) -> (ScopeFilter, Option<String>) {
        match keyword {
            None => (ScopeFilter::all(), None),
            Some(kw) => match self.resolver.resolve(kw) {
                Ok(scope) => (scope, None),
                Err(e) => {
                    warn!(keyword = kw, "scope resolution failed; searching unfiltered");
                    (ScopeFilter::all(), Some(e.to_string()))
                }
            },
        }
    }

    /// Query variants in search order: the original first, then distinct
    /// paraphrases. A failing expander falls back to the original alone.
    fn variants(&self, query: &str) -> Vec<String> {
        let mut variants = match &self.expander {
            Some(expander) => match expander.expand(query) {
                Ok(v) if !v.is_empty() => v,
                Ok(_) => vec![query.to_string()],
                Err(e) => {
                    warn!(error = %e, "query expansion failed; using the original query");
                    vec![query.to_string()]
                }
            },
            None => vec![query.to_string()],
        };
        if !variants.iter().any(|v| v == query) {
            variants.insert(0, query.to_string());
        }
        let mut seen = HashSet::new();
        variants.retain(|v| seen.insert(v.clone()));
        variants
    }

    async fn dense_search(&self, variant: &str, scope: &ScopeFilter) -> Result<Vec<RetrievalResult>> {
        let query_vec = self
            .embedder
            .embed_batch(&[variant.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding("embedder returned no vector"))?;
        self.dense.search(&query_vec, self.config.dense_k, scope).await
    }
}

/// Serving facade: couples the swappable index store with the deployment
/// embedder and an optional query expander.
pub struct RetrieverService {
    store: IndexStore,
    embedder: Arc<dyn Embedder>,
    expander: Option<Arc<dyn QueryExpander>>,
    config: RetrieverConfig,
}

impl RetrieverService {
    pub fn new(store: IndexStore, embedder: Arc<dyn Embedder>, config: RetrieverConfig) -> Self {
        Self {
            store,
            embedder,
            expander: None,
            config,
        }
    }

    #[must_use]
    pub fn with_expander(mut self, expander: Arc<dyn QueryExpander>) -> Self {
        self.expander = Some(expander);
        self
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub async fn retrieve(&self, query: &str, scope_keyword: Option<&str>) -> Result<Retrieval> {
        let pair = self.store.current();
        let resolver = ScopeResolver::from_manifest(&pair.manifest);
        let mut retriever = HybridRetriever::new(
            pair.lexical.clone(),
            pair.vector.clone(),
            self.embedder.clone(),
            resolver,
            self.config.clone(),
        );
        if let Some(expander) = &self.expander {
            retriever = retriever.with_expander(expander.clone());
        }
        retriever.retrieve(query, scope_keyword).await
    }
}
