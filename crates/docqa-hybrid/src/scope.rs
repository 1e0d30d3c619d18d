//! Resolves a scope keyword to a document identity.
//!
//! Matching runs against file basenames: an exact match wins, otherwise a
//! case-sensitive substring match must be unique. Zero candidates and
//! ambiguous sets (e.g. "DM8" against both "DM8.pdf" and "DM8SE.pdf") are
//! both `ScopeNotFound`; first-match-wins on directory order would make
//! scoped retrieval depend on listing order.

use docqa_core::types::ScopeFilter;
use docqa_core::{Error, Result};

use crate::manifest::Manifest;

#[derive(Debug, Clone)]
pub struct ScopeResolver {
    /// `(basename, document id)` pairs, sorted by document id.
    documents: Vec<(String, String)>,
}

impl ScopeResolver {
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let mut documents: Vec<(String, String)> = manifest
            .documents
            .iter()
            .map(|d| (d.basename.clone(), d.id.clone()))
            .collect();
        documents.sort_by(|a, b| a.1.cmp(&b.1));
        Self { documents }
    }

    /// Resolve `keyword` to a filter carrying the matched document id.
    pub fn resolve(&self, keyword: &str) -> Result<ScopeFilter> {
        if keyword.is_empty() {
            return Err(Error::ScopeNotFound(keyword.to_string()));
        }
        if let Some((_, id)) = self.documents.iter().find(|(name, _)| name == keyword) {
            return Ok(ScopeFilter::document(id.clone()));
        }
        let candidates: Vec<&(String, String)> = self
            .documents
            .iter()
            .filter(|(name, _)| name.contains(keyword))
            .collect();
        match candidates.as_slice() {
            [(_, id)] => Ok(ScopeFilter::document(id.clone())),
            [] => Err(Error::ScopeNotFound(keyword.to_string())),
            _ => Err(Error::ScopeNotFound(format!(
                "{keyword} (matches {} documents)",
                candidates.len()
            ))),
        }
    }
}
