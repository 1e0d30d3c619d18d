//! Per-generation index manifest.
//!
//! Written next to the two indices on each ingestion run; read back to open
//! the generation without re-embedding and to resolve scope keywords
//! against the known document set.

use std::path::Path;

use serde::{Deserialize, Serialize};

use docqa_core::{Error, Result};

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentEntry {
    /// Canonical source path; the document's identity.
    pub id: String,
    pub basename: String,
    pub pages: usize,
    pub passages: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub created_at: String,
    pub embedding_dim: usize,
    pub passage_count: usize,
    pub documents: Vec<DocumentEntry>,
}

impl Manifest {
    pub fn save(&self, gen_dir: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self).map_err(Error::index_build)?;
        std::fs::write(gen_dir.join(MANIFEST_FILE), raw).map_err(Error::index_build)?;
        Ok(())
    }

    pub fn load(gen_dir: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(gen_dir.join(MANIFEST_FILE))
            .map_err(|e| Error::retrieval(format!("failed to read manifest: {e}")))?;
        serde_json::from_str(&raw).map_err(|e| Error::retrieval(format!("bad manifest: {e}")))
    }
}
