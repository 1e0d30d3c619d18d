//! Generation directories and the swappable "current index pair".
//!
//! An ingestion run writes a complete generation (both indices plus
//! manifest) under the index root, then flips the `CURRENT` pointer file.
//! Readers clone the active pair out of the store, so a rebuild is
//! invisible to them until `reload` and a half-built generation is never
//! observable.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::info;

use docqa_core::{Error, Result};
use docqa_text::LexicalIndex;
use docqa_vector::VectorIndex;

use crate::manifest::Manifest;

pub const CURRENT_FILE: &str = "CURRENT";
pub const LEXICAL_DIR: &str = "tantivy";
pub const VECTOR_DIR: &str = "lance";

/// One immutable index generation.
pub struct IndexPair {
    pub lexical: Arc<LexicalIndex>,
    pub vector: Arc<VectorIndex>,
    pub manifest: Manifest,
    pub generation: String,
}

impl IndexPair {
    /// Open a complete generation directory.
    pub async fn open(gen_dir: &Path) -> Result<Self> {
        let manifest = Manifest::load(gen_dir)?;
        let lexical = LexicalIndex::open(&gen_dir.join(LEXICAL_DIR))?;
        let vector = VectorIndex::open(&gen_dir.join(VECTOR_DIR), manifest.embedding_dim).await?;
        let generation = gen_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(Self {
            lexical: Arc::new(lexical),
            vector: Arc::new(vector),
            manifest,
            generation,
        })
    }
}

/// Holds the active generation; swap on reload, clone-out on read.
pub struct IndexStore {
    root: PathBuf,
    current: RwLock<Arc<IndexPair>>,
}

impl IndexStore {
    /// Open the store at `root`, loading the generation named by `CURRENT`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let pair = Self::load_current(&root).await?;
        Ok(Self {
            root,
            current: RwLock::new(Arc::new(pair)),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The active pair. Cheap; safe to call once per query.
    pub fn current(&self) -> Arc<IndexPair> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Re-read `CURRENT` and swap the active pair. In-flight readers keep
    /// the pair they already hold.
    pub async fn reload(&self) -> Result<()> {
        let pair = Arc::new(Self::load_current(&self.root).await?);
        info!(generation = %pair.generation, "index store reloaded");
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = pair;
        Ok(())
    }

    async fn load_current(root: &Path) -> Result<IndexPair> {
        let pointer = root.join(CURRENT_FILE);
        let name = std::fs::read_to_string(&pointer)
            .map_err(|e| Error::retrieval(format!("no active index at {}: {e}", root.display())))?;
        IndexPair::open(&root.join(name.trim())).await
    }
}
