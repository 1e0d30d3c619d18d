//! Batch ingestion: corpus discovery, extraction, chunking, embedding, and
//! construction of a fresh index generation that is published atomically.
//!
//! Per-document and per-passage failures are recovered locally (skip and
//! log). The run is fatal only when zero documents extract or zero
//! passages survive embedding. Both indices are always built from the
//! identical surviving passage set.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use walkdir::WalkDir;

use docqa_core::chunker::Chunker;
use docqa_core::traits::{Embedder, TextExtractor};
use docqa_core::types::{Document, Passage};
use docqa_core::{Error, Result};
use docqa_text::LexicalIndex;
use docqa_vector::VectorIndex;

use crate::manifest::{DocumentEntry, Manifest};
use crate::store::{IndexPair, CURRENT_FILE, LEXICAL_DIR, VECTOR_DIR};

const EMBED_BATCH_SIZE: usize = 32;

static GENERATION_COUNTER: AtomicU64 = AtomicU64::new(0);

pub struct IngestionPipeline {
    extractor: Box<dyn TextExtractor>,
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
}

impl IngestionPipeline {
    pub fn new(
        extractor: Box<dyn TextExtractor>,
        embedder: Arc<dyn Embedder>,
        chunker: Chunker,
    ) -> Self {
        Self {
            extractor,
            embedder,
            chunker,
        }
    }

    /// Rebuild both indices from every supported file under `corpus_root`
    /// into a fresh generation at `index_root`, then flip the `CURRENT`
    /// pointer. Replaces the previous generation wholesale.
    pub async fn rebuild(&self, corpus_root: &Path, index_root: &Path) -> Result<IndexPair> {
        let documents = self.extract_corpus(corpus_root)?;
        if documents.is_empty() {
            return Err(Error::index_build(format!(
                "no documents could be extracted from {}",
                corpus_root.display()
            )));
        }

        let mut passages = Vec::new();
        let mut entries = Vec::new();
        for doc in &documents {
            let doc_passages = self.chunker.split(doc);
            entries.push(DocumentEntry {
                id: doc.id.clone(),
                basename: Path::new(&doc.id)
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| doc.id.clone()),
                pages: doc.pages.len(),
                passages: doc_passages.len(),
            });
            passages.extend(doc_passages);
        }

        let (passages, embeddings) = self.embed_passages(passages);
        if passages.is_empty() {
            return Err(Error::index_build(
                "no passages survived chunking and embedding",
            ));
        }
        for entry in &mut entries {
            entry.passages = passages.iter().filter(|p| p.document_id == entry.id).count();
        }

        let generation = format!(
            "gen-{}-{}",
            chrono::Utc::now().format("%Y%m%d%H%M%S"),
            GENERATION_COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        let gen_dir = index_root.join(&generation);
        std::fs::create_dir_all(&gen_dir).map_err(Error::index_build)?;

        let lexical = LexicalIndex::build(&gen_dir.join(LEXICAL_DIR), &passages)?;
        let vector = VectorIndex::build(&gen_dir.join(VECTOR_DIR), &passages, &embeddings).await?;

        let manifest = Manifest {
            created_at: chrono::Utc::now().to_rfc3339(),
            embedding_dim: self.embedder.dim(),
            passage_count: passages.len(),
            documents: entries,
        };
        manifest.save(&gen_dir)?;
        Self::publish(index_root, &generation)?;
        info!(
            generation = %generation,
            documents = documents.len(),
            passages = passages.len(),
            "ingestion complete"
        );
        Ok(IndexPair {
            lexical: Arc::new(lexical),
            vector: Arc::new(vector),
            manifest,
            generation,
        })
    }

    fn extract_corpus(&self, corpus_root: &Path) -> Result<Vec<Document>> {
        let mut files: Vec<PathBuf> = WalkDir::new(corpus_root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path().to_path_buf())
            .filter(|p| self.extractor.supports(p))
            .collect();
        files.sort();
        info!(count = files.len(), root = %corpus_root.display(), "discovered corpus files");

        let mut documents = Vec::new();
        for path in files {
            let id = std::fs::canonicalize(&path)
                .unwrap_or_else(|_| path.clone())
                .to_string_lossy()
                .to_string();
            match self.extractor.extract(&path) {
                Ok(pages) => documents.push(Document { id, pages }),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable document"),
            }
        }
        Ok(documents)
    }

    /// Embed passages in batches. A passage the provider rejects is dropped
    /// from the run entirely, so both indices see the same set.
    fn embed_passages(&self, passages: Vec<Passage>) -> (Vec<Passage>, Vec<Vec<f32>>) {
        let pb = ProgressBar::new(passages.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} passages")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        let mut kept = Vec::with_capacity(passages.len());
        let mut embeddings = Vec::with_capacity(passages.len());
        let mut skipped = 0usize;
        for batch in passages.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|p| p.text.clone()).collect();
            match self.embedder.embed_batch(&texts) {
                Ok(vecs) => {
                    for (p, v) in batch.iter().zip(vecs) {
                        kept.push(p.clone());
                        embeddings.push(v);
                    }
                }
                Err(_) => {
                    // retry one by one so a single bad passage doesn't sink
                    // the whole batch
                    for p in batch {
                        match self.embedder.embed_batch(std::slice::from_ref(&p.text)) {
                            Ok(mut vecs) => {
                                if let Some(v) = vecs.pop() {
                                    kept.push(p.clone());
                                    embeddings.push(v);
                                } else {
                                    skipped += 1;
                                    warn!(passage = %p.id, "embedder returned no vector; skipping");
                                }
                            }
                            Err(e) => {
                                skipped += 1;
                                warn!(passage = %p.id, error = %e, "skipping unembeddable passage");
                            }
                        }
                    }
                }
            }
            pb.inc(batch.len() as u64);
        }
        pb.finish_and_clear();
        if skipped > 0 {
            warn!(skipped, "passages dropped during embedding");
        }
        (kept, embeddings)
    }

    /// Flip the `CURRENT` pointer to `generation`, then delete older
    /// generations. The pointer is written to a temp file and renamed so a
    /// reader never observes a partial pointer.
    fn publish(index_root: &Path, generation: &str) -> Result<()> {
        let tmp = index_root.join("CURRENT.tmp");
        std::fs::write(&tmp, generation).map_err(Error::index_build)?;
        std::fs::rename(&tmp, index_root.join(CURRENT_FILE)).map_err(Error::index_build)?;
        for entry in std::fs::read_dir(index_root).map_err(Error::index_build)? {
            let Ok(entry) = entry else { continue };
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            if path.is_dir() && name.starts_with("gen-") && name != generation {
                if let Err(e) = std::fs::remove_dir_all(&path) {
                    warn!(path = %path.display(), error = %e, "failed to remove old generation");
                }
            }
        }
        Ok(())
    }
}
