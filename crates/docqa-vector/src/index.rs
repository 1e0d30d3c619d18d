//! Dense passage index backed by LanceDB.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use arrow_array::{
    FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, DistanceType};
use tracing::debug;

use docqa_core::traits::DenseSearch;
use docqa_core::types::{Passage, RetrievalResult, ScopeFilter, SearchOrigin};
use docqa_core::{Error, Result};

use crate::schema::passage_schema;

pub const PASSAGE_TABLE: &str = "passages";

pub struct VectorIndex {
    db: Connection,
    table: String,
    dim: usize,
}

impl VectorIndex {
    /// Build a fresh index at `dir` from aligned passage/embedding slices,
    /// replacing anything already there. Embeddings are computed by the
    /// caller so that passages dropped for embedding failures never reach
    /// either index.
    pub async fn build(dir: &Path, passages: &[Passage], embeddings: &[Vec<f32>]) -> Result<Self> {
        if passages.len() != embeddings.len() {
            return Err(Error::index_build(format!(
                "passage/embedding count mismatch: {} vs {}",
                passages.len(),
                embeddings.len()
            )));
        }
        let dim = embeddings
            .first()
            .map(Vec::len)
            .ok_or_else(|| Error::index_build("no passages to index"))?;
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dim) {
            return Err(Error::index_build(format!(
                "inconsistent embedding dim: expected {dim}, found {}",
                bad.len()
            )));
        }
        if dir.exists() {
            std::fs::remove_dir_all(dir).map_err(Error::index_build)?;
        }
        std::fs::create_dir_all(dir).map_err(Error::index_build)?;

        let db = connect(dir.to_string_lossy().as_ref())
            .execute()
            .await
            .map_err(Error::index_build)?;
        let batch = Self::to_record_batch(passages, embeddings, dim)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        db.create_table(PASSAGE_TABLE, reader)
            .execute()
            .await
            .map_err(Error::index_build)?;
        debug!(count = passages.len(), dim, "vector index built");
        Ok(Self {
            db,
            table: PASSAGE_TABLE.to_string(),
            dim,
        })
    }

    /// Reopen a previously built index without re-embedding anything.
    /// `dim` comes from the generation manifest.
    pub async fn open(dir: &Path, dim: usize) -> Result<Self> {
        let db = connect(dir.to_string_lossy().as_ref())
            .execute()
            .await
            .map_err(Error::retrieval)?;
        let names = db.table_names().execute().await.map_err(Error::retrieval)?;
        if !names.contains(&PASSAGE_TABLE.to_string()) {
            return Err(Error::retrieval(format!(
                "missing '{PASSAGE_TABLE}' table in {}",
                dir.display()
            )));
        }
        Ok(Self {
            db,
            table: PASSAGE_TABLE.to_string(),
            dim,
        })
    }

    /// Top-`k` cosine-similarity hits for `query_vec`, scoped when the
    /// filter is set. Ties are broken by passage insertion order.
    pub async fn search(
        &self,
        query_vec: &[f32],
        k: usize,
        scope: &ScopeFilter,
    ) -> Result<Vec<RetrievalResult>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        if query_vec.len() != self.dim {
            return Err(Error::retrieval(format!(
                "query vector dim {} does not match index dim {}",
                query_vec.len(),
                self.dim
            )));
        }
        let table = self
            .db
            .open_table(&self.table)
            .execute()
            .await
            .map_err(Error::retrieval)?;
        let mut query = table
            .vector_search(query_vec.to_vec())
            .map_err(Error::retrieval)?
            .distance_type(DistanceType::Cosine)
            .limit(k);
        if let Some(doc_id) = &scope.document_id {
            query = query.only_if(format!("doc_id = '{}'", doc_id.replace('\'', "''")));
        }
        let mut stream = query.execute().await.map_err(Error::retrieval)?;
        let mut hits: Vec<(i32, RetrievalResult)> = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(Error::retrieval)? {
            for i in 0..batch.num_rows() {
                hits.push(Self::row_to_hit(&batch, i)?);
            }
        }
        hits.sort_by(|a, b| {
            b.1.score
                .partial_cmp(&a.1.score)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        hits.truncate(k);
        Ok(hits.into_iter().map(|(_, r)| r).collect())
    }

    /// Every passage id in the table, in insertion order.
    pub async fn passage_ids(&self) -> Result<Vec<String>> {
        let table = self
            .db
            .open_table(&self.table)
            .execute()
            .await
            .map_err(Error::retrieval)?;
        let mut stream = table.query().execute().await.map_err(Error::retrieval)?;
        let mut rows = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(Error::retrieval)? {
            for i in 0..batch.num_rows() {
                rows.push((Self::int_at(&batch, "seq", i)?, Self::string_at(&batch, "id", i)?));
            }
        }
        rows.sort_by_key(|(seq, _)| *seq);
        Ok(rows.into_iter().map(|(_, id)| id).collect())
    }

    fn row_to_hit(batch: &RecordBatch, i: usize) -> Result<(i32, RetrievalResult)> {
        let distance = batch
            .column_by_name("_distance")
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
            .map(|c| c.value(i))
            .ok_or_else(|| Error::retrieval("missing '_distance' column"))?;
        let result = RetrievalResult {
            passage_id: Self::string_at(batch, "id", i)?,
            text: Self::string_at(batch, "text", i)?,
            document_id: Self::string_at(batch, "doc_id", i)?,
            page_number: Self::int_at(batch, "page", i)? as u32,
            score: 1.0 - distance,
            origin: SearchOrigin::Dense,
        };
        Ok((Self::int_at(batch, "seq", i)?, result))
    }

    fn string_at(batch: &RecordBatch, name: &str, i: usize) -> Result<String> {
        batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .map(|c| c.value(i).to_string())
            .ok_or_else(|| Error::retrieval(format!("missing '{name}' column")))
    }

    fn int_at(batch: &RecordBatch, name: &str, i: usize) -> Result<i32> {
        batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
            .map(|c| c.value(i))
            .ok_or_else(|| Error::retrieval(format!("missing '{name}' column")))
    }

    fn to_record_batch(
        passages: &[Passage],
        embeddings: &[Vec<f32>],
        dim: usize,
    ) -> Result<RecordBatch> {
        let schema = passage_schema(dim as i32);
        let mut ids = Vec::with_capacity(passages.len());
        let mut doc_ids = Vec::with_capacity(passages.len());
        let mut pages = Vec::with_capacity(passages.len());
        let mut seqs = Vec::with_capacity(passages.len());
        let mut texts = Vec::with_capacity(passages.len());
        let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(passages.len());
        for (seq, (p, emb)) in passages.iter().zip(embeddings).enumerate() {
            ids.push(p.id.clone());
            doc_ids.push(p.document_id.clone());
            pages.push(p.page_number as i32);
            seqs.push(seq as i32);
            texts.push(p.text.clone());
            vectors.push(Some(emb.iter().map(|&x| Some(x)).collect()));
        }
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(doc_ids)),
                Arc::new(Int32Array::from(pages)),
                Arc::new(Int32Array::from(seqs)),
                Arc::new(StringArray::from(texts)),
                Arc::new(FixedSizeListArray::from_iter_primitive::<
                    arrow_array::types::Float32Type,
                    _,
                    _,
                >(vectors.into_iter(), dim as i32)),
            ],
        )
        .map_err(Error::index_build)
    }
}

#[async_trait]
impl DenseSearch for VectorIndex {
    async fn search(
        &self,
        query_vec: &[f32],
        k: usize,
        scope: &ScopeFilter,
    ) -> Result<Vec<RetrievalResult>> {
        VectorIndex::search(self, query_vec, k, scope).await
    }
}
