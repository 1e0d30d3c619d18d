//! Lexical passage index backed by tantivy BM25.
//!
//! Scoped search is structural, not a post-filter: a request restricted to
//! one document runs against a sub-index built from that document's
//! passages only, so term and document frequencies (and therefore ranking)
//! are relative to the scoped corpus rather than the whole collection.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tantivy::collector::TopDocs;
use tantivy::query::{AllQuery, QueryParser, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Schema, Value};
use tantivy::{doc, Index, TantivyDocument, Term};
use tracing::debug;

use docqa_core::traits::LexicalSearch;
use docqa_core::types::{Passage, RetrievalResult, ScopeFilter, SearchOrigin};
use docqa_core::{Error, Result};

use crate::schema::{build_schema, register_tokenizer};

const WRITER_HEAP_BYTES: usize = 50_000_000;

#[derive(Clone, Copy)]
struct PassageFields {
    id: Field,
    doc_id: Field,
    page: Field,
    seq: Field,
    text: Field,
}

impl PassageFields {
    fn resolve(schema: &Schema) -> Result<Self> {
        Ok(Self {
            id: schema.get_field("id").map_err(Error::retrieval)?,
            doc_id: schema.get_field("doc_id").map_err(Error::retrieval)?,
            page: schema.get_field("page").map_err(Error::retrieval)?,
            seq: schema.get_field("seq").map_err(Error::retrieval)?,
            text: schema.get_field("text").map_err(Error::retrieval)?,
        })
    }
}

pub struct LexicalIndex {
    index: Index,
    fields: PassageFields,
    scoped: Mutex<HashMap<String, Arc<Index>>>,
}

impl LexicalIndex {
    /// Build a fresh index at `dir` from the full passage set, replacing
    /// anything already there. Passage order is the tie-break order at
    /// search time.
    pub fn build(dir: &Path, passages: &[Passage]) -> Result<Self> {
        if dir.exists() {
            std::fs::remove_dir_all(dir).map_err(Error::index_build)?;
        }
        std::fs::create_dir_all(dir).map_err(Error::index_build)?;
        let schema = build_schema();
        let index = Index::create_in_dir(dir, schema.clone()).map_err(Error::index_build)?;
        register_tokenizer(&index);
        let fields = PassageFields::resolve(&schema)?;
        Self::write_passages(&index, fields, passages.iter().enumerate())?;
        debug!(count = passages.len(), "lexical index built");
        Ok(Self {
            index,
            fields,
            scoped: Mutex::new(HashMap::new()),
        })
    }

    /// Open a previously built index.
    pub fn open(dir: &Path) -> Result<Self> {
        let index = Index::open_in_dir(dir).map_err(Error::retrieval)?;
        register_tokenizer(&index);
        let fields = PassageFields::resolve(&index.schema())?;
        Ok(Self {
            index,
            fields,
            scoped: Mutex::new(HashMap::new()),
        })
    }

    /// Top-`k` BM25 hits for `query`, scoped when the filter is set. Ties
    /// are broken by passage insertion order.
    pub fn search(&self, query: &str, k: usize, scope: &ScopeFilter) -> Result<Vec<RetrievalResult>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        match &scope.document_id {
            Some(doc_id) => {
                let sub = self.scoped_index(doc_id)?;
                Self::search_index(&sub, query, k)
            }
            None => Self::search_index(&self.index, query, k),
        }
    }

    /// Every passage id in the index, in insertion order.
    pub fn passage_ids(&self) -> Result<Vec<String>> {
        let reader = self.index.reader().map_err(Error::retrieval)?;
        let searcher = reader.searcher();
        let limit = usize::max(searcher.num_docs() as usize, 1);
        let top = searcher
            .search(&AllQuery, &TopDocs::with_limit(limit))
            .map_err(Error::retrieval)?;
        let mut rows = Vec::with_capacity(top.len());
        for (_score, addr) in top {
            let stored: TantivyDocument = searcher.doc(addr).map_err(Error::retrieval)?;
            let seq = Self::read_seq(&stored, self.fields);
            let id = Self::read_text(&stored, self.fields.id);
            rows.push((seq, id));
        }
        rows.sort_by_key(|(seq, _)| *seq);
        Ok(rows.into_iter().map(|(_, id)| id).collect())
    }

    fn search_index(index: &Index, query: &str, k: usize) -> Result<Vec<RetrievalResult>> {
        let fields = PassageFields::resolve(&index.schema())?;
        let reader = index.reader().map_err(Error::retrieval)?;
        let searcher = reader.searcher();
        let parser = QueryParser::for_index(index, vec![fields.text]);
        let (parsed, parse_errors) = parser.parse_query_lenient(query);
        if !parse_errors.is_empty() {
            debug!(?parse_errors, "lenient query parse");
        }
        let top = searcher
            .search(&parsed, &TopDocs::with_limit(k))
            .map_err(Error::retrieval)?;
        let mut hits = Vec::with_capacity(top.len());
        for (score, addr) in top {
            let stored: TantivyDocument = searcher.doc(addr).map_err(Error::retrieval)?;
            hits.push((
                Self::read_seq(&stored, fields),
                RetrievalResult {
                    passage_id: Self::read_text(&stored, fields.id),
                    text: Self::read_text(&stored, fields.text),
                    document_id: Self::read_text(&stored, fields.doc_id),
                    page_number: Self::read_page(&stored, fields),
                    score,
                    origin: SearchOrigin::Lexical,
                },
            ));
        }
        hits.sort_by(|a, b| {
            b.1.score
                .partial_cmp(&a.1.score)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        Ok(hits.into_iter().map(|(_, r)| r).collect())
    }

    /// Sub-index over one document's passages, cached for the lifetime of
    /// this index object (one generation).
    fn scoped_index(&self, doc_id: &str) -> Result<Arc<Index>> {
        {
            let cache = self
                .scoped
                .lock()
                .map_err(|_| Error::retrieval("scoped index cache poisoned"))?;
            if let Some(found) = cache.get(doc_id) {
                return Ok(found.clone());
            }
        }
        let built = Arc::new(self.build_scoped(doc_id)?);
        self.scoped
            .lock()
            .map_err(|_| Error::retrieval("scoped index cache poisoned"))?
            .insert(doc_id.to_string(), built.clone());
        Ok(built)
    }

    fn build_scoped(&self, doc_id: &str) -> Result<Index> {
        let reader = self.index.reader().map_err(Error::retrieval)?;
        let searcher = reader.searcher();
        let term = Term::from_field_text(self.fields.doc_id, doc_id);
        let query = TermQuery::new(term, IndexRecordOption::Basic);
        let limit = usize::max(searcher.num_docs() as usize, 1);
        let top = searcher
            .search(&query, &TopDocs::with_limit(limit))
            .map_err(Error::retrieval)?;

        let mut rows = Vec::with_capacity(top.len());
        for (_score, addr) in top {
            let stored: TantivyDocument = searcher.doc(addr).map_err(Error::retrieval)?;
            rows.push(stored);
        }
        rows.sort_by_key(|d| Self::read_seq(d, self.fields));
        debug!(doc_id, passages = rows.len(), "building scoped sub-index");

        let sub = Index::create_in_ram(build_schema());
        register_tokenizer(&sub);
        let sub_fields = PassageFields::resolve(&sub.schema())?;
        let mut writer = sub.writer(WRITER_HEAP_BYTES).map_err(Error::retrieval)?;
        for stored in &rows {
            writer
                .add_document(doc!(
                    sub_fields.id => Self::read_text(stored, self.fields.id),
                    sub_fields.doc_id => Self::read_text(stored, self.fields.doc_id),
                    sub_fields.page => u64::from(Self::read_page(stored, self.fields)),
                    sub_fields.seq => Self::read_seq(stored, self.fields),
                    sub_fields.text => Self::read_text(stored, self.fields.text),
                ))
                .map_err(Error::retrieval)?;
        }
        writer.commit().map_err(Error::retrieval)?;
        Ok(sub)
    }

    fn write_passages<'a, I>(index: &Index, fields: PassageFields, passages: I) -> Result<()>
    where
        I: Iterator<Item = (usize, &'a Passage)>,
    {
        let mut writer = index.writer(WRITER_HEAP_BYTES).map_err(Error::index_build)?;
        for (seq, p) in passages {
            writer
                .add_document(doc!(
                    fields.id => p.id.clone(),
                    fields.doc_id => p.document_id.clone(),
                    fields.page => u64::from(p.page_number),
                    fields.seq => seq as u64,
                    fields.text => p.text.clone(),
                ))
                .map_err(Error::index_build)?;
        }
        writer.commit().map_err(Error::index_build)?;
        Ok(())
    }

    fn read_text(doc: &TantivyDocument, field: Field) -> String {
        doc.get_first(field)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }

    fn read_seq(doc: &TantivyDocument, fields: PassageFields) -> u64 {
        doc.get_first(fields.seq)
            .and_then(|v| v.as_u64())
            .unwrap_or(u64::MAX)
    }

    fn read_page(doc: &TantivyDocument, fields: PassageFields) -> u32 {
        doc.get_first(fields.page)
            .and_then(|v| v.as_u64())
            .map_or(0, |p| p as u32)
    }
}

#[async_trait]
impl LexicalSearch for LexicalIndex {
    async fn search(
        &self,
        query: &str,
        k: usize,
        scope: &ScopeFilter,
    ) -> Result<Vec<RetrievalResult>> {
        LexicalIndex::search(self, query, k, scope)
    }
}
