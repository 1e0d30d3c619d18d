use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use docqa_core::chunker::Chunker;
use docqa_core::traits::{DenseSearch, LexicalSearch, QueryExpander};
use docqa_core::types::{RetrievalResult, ScopeFilter, SearchOrigin};
use docqa_core::{Error, Result};
use docqa_embed::FakeEmbedder;
use docqa_hybrid::engine::{HybridRetriever, RetrieverConfig};
use docqa_hybrid::extract::PlainTextExtractor;
use docqa_hybrid::manifest::Manifest;
use docqa_hybrid::scope::ScopeResolver;
use docqa_hybrid::{IndexStore, IngestionPipeline, RetrieverService};

fn write_corpus(dir: &Path, files: &[(&str, &str)]) {
    std::fs::create_dir_all(dir).expect("corpus dir");
    for (name, content) in files {
        std::fs::write(dir.join(name), content).expect("write corpus file");
    }
}

fn pipeline() -> IngestionPipeline {
    IngestionPipeline::new(
        Box::new(PlainTextExtractor),
        Arc::new(FakeEmbedder::new()),
        Chunker::default(),
    )
}

async fn service_over(corpus: &[(&str, &str)], tmp: &TempDir) -> RetrieverService {
    let corpus_dir = tmp.path().join("corpus");
    write_corpus(&corpus_dir, corpus);
    let index_root = tmp.path().join("index");
    pipeline()
        .rebuild(&corpus_dir, &index_root)
        .await
        .expect("rebuild");
    let store = IndexStore::open(&index_root).await.expect("open store");
    RetrieverService::new(store, Arc::new(FakeEmbedder::new()), RetrieverConfig::default())
}

#[tokio::test]
async fn ip_rating_question_returns_the_matching_passage_first() {
    let tmp = TempDir::new().expect("tmp");
    let service = service_over(
        &[("A.txt", "The IP rating is IP55. Weight is 10.3 kg.")],
        &tmp,
    )
    .await;

    let retrieval = service
        .retrieve("What is the IP rating?", None)
        .await
        .expect("retrieve");
    assert!(!retrieval.results.is_empty());
    assert!(retrieval.results[0].text.contains("IP55"));
    assert!(!retrieval.degraded);
    assert!(retrieval.warning.is_none());
}

#[tokio::test]
async fn scope_excludes_every_other_document() {
    let tmp = TempDir::new().expect("tmp");
    let service = service_over(
        &[
            (
                "A.txt",
                "Power handling is 125 W continuous. The loudspeaker power rating is conservative.",
            ),
            (
                "B.txt",
                "Maximum power consumption is 35 W. The processor power supply is internal.",
            ),
        ],
        &tmp,
    )
    .await;

    let retrieval = service.retrieve("power", Some("B")).await.expect("retrieve");
    assert!(retrieval.warning.is_none());
    assert!(!retrieval.results.is_empty());
    for r in &retrieval.results {
        assert!(
            r.document_id.ends_with("B.txt"),
            "scoped result from the wrong document: {}",
            r.document_id
        );
    }
}

struct CannedExpander(Vec<String>);

impl QueryExpander for CannedExpander {
    fn expand(&self, _query: &str) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn expansion_variants_still_deduplicate_to_one_passage() {
    let tmp = TempDir::new().expect("tmp");
    let service = service_over(&[("A.txt", "The IP rating is IP55.")], &tmp)
        .await
        .with_expander(Arc::new(CannedExpander(vec![
            "What is the IP rating?".to_string(),
            "Which IP rating does it have?".to_string(),
            "Tell me the IP rating".to_string(),
        ])));

    let retrieval = service
        .retrieve("What is the IP rating?", None)
        .await
        .expect("retrieve");
    assert_eq!(
        retrieval.results.len(),
        1,
        "three variants over a one-passage corpus still fuse to one result"
    );
}

#[tokio::test]
async fn repeated_queries_return_identical_rankings() {
    let tmp = TempDir::new().expect("tmp");
    let service = service_over(
        &[
            ("A.txt", "The IP rating is IP55. Weight is 10.3 kg. Power handling is 125 W."),
            ("B.txt", "Maximum power consumption is 35 W. Dynamic range is 115 dB."),
        ],
        &tmp,
    )
    .await;

    let first = service.retrieve("power rating", None).await.expect("retrieve");
    let second = service.retrieve("power rating", None).await.expect("retrieve");
    assert_eq!(first.results, second.results);
}

#[tokio::test]
async fn unknown_scope_degrades_to_unfiltered_with_a_warning() {
    let tmp = TempDir::new().expect("tmp");
    let service = service_over(
        &[
            ("A.txt", "Power handling is 125 W continuous."),
            ("B.txt", "Maximum power consumption is 35 W."),
        ],
        &tmp,
    )
    .await;

    let retrieval = service
        .retrieve("power", Some("ZZZ"))
        .await
        .expect("retrieve");
    assert!(retrieval.warning.is_some());
    assert!(!retrieval.results.is_empty(), "falls back to unfiltered search");
}

#[tokio::test]
async fn ambiguous_scope_is_reported_and_searched_unfiltered() {
    let tmp = TempDir::new().expect("tmp");
    let service = service_over(
        &[
            ("DM8.txt", "Full range driver with 8 inch woofer."),
            ("DM8SE.txt", "Full range driver with passive crossover."),
        ],
        &tmp,
    )
    .await;

    let retrieval = service
        .retrieve("driver", Some("DM8"))
        .await
        .expect("retrieve");
    assert!(retrieval.warning.is_some(), "DM8 matches two basenames");
    assert!(!retrieval.results.is_empty());
}

// --- degraded fallback, exercised through the trait seams ---

struct FailingLexical;

#[async_trait]
impl LexicalSearch for FailingLexical {
    async fn search(
        &self,
        _query: &str,
        _k: usize,
        _scope: &ScopeFilter,
    ) -> Result<Vec<RetrievalResult>> {
        Err(Error::retrieval("lexical backend offline"))
    }
}

struct EmptyLexical;

#[async_trait]
impl LexicalSearch for EmptyLexical {
    async fn search(
        &self,
        _query: &str,
        _k: usize,
        _scope: &ScopeFilter,
    ) -> Result<Vec<RetrievalResult>> {
        Ok(Vec::new())
    }
}

struct FailingDense;

#[async_trait]
impl DenseSearch for FailingDense {
    async fn search(
        &self,
        _query_vec: &[f32],
        _k: usize,
        _scope: &ScopeFilter,
    ) -> Result<Vec<RetrievalResult>> {
        Err(Error::retrieval("dense backend offline"))
    }
}

struct CannedDense(Vec<RetrievalResult>);

#[async_trait]
impl DenseSearch for CannedDense {
    async fn search(
        &self,
        _query_vec: &[f32],
        k: usize,
        _scope: &ScopeFilter,
    ) -> Result<Vec<RetrievalResult>> {
        Ok(self.0.iter().take(k).cloned().collect())
    }
}

fn dense_hit(id: &str, score: f32) -> RetrievalResult {
    RetrievalResult {
        passage_id: id.to_string(),
        text: format!("text {id}"),
        document_id: "/corpus/A.txt".to_string(),
        page_number: 0,
        score,
        origin: SearchOrigin::Dense,
    }
}

fn empty_resolver() -> ScopeResolver {
    ScopeResolver::from_manifest(&Manifest {
        created_at: String::new(),
        embedding_dim: 1024,
        passage_count: 0,
        documents: Vec::new(),
    })
}

#[tokio::test]
async fn lexical_failure_degrades_to_dense_only() {
    let retriever = HybridRetriever::new(
        FailingLexical,
        CannedDense(vec![dense_hit("p1", 0.9), dense_hit("p2", 0.4)]),
        Arc::new(FakeEmbedder::new()),
        empty_resolver(),
        RetrieverConfig::default(),
    );
    let retrieval = retriever.retrieve("anything", None).await.expect("retrieve");
    assert!(retrieval.degraded);
    assert_eq!(retrieval.results.len(), 2);
    assert_eq!(retrieval.results[0].passage_id, "p1");
}

#[tokio::test]
async fn both_origins_failing_is_an_error() {
    let retriever = HybridRetriever::new(
        FailingLexical,
        FailingDense,
        Arc::new(FakeEmbedder::new()),
        empty_resolver(),
        RetrieverConfig::default(),
    );
    assert!(retriever.retrieve("anything", None).await.is_err());
}

#[tokio::test]
async fn no_hits_at_all_is_empty_and_not_degraded() {
    let retriever = HybridRetriever::new(
        EmptyLexical,
        CannedDense(Vec::new()),
        Arc::new(FakeEmbedder::new()),
        empty_resolver(),
        RetrieverConfig::default(),
    );
    let retrieval = retriever.retrieve("anything", None).await.expect("retrieve");
    assert!(retrieval.results.is_empty());
    assert!(!retrieval.degraded);
}

#[tokio::test]
async fn retrieval_surfaces_expected_keywords() {
    let tmp = TempDir::new().expect("tmp");
    let service = service_over(
        &[
            (
                "DM8SE.txt",
                "The IP rating of the loudspeaker is IP55.\n\nNet weight of a single unit is 10.3 kg (22.8 lb).",
            ),
            (
                "EX-1280C.txt",
                "Maximum power consumption of the processor is 35 W.\n\nDynamic range of the analog signal path is 115 dB.",
            ),
        ],
        &tmp,
    )
    .await;

    let cases = [
        ("What is the maximum power consumption?", "35 W", Some("EX-1280C")),
        ("What is the IP rating of the loudspeaker?", "IP55", Some("DM8SE")),
        ("What is the net weight of a single unit?", "10.3 kg", Some("DM8SE")),
        ("What is the dynamic range of the analog signal path?", "115 dB", None),
    ];
    for (question, expected, scope) in cases {
        let retrieval = service.retrieve(question, scope).await.expect("retrieve");
        assert!(
            retrieval
                .results
                .iter()
                .any(|r| r.text.contains(expected)),
            "{question}: no result contained {expected:?}"
        );
    }
}
