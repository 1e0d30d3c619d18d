use docqa_core::types::{Passage, ScopeFilter};
use docqa_text::LexicalIndex;
use tempfile::TempDir;

fn passage(id: &str, doc: &str, text: &str) -> Passage {
    Passage {
        id: id.to_string(),
        document_id: doc.to_string(),
        page_number: 0,
        text: text.to_string(),
        start_offset: 0,
    }
}

fn corpus() -> Vec<Passage> {
    vec![
        passage("a#p0-0", "/corpus/A.pdf", "The IP rating is IP55. Weight is 10.3 kg."),
        passage("a#p0-1", "/corpus/A.pdf", "Power handling is 125 W continuous."),
        passage("b#p0-0", "/corpus/B.pdf", "Maximum power consumption is 35 W."),
        passage("b#p0-1", "/corpus/B.pdf", "The processor supports acoustic echo cancellation."),
    ]
}

#[test]
fn search_finds_the_matching_passage() {
    let tmp = TempDir::new().expect("tmp");
    let index = LexicalIndex::build(&tmp.path().join("lex"), &corpus()).expect("build");
    let hits = index
        .search("What is the IP rating?", 4, &ScopeFilter::all())
        .expect("search");
    assert!(!hits.is_empty());
    assert_eq!(hits[0].passage_id, "a#p0-0");
    assert!(hits[0].text.contains("IP55"));
    assert_eq!(hits[0].document_id, "/corpus/A.pdf");
}

#[test]
fn search_respects_k() {
    let tmp = TempDir::new().expect("tmp");
    let index = LexicalIndex::build(&tmp.path().join("lex"), &corpus()).expect("build");
    let hits = index
        .search("power rating processor", 1, &ScopeFilter::all())
        .expect("search");
    assert_eq!(hits.len(), 1);
}

#[test]
fn scoped_search_is_restricted_to_one_document() {
    let tmp = TempDir::new().expect("tmp");
    let index = LexicalIndex::build(&tmp.path().join("lex"), &corpus()).expect("build");
    let hits = index
        .search("power", 4, &ScopeFilter::document("/corpus/B.pdf"))
        .expect("search");
    assert!(!hits.is_empty());
    for h in &hits {
        assert_eq!(h.document_id, "/corpus/B.pdf");
    }
}

#[test]
fn scoped_ranking_uses_the_scoped_corpus_statistics() {
    // "power" appears in both documents, so it is a common term
    // corpus-wide; restricted to B it must still rank normally because the
    // sub-index statistics only see B's passages.
    let tmp = TempDir::new().expect("tmp");
    let index = LexicalIndex::build(&tmp.path().join("lex"), &corpus()).expect("build");
    let hits = index
        .search("power", 4, &ScopeFilter::document("/corpus/B.pdf"))
        .expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].passage_id, "b#p0-0");
    assert!(hits[0].score.is_finite());
    assert!(hits[0].score > 0.0);
}

#[test]
fn unknown_scope_document_yields_empty() {
    let tmp = TempDir::new().expect("tmp");
    let index = LexicalIndex::build(&tmp.path().join("lex"), &corpus()).expect("build");
    let hits = index
        .search("power", 4, &ScopeFilter::document("/corpus/C.pdf"))
        .expect("search");
    assert!(hits.is_empty());
}

#[test]
fn reopen_returns_the_same_passages() {
    let tmp = TempDir::new().expect("tmp");
    let dir = tmp.path().join("lex");
    LexicalIndex::build(&dir, &corpus()).expect("build");

    let reopened = LexicalIndex::open(&dir).expect("open");
    let ids = reopened.passage_ids().expect("ids");
    assert_eq!(ids, vec!["a#p0-0", "a#p0-1", "b#p0-0", "b#p0-1"]);
}

#[test]
fn stopword_only_query_matches_nothing() {
    let tmp = TempDir::new().expect("tmp");
    let index = LexicalIndex::build(&tmp.path().join("lex"), &corpus()).expect("build");
    let hits = index.search("the is of", 4, &ScopeFilter::all()).expect("search");
    assert!(hits.is_empty());
}
