use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use docqa_core::chunker::Chunker;
use docqa_core::Error;
use docqa_embed::FakeEmbedder;
use docqa_hybrid::extract::PlainTextExtractor;
use docqa_hybrid::{IndexStore, IngestionPipeline};

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

#[tokio::test]
async fn both_indices_cover_the_identical_passage_set() {
    let tmp = TempDir::new().expect("tmp");
    let corpus_dir = tmp.path().join("corpus");
    let long_doc = format!("{} {}", "alpha beta gamma.".repeat(80), "The IP rating is IP55.");
    write_corpus(
        &corpus_dir,
        &[
            ("A.txt", long_doc.as_str()),
            ("B.txt", "Maximum power consumption is 35 W."),
        ],
    );

    let pair = pipeline()
        .rebuild(&corpus_dir, &tmp.path().join("index"))
        .await
        .expect("rebuild");

    let lexical_ids = pair.lexical.passage_ids().expect("lexical ids");
    let vector_ids = pair.vector.passage_ids().await.expect("vector ids");
    assert!(!lexical_ids.is_empty());
    assert_eq!(lexical_ids, vector_ids);
    assert_eq!(pair.manifest.passage_count, lexical_ids.len());
}

#[tokio::test]
async fn empty_corpus_fails_the_build() {
    let tmp = TempDir::new().expect("tmp");
    let corpus_dir = tmp.path().join("corpus");
    std::fs::create_dir_all(&corpus_dir).expect("corpus dir");

    let result = pipeline()
        .rebuild(&corpus_dir, &tmp.path().join("index"))
        .await;
    assert!(matches!(result, Err(Error::IndexBuild(_))));
}

#[tokio::test]
async fn unreadable_documents_are_skipped_not_fatal() {
    let tmp = TempDir::new().expect("tmp");
    let corpus_dir = tmp.path().join("corpus");
    write_corpus(&corpus_dir, &[("A.txt", "The IP rating is IP55.")]);
    // invalid UTF-8 makes extraction fail for this file only
    std::fs::write(corpus_dir.join("B.txt"), [0xFFu8, 0xFE, 0x00, 0x41]).expect("write");

    let pair = pipeline()
        .rebuild(&corpus_dir, &tmp.path().join("index"))
        .await
        .expect("rebuild");
    assert_eq!(pair.manifest.documents.len(), 1);
    assert_eq!(pair.manifest.documents[0].basename, "A.txt");
}

#[tokio::test]
async fn unembeddable_passages_are_dropped_from_both_indices() {
    let tmp = TempDir::new().expect("tmp");
    let corpus_dir = tmp.path().join("corpus");
    // a long run of spaces chunks into whitespace-only passages, which the
    // embedder rejects; they must vanish from both indices
    let text = format!("alpha beta gamma{}delta epsilon", " ".repeat(3000));
    write_corpus(&corpus_dir, &[("A.txt", text.as_str())]);

    let pair = pipeline()
        .rebuild(&corpus_dir, &tmp.path().join("index"))
        .await
        .expect("rebuild");

    let lexical_ids = pair.lexical.passage_ids().expect("lexical ids");
    let vector_ids = pair.vector.passage_ids().await.expect("vector ids");
    assert_eq!(lexical_ids, vector_ids);
    assert_eq!(pair.manifest.passage_count, lexical_ids.len());
    assert!(
        pair.manifest.passage_count >= 2,
        "text-bearing passages survive"
    );
    assert_eq!(
        pair.manifest.documents[0].passages,
        pair.manifest.passage_count
    );
}

#[tokio::test]
async fn rebuild_replaces_the_previous_generation() {
    let tmp = TempDir::new().expect("tmp");
    let index_root = tmp.path().join("index");

    let first_corpus = tmp.path().join("corpus-a");
    write_corpus(&first_corpus, &[("A.txt", "The IP rating is IP55.")]);
    pipeline()
        .rebuild(&first_corpus, &index_root)
        .await
        .expect("first rebuild");

    let store = IndexStore::open(&index_root).await.expect("open");
    assert_eq!(store.current().manifest.documents[0].basename, "A.txt");

    let second_corpus = tmp.path().join("corpus-b");
    write_corpus(&second_corpus, &[("B.txt", "Maximum power consumption is 35 W.")]);
    pipeline()
        .rebuild(&second_corpus, &index_root)
        .await
        .expect("second rebuild");

    // readers keep the old pair until they reload
    assert_eq!(store.current().manifest.documents[0].basename, "A.txt");
    store.reload().await.expect("reload");
    assert_eq!(store.current().manifest.documents[0].basename, "B.txt");

    // only the new generation directory remains on disk
    let generations: Vec<String> = std::fs::read_dir(&index_root)
        .expect("read index root")
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|n| n.starts_with("gen-"))
        .collect();
    assert_eq!(generations.len(), 1);
    assert_eq!(generations[0], store.current().generation);
}
