use std::env;
use std::path::{Path, PathBuf};

use anyhow::Context;

use docqa_core::chunker::Chunker;
use docqa_core::config::Config;
use docqa_embed::default_embedder;
use docqa_hybrid::extract::CompositeExtractor;
use docqa_hybrid::{IndexStore, IngestionPipeline, RetrieverConfig, RetrieverService};

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().collect();
    let prog = args.remove(0);
    if args.is_empty() {
        eprintln!("Usage: {prog} <ingest|query|status> [args...]");
        std::process::exit(1);
    }
    let cmd = args.remove(0);
    (cmd, args)
}

fn basename(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let config = Config::load().context("loading configuration")?;
    let index_root = PathBuf::from(
        config
            .get::<String>("data.index_dir")
            .unwrap_or_else(|_| "data/index".to_string()),
    );
    let (cmd, args) = parse_args();
    match cmd.as_str() {
        "ingest" => {
            let corpus_dir = args.first().map(PathBuf::from).unwrap_or_else(|| {
                PathBuf::from(
                    config
                        .get::<String>("data.corpus_dir")
                        .unwrap_or_else(|_| "data/corpus".to_string()),
                )
            });
            println!("Ingesting corpus from {}", corpus_dir.display());
            let pipeline = IngestionPipeline::new(
                Box::new(CompositeExtractor::stock()),
                default_embedder()?,
                Chunker::default(),
            );
            let pair = pipeline.rebuild(&corpus_dir, &index_root).await?;
            println!(
                "✅ Ingest complete: {} documents, {} passages (generation {})",
                pair.manifest.documents.len(),
                pair.manifest.passage_count,
                pair.generation
            );
        }
        "query" => {
            let mut query = None;
            let mut scope = None;
            let mut top = None;
            let mut i = 0;
            while i < args.len() {
                match args[i].as_str() {
                    "--scope" | "-s" => {
                        if i + 1 < args.len() {
                            scope = Some(args[i + 1].clone());
                            i += 1;
                        } else {
                            eprintln!("Error: --scope requires a value");
                            std::process::exit(1);
                        }
                    }
                    "--top" | "-k" => {
                        if i + 1 < args.len() {
                            match args[i + 1].parse::<usize>() {
                                Ok(n) => top = Some(n),
                                Err(_) => {
                                    eprintln!("Error: --top requires a number");
                                    std::process::exit(1);
                                }
                            }
                            i += 1;
                        } else {
                            eprintln!("Error: --top requires a number");
                            std::process::exit(1);
                        }
                    }
                    _ if query.is_none() => query = Some(args[i].clone()),
                    other => eprintln!("Ignoring unexpected argument: {other}"),
                }
                i += 1;
            }
            let Some(query) = query else {
                eprintln!("Usage: docqa query \"<question>\" [--scope <document>] [--top <n>]");
                std::process::exit(1);
            };

            let store = IndexStore::open(&index_root).await?;
            let mut retriever_config = RetrieverConfig::default();
            if let Ok(n) = config.get::<usize>("retriever.dense_k") {
                retriever_config.dense_k = n;
            }
            if let Ok(n) = config.get::<usize>("retriever.lexical_k") {
                retriever_config.lexical_k = n;
            }
            if let Ok(n) = config.get::<usize>("retriever.final_k") {
                retriever_config.final_k = n;
            }
            if let Some(n) = top {
                retriever_config.final_k = n;
            }
            let service = RetrieverService::new(store, default_embedder()?, retriever_config);
            let retrieval = service.retrieve(&query, scope.as_deref()).await?;

            if let Some(warning) = &retrieval.warning {
                println!("⚠️  {warning}");
            }
            if retrieval.degraded {
                println!("⚠️  one retrieval strategy failed; results may be incomplete");
            }
            if retrieval.results.is_empty() {
                println!("No passages matched.");
            }
            for (i, r) in retrieval.results.iter().enumerate() {
                println!(
                    "\n{}. score={:.4}  {} (page {})",
                    i + 1,
                    r.fused_score,
                    basename(&r.document_id),
                    r.page_number + 1
                );
                let preview: String = r.text.chars().take(300).collect();
                println!("   {}", preview.replace('\n', " "));
            }
        }
        "status" => {
            let store = IndexStore::open(&index_root).await?;
            let pair = store.current();
            println!("Active generation: {}", pair.generation);
            println!("Created: {}", pair.manifest.created_at);
            println!("Embedding dim: {}", pair.manifest.embedding_dim);
            println!(
                "Documents: {}  Passages: {}",
                pair.manifest.documents.len(),
                pair.manifest.passage_count
            );
            for d in &pair.manifest.documents {
                println!("  {} — {} pages, {} passages", d.basename, d.pages, d.passages);
            }
        }
        _ => {
            eprintln!("Unknown command: {cmd}");
            std::process::exit(1);
        }
    }
    Ok(())
}
