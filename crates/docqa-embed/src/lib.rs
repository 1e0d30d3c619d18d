//! Embedding providers: a local BGE-M3 model run through candle, and a
//! deterministic fake used in tests and offline development. Both satisfy
//! the same `Embedder` contract: constant dimensionality, L2-normalized
//! output, and an error on empty input.

pub mod device;
pub mod pool;
pub mod tokenize;

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{info, warn};
use twox_hash::XxHash64;

use docqa_core::traits::Embedder;
use docqa_core::{Error, Result};

pub const EMBEDDING_DIM: usize = 1024;
const MAX_LEN: usize = 256;

/// BGE-M3 (XLM-RoBERTa) embedder running locally through candle.
pub struct EmbeddingModel {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl EmbeddingModel {
    pub fn load() -> Result<Self> {
        let device = device::select_device();
        let model_dir = resolve_model_dir()?;
        info!(dir = %model_dir.display(), "loading embedding model");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            Error::embedding(format!(
                "failed to load tokenizer from {}: {e}",
                tokenizer_path.display()
            ))
        })?;

        let config_path = model_dir.join("config.json");
        let raw = std::fs::read_to_string(&config_path).map_err(|e| {
            Error::embedding(format!("failed to read {}: {e}", config_path.display()))
        })?;
        let config: XLMRobertaConfig = serde_json::from_str(&raw)
            .map_err(|e| Error::embedding(format!("bad model config: {e}")))?;

        let weights_path = model_dir.join("pytorch_model.bin");
        let weights = candle_core::pickle::read_all(&weights_path)
            .map_err(|e| Error::embedding(format!("failed to read model weights: {e}")))?;
        let weights_map: HashMap<String, Tensor> = weights.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights_map, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)
            .map_err(|e| Error::embedding(format!("failed to build model: {e}")))?;
        info!("embedding model ready");
        Ok(Self {
            model,
            tokenizer,
            device,
        })
    }

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let (input_ids, attention_mask) =
            tokenize::tokenize_on_device(&self.tokenizer, text, MAX_LEN, &self.device)?;
        let token_type_ids = Tensor::zeros((1, MAX_LEN), DType::I64, &self.device)
            .map_err(|e| Error::embedding(format!("token type tensor build failed: {e}")))?;
        let hidden = self
            .model
            .forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)
            .map_err(|e| Error::embedding(format!("model forward failed: {e}")))?;
        let pooled = pool::masked_mean_l2(&hidden, &attention_mask)
            .map_err(|e| Error::embedding(format!("pooling failed: {e}")))?;
        let out: Vec<f32> = pooled
            .to_device(&Device::Cpu)
            .and_then(|t| t.squeeze(0))
            .and_then(|t| t.to_vec1())
            .map_err(|e| Error::embedding(format!("embedding readback failed: {e}")))?;
        if out.len() != EMBEDDING_DIM {
            return Err(Error::embedding(format!(
                "unexpected embedding dim {}",
                out.len()
            )));
        }
        Ok(out)
    }
}

impl Embedder for EmbeddingModel {
    fn dim(&self) -> usize {
        EMBEDDING_DIM
    }

    fn max_len(&self) -> usize {
        MAX_LEN
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            if text.trim().is_empty() {
                return Err(Error::embedding("cannot embed empty text"));
            }
            out.push(self.embed_one(text)?);
        }
        Ok(out)
    }
}

/// Deterministic hashed bag-of-words embedder for tests and offline runs.
/// Same dimensionality and normalization contract as the real model.
#[derive(Debug, Default)]
pub struct FakeEmbedder;

impl FakeEmbedder {
    pub fn new() -> Self {
        Self
    }

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(Error::embedding("cannot embed empty text"));
        }
        let mut v = vec![0f32; EMBEDDING_DIM];
        for (i, token) in text.to_lowercase().split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % EMBEDDING_DIM;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        Ok(v)
    }
}

impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize {
        EMBEDDING_DIM
    }

    fn max_len(&self) -> usize {
        MAX_LEN
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_one(t)).collect()
    }
}

/// Select the deployment embedder: the fake when
/// `DOCQA_USE_FAKE_EMBEDDINGS` is set, the local model otherwise.
pub fn default_embedder() -> Result<Arc<dyn Embedder>> {
    let use_fake = std::env::var("DOCQA_USE_FAKE_EMBEDDINGS")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if use_fake {
        warn!("using fake embeddings");
        return Ok(Arc::new(FakeEmbedder::new()));
    }
    Ok(Arc::new(EmbeddingModel::load()?))
}

fn resolve_model_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("DOCQA_MODEL_DIR") {
        let p = PathBuf::from(&dir);
        if p.exists() {
            return Ok(p);
        }
        return Err(Error::embedding(format!(
            "DOCQA_MODEL_DIR does not exist: {}",
            p.display()
        )));
    }
    for candidate in ["models/bge-m3", "../models/bge-m3"] {
        let p = Path::new(candidate);
        if p.exists() {
            return Ok(p.to_path_buf());
        }
    }
    Err(Error::embedding(
        "could not locate the BGE-M3 model directory; set DOCQA_MODEL_DIR",
    ))
}
