// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! ONNX Embedding Model
//!
//! Runs sentence-transformer checkpoints (E5, MiniLM, BGE...) exported to ONNX.
//!
//! Features:
//! - Model files from a local directory or the Hugging Face Hub
//! - GPU acceleration via CUDA (with automatic CPU fallback)
//! - Tokenization with truncation and batch padding
//! - Attention-masked mean pooling, optional L2 normalization
//! - Works with models that take `token_type_ids` (BERT) and those that don't (XLM-R)

use crate::embeddings::{EmbeddingPipeline, InferenceOptions, ModelLoader, Pooling, RawOutput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use ndarray::{Array2, Axis};
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info, warn};

/// Default maximum sequence length (E5 and BERT-family models)
pub const DEFAULT_MAX_LENGTH: usize = 512;

/// ONNX Runtime embedding model
///
/// All fields are cheap to clone, so a clone can be moved into a blocking
/// task for each batch.
#[derive(Clone)]
pub struct OnnxEmbeddingModel {
    /// ONNX Runtime session (`run` needs exclusive access)
    session: Arc<Mutex<Session>>,

    tokenizer: Arc<Tokenizer>,

    model_name: String,

    /// Whether the graph declares a `token_type_ids` input
    uses_token_type_ids: bool,

    /// Id used to pad shorter sequences in a batch
    pad_id: i64,
}

impl std::fmt::Debug for OnnxEmbeddingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbeddingModel")
            .field("model_name", &self.model_name)
            .field("uses_token_type_ids", &self.uses_token_type_ids)
            .finish_non_exhaustive()
    }
}

impl OnnxEmbeddingModel {
    /// Loads an ONNX model and its tokenizer from disk
    ///
    /// Blocking: parses the graph and initializes the execution provider.
    /// Call from `spawn_blocking` when on an async runtime.
    ///
    /// # Errors
    /// Returns error if either file is missing or invalid, or if ONNX Runtime
    /// fails to initialize on both CUDA and CPU.
    pub fn load(
        model_name: impl Into<String>,
        model_path: &Path,
        tokenizer_path: &Path,
        max_length: usize,
        intra_threads: usize,
    ) -> Result<Self> {
        let model_name = model_name.into();

        if !model_path.exists() {
            anyhow::bail!("ONNX model file not found: {}", model_path.display());
        }
        if !tokenizer_path.exists() {
            anyhow::bail!("Tokenizer file not found: {}", tokenizer_path.display());
        }

        info!("🚀 Initializing ONNX embedding model {}", model_name);

        // Try CUDA first, fall back to CPU if unavailable
        info!("   Attempting CUDA execution provider...");
        let cuda_result = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CUDAExecutionProvider::default().build()])
            .context("Failed to set CUDA execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(intra_threads)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path);

        let session = match cuda_result {
            Ok(s) => {
                info!("✅ CUDA execution provider initialized");
                s
            }
            Err(e) => {
                warn!("⚠️  CUDA execution provider failed: {}", e);
                warn!("   Falling back to CPU execution provider");
                Session::builder()
                    .context("Failed to create session builder")?
                    .with_execution_providers([CPUExecutionProvider::default().build()])
                    .context("Failed to set CPU execution provider")?
                    .with_optimization_level(GraphOptimizationLevel::Level3)
                    .context("Failed to set optimization level")?
                    .with_intra_threads(intra_threads)
                    .context("Failed to set intra threads")?
                    .commit_from_file(model_path)
                    .context(format!(
                        "Failed to load ONNX model from {}",
                        model_path.display()
                    ))?
            }
        };

        let input_names: Vec<_> = session.inputs.iter().map(|i| i.name.as_str()).collect();
        debug!("Embedding model inputs: {:?}", input_names);
        let uses_token_type_ids = input_names.contains(&"token_type_ids");

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("Failed to configure truncation: {}", e))?;

        let pad_id = tokenizer
            .token_to_id("<pad>")
            .or_else(|| tokenizer.token_to_id("[PAD]"))
            .unwrap_or(0) as i64;

        info!("✅ ONNX embedding model {} loaded", model_name);

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            model_name,
            uses_token_type_ids,
            pad_id,
        })
    }

    /// Returns the model name
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Embeds a batch, returning a `[batch, hidden]` tensor
    ///
    /// Tokenizes all texts, pads them to the longest sequence and runs one
    /// inference. Token-level outputs (`[batch, seq, hidden]`) are mean
    /// pooled with the attention mask; already pooled outputs
    /// (`[batch, hidden]`) are used as is.
    pub fn embed_batch(&self, texts: &[String], normalize: bool) -> Result<RawOutput> {
        if texts.is_empty() {
            return Ok(RawOutput::Rows(Vec::new()));
        }

        let encodings: Vec<_> = texts
            .iter()
            .map(|text| {
                self.tokenizer
                    .encode(text.as_str(), true)
                    .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))
            })
            .collect::<Result<Vec<_>>>()?;

        let batch = texts.len();
        let max_len = encodings
            .iter()
            .map(|enc| enc.get_ids().len())
            .max()
            .unwrap_or(0);

        let mut input_ids_batch = Vec::with_capacity(batch * max_len);
        let mut attention_mask_batch = Vec::with_capacity(batch * max_len);

        for encoding in &encodings {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let padding_needed = max_len - ids.len();

            input_ids_batch.extend(ids.iter().map(|&id| id as i64));
            input_ids_batch.extend(std::iter::repeat(self.pad_id).take(padding_needed));
            attention_mask_batch.extend(mask.iter().map(|&m| m as i64));
            attention_mask_batch.extend(std::iter::repeat(0i64).take(padding_needed));
        }

        let attention_mask_for_pooling = attention_mask_batch.clone();

        let input_ids_array = Array2::from_shape_vec((batch, max_len), input_ids_batch)
            .context("Failed to create batch input_ids array")?;
        let attention_mask_array = Array2::from_shape_vec((batch, max_len), attention_mask_batch)
            .context("Failed to create batch attention_mask array")?;

        let mut session_guard = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("ONNX session lock poisoned"))?;

        let outputs = if self.uses_token_type_ids {
            let token_type_ids_array = Array2::<i64>::zeros((batch, max_len));
            session_guard.run(ort::inputs![
                "input_ids" => Value::from_array(input_ids_array)?,
                "attention_mask" => Value::from_array(attention_mask_array)?,
                "token_type_ids" => Value::from_array(token_type_ids_array)?
            ])?
        } else {
            session_guard.run(ort::inputs![
                "input_ids" => Value::from_array(input_ids_array)?,
                "attention_mask" => Value::from_array(attention_mask_array)?
            ])?
        };

        // Different exports name the output differently, so use index 0
        let output_array = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract output tensor")?;
        let shape = output_array.shape().to_vec();

        let mut data = Vec::new();
        let hidden = match shape.as_slice() {
            [b, _seq, hidden] if *b == batch => {
                data.reserve(batch * hidden);
                for batch_idx in 0..batch {
                    let item = output_array.index_axis(Axis(0), batch_idx);
                    let item_mask =
                        &attention_mask_for_pooling[batch_idx * max_len..(batch_idx + 1) * max_len];
                    let tokens = item
                        .rows()
                        .into_iter()
                        .map(|row| row.iter().copied().collect::<Vec<f32>>());
                    data.extend(mean_pool(tokens, item_mask, *hidden));
                }
                *hidden
            }
            [b, hidden] if *b == batch => {
                data.extend(output_array.iter().copied());
                *hidden
            }
            _ => anyhow::bail!(
                "Model {} produced unsupported output shape {:?} for batch of {}",
                self.model_name,
                shape,
                batch
            ),
        };

        if normalize {
            for row in data.chunks_mut(hidden.max(1)) {
                l2_normalize(row);
            }
        }

        Ok(RawOutput::Tensor {
            dims: vec![batch, hidden],
            data,
        })
    }

    /// Counts non-padding tokens in a text
    pub fn count_tokens(&self, text: &str) -> Result<usize> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;

        Ok(encoding.get_attention_mask().iter().map(|&m| m as usize).sum())
    }
}

#[async_trait]
impl EmbeddingPipeline for OnnxEmbeddingModel {
    async fn infer(&self, texts: &[String], options: InferenceOptions) -> Result<RawOutput> {
        let Pooling::Mean = options.pooling;

        let model = self.clone();
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || model.embed_batch(&texts, options.normalize))
            .await
            .context("Embedding task panicked")?
    }
}

/// Attention-masked mean over token vectors
fn mean_pool<I>(tokens: I, mask: &[i64], hidden: usize) -> Vec<f32>
where
    I: IntoIterator<Item = Vec<f32>>,
{
    let mut pooled = vec![0.0f32; hidden];
    let mut sum_mask = 0.0f32;

    for (token, &m) in tokens.into_iter().zip(mask) {
        let mask_value = m as f32;
        sum_mask += mask_value;
        for (acc, v) in pooled.iter_mut().zip(token) {
            *acc += v * mask_value;
        }
    }

    for val in &mut pooled {
        *val /= sum_mask.max(1e-9);
    }

    pooled
}

fn l2_normalize(row: &mut [f32]) {
    let norm = row.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in row.iter_mut() {
            *value /= norm;
        }
    }
}

/// Where [`OnnxModelLoader`] finds model files
#[derive(Debug, Clone)]
pub struct OnnxLoaderConfig {
    /// Local directory with `model.onnx` and `tokenizer.json`. When unset,
    /// files are fetched from the Hugging Face Hub (and cached there).
    pub model_dir: Option<PathBuf>,
    /// Path of the ONNX graph inside the hub repository
    pub onnx_file: String,
    pub max_length: usize,
    pub intra_threads: usize,
}

impl Default for OnnxLoaderConfig {
    fn default() -> Self {
        Self {
            model_dir: None,
            onnx_file: "onnx/model.onnx".to_string(),
            max_length: DEFAULT_MAX_LENGTH,
            intra_threads: 4,
        }
    }
}

/// [`ModelLoader`] producing [`OnnxEmbeddingModel`]s
#[derive(Debug, Clone, Default)]
pub struct OnnxModelLoader {
    config: OnnxLoaderConfig,
}

impl OnnxModelLoader {
    pub fn new(config: OnnxLoaderConfig) -> Self {
        Self { config }
    }

    /// Resolves local paths for the ONNX graph and tokenizer of `model`
    fn resolve_files(config: &OnnxLoaderConfig, model: &str) -> Result<(PathBuf, PathBuf)> {
        if let Some(dir) = &config.model_dir {
            let flat = dir.join("model.onnx");
            let model_path = if flat.exists() {
                flat
            } else {
                dir.join(&config.onnx_file)
            };
            return Ok((model_path, dir.join("tokenizer.json")));
        }

        info!("📥 Fetching {} from Hugging Face Hub", model);
        let api = hf_hub::api::sync::Api::new().context("Failed to create Hugging Face Hub client")?;
        let repo = api.model(model.to_string());

        let model_path = repo
            .get(&config.onnx_file)
            .context(format!("Failed to fetch {} for {}", config.onnx_file, model))?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .context(format!("Failed to fetch tokenizer.json for {}", model))?;

        Ok((model_path, tokenizer_path))
    }
}

#[async_trait]
impl ModelLoader for OnnxModelLoader {
    async fn load(&self, model: &str) -> Result<Arc<dyn EmbeddingPipeline>> {
        let config = self.config.clone();
        let model = model.to_string();

        let loaded = tokio::task::spawn_blocking(move || -> Result<OnnxEmbeddingModel> {
            let (model_path, tokenizer_path) = Self::resolve_files(&config, &model)?;
            OnnxEmbeddingModel::load(
                model,
                &model_path,
                &tokenizer_path,
                config.max_length,
                config.intra_threads,
            )
        })
        .await
        .context("Model loading task panicked")??;

        Ok(Arc::new(loaded))
    }
}
