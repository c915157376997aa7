// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Embedding Pipeline Manager
//!
//! Owns the single embedding model of the process:
//! - loads it lazily, at most once at a time (single-flight)
//! - applies E5 instruction prefixes before inference
//! - normalizes backend output into one row per input text
//! - memoizes the embedding dimension after the first successful call
//!
//! The manager is an ordinary value. The server builds one at startup and
//! shares it through `Arc`, so tests can run several independent managers.

use crate::embeddings::{
    apply_instruction, EmbeddingError, EmbeddingPipeline, InferenceOptions, InstructionPolicy,
    Mode, ModelLoader, Pooling,
};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Text embedded by [`PipelineManager::warmup`]
const WARMUP_TEXT: &str = "warmup";

type LoadResult = Result<Arc<dyn EmbeddingPipeline>, EmbeddingError>;
type LoadFuture = Shared<BoxFuture<'static, LoadResult>>;

/// Per-request embedding options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbedOptions {
    pub mode: Mode,
    pub instruction: InstructionPolicy,
    pub normalize: bool,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Passage,
            instruction: InstructionPolicy::E5,
            normalize: true,
        }
    }
}

/// Model identity and its dimension, if known
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model: String,
    pub dim: Option<usize>,
}

/// Load attempt bookkeeping, guarded by the manager's mutex
#[derive(Default)]
struct InitState {
    /// Incremented each time a new load attempt is installed
    generation: u64,
    /// In-flight or completed load. Cleared only after a failed attempt.
    pending: Option<LoadFuture>,
}

/// Manager for the process-wide embedding pipeline
pub struct PipelineManager {
    model: String,
    loader: Arc<dyn ModelLoader>,
    init: Mutex<InitState>,
    dimension: OnceLock<usize>,
}

impl std::fmt::Debug for PipelineManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineManager")
            .field("model", &self.model)
            .field("dimension", &self.dimension.get())
            .finish_non_exhaustive()
    }
}

impl PipelineManager {
    /// Creates a manager for `model`. Nothing is loaded until first use.
    pub fn new(model: impl Into<String>, loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            model: model.into(),
            loader,
            init: Mutex::new(InitState::default()),
            dimension: OnceLock::new(),
        }
    }

    /// Model identity this manager serves
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Memoized embedding dimension, without triggering a warmup
    pub fn dimension(&self) -> Option<usize> {
        self.dimension.get().copied()
    }

    /// Whether a load attempt has completed successfully
    pub async fn is_loaded(&self) -> bool {
        let state = self.init.lock().await;
        matches!(
            state.pending.as_ref().and_then(|f| f.peek()),
            Some(Ok(_))
        )
    }

    /// Embeds a batch of texts, returning one row per text in input order
    ///
    /// An empty batch returns an empty matrix without loading the model.
    ///
    /// # Errors
    /// - `Initialization` if the model could not be loaded
    /// - `Inference` if the backend call failed
    /// - `UnexpectedOutputShape` if the output cannot be normalized or its
    ///   row count differs from `texts.len()`
    /// - `DimensionMismatch` if the width differs from the memoized dimension
    pub async fn embed_batch(
        &self,
        texts: &[String],
        options: EmbedOptions,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let prefixed = apply_instruction(texts, options.mode, options.instruction);
        let pipeline = self.pipeline().await?;

        let started = Instant::now();
        let raw = pipeline
            .infer(
                &prefixed,
                InferenceOptions {
                    pooling: Pooling::Mean,
                    normalize: options.normalize,
                },
            )
            .await
            .map_err(|e| {
                error!("Inference failed for batch of {}: {:#}", texts.len(), e);
                EmbeddingError::inference(&e)
            })?;

        let rows = raw.to_matrix()?;
        if rows.len() != texts.len() {
            return Err(EmbeddingError::UnexpectedOutputShape(format!(
                "expected {} rows, got {}",
                texts.len(),
                rows.len()
            )));
        }

        let width = rows.first().map_or(0, Vec::len);
        self.record_dimension(width)?;

        debug!(
            "Embedded {} texts ({}D) in {:?}",
            rows.len(),
            width,
            started.elapsed()
        );

        Ok(rows)
    }

    /// Returns the model identity and its dimension
    ///
    /// If the dimension is still unknown, a one-text warmup runs first. A
    /// failed warmup is logged and leaves `dim` as `None`.
    pub async fn model_info(&self) -> ModelInfo {
        if self.dimension.get().is_none() {
            if let Err(e) = self.warmup().await {
                warn!("⚠️  Warmup for {} failed: {}", self.model, e);
            }
        }

        ModelInfo {
            model: self.model.clone(),
            dim: self.dimension(),
        }
    }

    /// Loads the model and embeds one throwaway text, returning the dimension
    pub async fn warmup(&self) -> Result<usize, EmbeddingError> {
        let rows = self
            .embed_batch(&[WARMUP_TEXT.to_string()], EmbedOptions::default())
            .await?;
        Ok(rows.first().map_or(0, Vec::len))
    }

    /// Returns the shared pipeline, starting a load if none is in flight
    ///
    /// All callers that find the same attempt in the slot await the same
    /// shared future. When an attempt fails, it is removed from the slot so
    /// the next caller starts over. The generation check keeps a late waiter
    /// from removing a newer attempt.
    async fn pipeline(&self) -> LoadResult {
        let (generation, load) = {
            let mut state = self.init.lock().await;
            match &state.pending {
                Some(load) => (state.generation, load.clone()),
                None => {
                    state.generation += 1;
                    let load = self.start_load();
                    state.pending = Some(load.clone());
                    (state.generation, load)
                }
            }
        };

        let result = load.await;

        if result.is_err() {
            let mut state = self.init.lock().await;
            if state.generation == generation && state.pending.is_some() {
                state.pending = None;
                debug!("Cleared failed load attempt #{} for {}", generation, self.model);
            }
        }

        result
    }

    fn start_load(&self) -> LoadFuture {
        let loader = Arc::clone(&self.loader);
        let model = self.model.clone();

        async move {
            info!("🧠 Loading embedding model: {}", model);
            let started = Instant::now();

            match loader.load(&model).await {
                Ok(pipeline) => {
                    info!(
                        "✅ Embedding model {} ready in {:?}",
                        model,
                        started.elapsed()
                    );
                    Ok(pipeline)
                }
                Err(e) => {
                    error!("❌ Failed to load embedding model {}: {:#}", model, e);
                    Err(EmbeddingError::initialization(&model, &e))
                }
            }
        }
        .boxed()
        .shared()
    }

    fn record_dimension(&self, width: usize) -> Result<usize, EmbeddingError> {
        let dimension = *self.dimension.get_or_init(|| {
            info!("📐 Embedding dimension for {}: {}", self.model, width);
            width
        });

        if dimension != width {
            error!(
                "Embedding width changed for {}: memoized {}, got {}",
                self.model, dimension, width
            );
            return Err(EmbeddingError::DimensionMismatch {
                expected: dimension,
                actual: width,
            });
        }

        Ok(dimension)
    }
}
