// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for the embedding pipeline
//!
//! Every variant fails a single `embed_batch` / warmup call. None of them is
//! fatal for the process: the manager stays usable after any of them.

use thiserror::Error;

/// Errors surfaced by [`PipelineManager`](crate::embeddings::PipelineManager)
///
/// `Clone` is required because one failed model load is handed to every
/// caller that was waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbeddingError {
    /// The one-time model load failed. A later call starts a fresh attempt.
    #[error("Failed to initialize embedding model {model}: {message}")]
    Initialization { model: String, message: String },

    /// The inference engine failed on an already initialized model
    #[error("Inference failed: {0}")]
    Inference(String),

    /// The engine returned output the normalizer cannot turn into rows
    #[error("Unexpected output shape: {0}")]
    UnexpectedOutputShape(String),

    /// The model produced a width different from the memoized dimension
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl EmbeddingError {
    /// Builds an initialization error keeping the whole anyhow context chain
    pub fn initialization(model: &str, err: &anyhow::Error) -> Self {
        EmbeddingError::Initialization {
            model: model.to_string(),
            message: format!("{:#}", err),
        }
    }

    /// Builds an inference error keeping the whole anyhow context chain
    pub fn inference(err: &anyhow::Error) -> Self {
        EmbeddingError::Inference(format!("{:#}", err))
    }

    /// Short machine-readable kind, used in logs and API error details
    pub fn kind(&self) -> &'static str {
        match self {
            EmbeddingError::Initialization { .. } => "initialization_failure",
            EmbeddingError::Inference(_) => "inference_failure",
            EmbeddingError::UnexpectedOutputShape(_) => "unexpected_output_shape",
            EmbeddingError::DimensionMismatch { .. } => "dimension_mismatch",
        }
    }
}
