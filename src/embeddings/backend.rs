// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Inference backend seam
//!
//! The pipeline manager never tokenizes or runs a network itself. It loads a
//! model once through a [`ModelLoader`] and then calls the resulting
//! [`EmbeddingPipeline`] as an opaque batched function.

use crate::embeddings::RawOutput;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Pooling strategy requested from the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pooling {
    /// Attention-masked average over token embeddings
    #[default]
    Mean,
}

/// Options passed to every inference call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferenceOptions {
    pub pooling: Pooling,
    /// L2-normalize each pooled vector
    pub normalize: bool,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            pooling: Pooling::Mean,
            normalize: true,
        }
    }
}

/// An initialized, reusable embedding model
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingPipeline: Send + Sync {
    /// Embeds an already prefixed batch. Latency is unbounded.
    async fn infer(&self, texts: &[String], options: InferenceOptions) -> Result<RawOutput>;
}

/// Loads the model named by a model identity
///
/// Loading may include downloading weights, so the first call can be slow.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self, model: &str) -> Result<Arc<dyn EmbeddingPipeline>>;
}
