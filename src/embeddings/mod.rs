// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Embedding pipeline
//!
//! - [`PipelineManager`]: lazily loaded, shared model with E5 prefixing and
//!   output normalization
//! - [`RawOutput`]: the output layouts a backend may produce
//! - [`OnnxModelLoader`]: ONNX Runtime backend
//! - [`encode_vector`]: base64 float32 encoding for API responses

pub mod backend;
pub mod errors;
pub mod onnx_model;
pub mod pipeline_manager;
pub mod prefix;
pub mod raw_output;
pub mod vector_codec;

#[cfg(test)]
pub use backend::MockEmbeddingPipeline;
pub use backend::{EmbeddingPipeline, InferenceOptions, ModelLoader, Pooling};
pub use errors::EmbeddingError;
pub use onnx_model::{OnnxEmbeddingModel, OnnxLoaderConfig, OnnxModelLoader};
pub use pipeline_manager::{EmbedOptions, ModelInfo, PipelineManager};
pub use prefix::{apply_instruction, InstructionPolicy, Mode, PASSAGE_PREFIX, QUERY_PREFIX};
pub use raw_output::{RawOutput, RawRow};
pub use vector_codec::{decode_vector, encode_vector, VectorCodecError};
