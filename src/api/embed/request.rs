// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! EmbeddingsRequest type for POST /v1/embeddings
//!
//! OpenAI-compatible request body, extended with the E5 `mode` and
//! `instruction` fields.

use crate::api::ApiError;
use crate::embeddings::{EmbedOptions, InstructionPolicy, Mode};
use serde::{Deserialize, Serialize};

/// `input` accepts a single string or an array of strings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmbeddingInput {
    Single(String),
    Batch(Vec<String>),
}

impl EmbeddingInput {
    pub fn len(&self) -> usize {
        match self {
            EmbeddingInput::Single(_) => 1,
            EmbeddingInput::Batch(texts) => texts.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn texts(&self) -> &[String] {
        match self {
            EmbeddingInput::Single(text) => std::slice::from_ref(text),
            EmbeddingInput::Batch(texts) => texts,
        }
    }

    pub fn into_texts(self) -> Vec<String> {
        match self {
            EmbeddingInput::Single(text) => vec![text],
            EmbeddingInput::Batch(texts) => texts,
        }
    }
}

/// Response encoding for each embedding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingFormat {
    /// JSON array of numbers
    #[default]
    Float,
    /// Base64 of little-endian float32 bytes
    Base64,
}

/// Request body for POST /v1/embeddings
///
/// # Example
/// ```json
/// {
///   "input": ["how do I reset my password?"],
///   "mode": "query",
///   "encoding_format": "base64"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsRequest {
    pub input: EmbeddingInput,

    #[serde(default)]
    pub encoding_format: EncodingFormat,

    /// Default: passage
    #[serde(default)]
    pub mode: Mode,

    /// Default: e5
    #[serde(default)]
    pub instruction: InstructionPolicy,

    #[serde(default = "default_normalize")]
    pub normalize: bool,

    /// Accepted for OpenAI client compatibility; the served model is fixed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

fn default_normalize() -> bool {
    true
}

impl EmbeddingsRequest {
    /// Validates batch size and text lengths
    ///
    /// An empty batch is valid and produces an empty `data` array.
    pub fn validate(&self, max_batch_size: usize, max_input_chars: usize) -> Result<(), ApiError> {
        if self.input.len() > max_batch_size {
            return Err(ApiError::ValidationError {
                field: "input".to_string(),
                message: format!(
                    "input cannot contain more than {} items (got {})",
                    max_batch_size,
                    self.input.len()
                ),
            });
        }

        for (index, text) in self.input.texts().iter().enumerate() {
            let chars = text.chars().count();
            if chars > max_input_chars {
                return Err(ApiError::ValidationError {
                    field: format!("input[{}]", index),
                    message: format!(
                        "text cannot exceed {} characters (got {} characters)",
                        max_input_chars, chars
                    ),
                });
            }
        }

        Ok(())
    }

    pub fn options(&self) -> EmbedOptions {
        EmbedOptions {
            mode: self.mode,
            instruction: self.instruction,
            normalize: self.normalize,
        }
    }
}
