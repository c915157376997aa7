// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! EmbeddingsResponse types for POST /v1/embeddings
//!
//! OpenAI-compatible envelope: `data[i]` corresponds to `input[i]`.

use crate::api::embed::EncodingFormat;
use crate::embeddings::encode_vector;
use serde::{Deserialize, Serialize};

/// One embedding, as numbers or as a base64 string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmbeddingValue {
    Float(Vec<f32>),
    Base64(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingData {
    /// Always "embedding"
    pub object: String,
    pub index: usize,
    pub embedding: EmbeddingValue,
}

/// Token usage
///
/// Counted as whitespace-separated words of the raw input, which is close
/// enough for clients that only display it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub total_tokens: usize,
}

impl Usage {
    pub fn from_texts(texts: &[String]) -> Self {
        let tokens = texts.iter().map(|t| t.split_whitespace().count()).sum();
        Self {
            prompt_tokens: tokens,
            total_tokens: tokens,
        }
    }
}

/// Response body for POST /v1/embeddings
///
/// # Example
/// ```json
/// {
///   "object": "list",
///   "data": [{"object": "embedding", "index": 0, "embedding": [0.01, -0.02]}],
///   "model": "intfloat/multilingual-e5-small",
///   "usage": {"prompt_tokens": 2, "total_tokens": 2}
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingsResponse {
    /// Always "list"
    pub object: String,
    pub data: Vec<EmbeddingData>,
    pub model: String,
    pub usage: Usage,
}

impl EmbeddingsResponse {
    /// Shapes rows into the response envelope, keeping row order as `index`
    pub fn from_rows(
        rows: Vec<Vec<f32>>,
        format: EncodingFormat,
        model: impl Into<String>,
        usage: Usage,
    ) -> Self {
        let data = rows
            .into_iter()
            .enumerate()
            .map(|(index, row)| EmbeddingData {
                object: "embedding".to_string(),
                index,
                embedding: match format {
                    EncodingFormat::Float => EmbeddingValue::Float(row),
                    EncodingFormat::Base64 => EmbeddingValue::Base64(encode_vector(&row)),
                },
            })
            .collect();

        Self {
            object: "list".to_string(),
            data,
            model: model.into(),
            usage,
        }
    }

    pub fn embedding_count(&self) -> usize {
        self.data.len()
    }
}
