// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Embeddings API Module
//!
//! This module provides the OpenAI-compatible POST /v1/embeddings endpoint.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::embeddings_handler;
pub use request::{EmbeddingInput, EmbeddingsRequest, EncodingFormat};
pub use response::{EmbeddingData, EmbeddingValue, EmbeddingsResponse, Usage};
