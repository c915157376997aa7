// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! ONNX backend tests against real model files
//!
//! Need an exported E5 model (`model.onnx` + `tokenizer.json`) in
//! `EMBED_TEST_MODEL_DIR`, so they are ignored by default:
//!
//! ```bash
//! EMBED_TEST_MODEL_DIR=/workspace/models/multilingual-e5-small-onnx \
//!     cargo test --test embeddings_tests -- --ignored
//! ```

use fabstir_embed_server::embeddings::{
    EmbedOptions, Mode, OnnxEmbeddingModel, OnnxLoaderConfig, OnnxModelLoader, PipelineManager,
};
use std::path::PathBuf;
use std::sync::Arc;

const DEFAULT_MODEL_DIR: &str = "/workspace/models/multilingual-e5-small-onnx";
const MODEL_NAME: &str = "intfloat/multilingual-e5-small";
const E5_SMALL_DIM: usize = 384;

fn model_dir() -> PathBuf {
    std::env::var("EMBED_TEST_MODEL_DIR")
        .unwrap_or_else(|_| DEFAULT_MODEL_DIR.to_string())
        .into()
}

fn load_model() -> OnnxEmbeddingModel {
    let dir = model_dir();
    OnnxEmbeddingModel::load(
        MODEL_NAME,
        &dir.join("model.onnx"),
        &dir.join("tokenizer.json"),
        512,
        2,
    )
    .expect("Failed to load ONNX model")
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod onnx_model_tests {
    use super::*;

    /// Test 1: batch output is a pooled [batch, hidden] tensor
    #[test]
    #[ignore]
    fn test_batch_output_shape() {
        let model = load_model();
        let texts = vec!["passage: hello".to_string(), "passage: world".to_string()];

        let matrix = model.embed_batch(&texts, true).unwrap().to_matrix().unwrap();

        assert_eq!(matrix.len(), 2);
        assert!(matrix.iter().all(|row| row.len() == E5_SMALL_DIM));
        assert_eq!(model.model_name(), MODEL_NAME);
    }

    /// Test 2: normalized rows have unit length
    #[test]
    #[ignore]
    fn test_rows_are_normalized() {
        let model = load_model();
        let matrix = model
            .embed_batch(&["query: unit length".to_string()], true)
            .unwrap()
            .to_matrix()
            .unwrap();

        let norm: f32 = matrix[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4, "norm was {}", norm);
    }

    /// Test 3: padding does not change a text's embedding
    #[test]
    #[ignore]
    fn test_padding_is_masked() {
        let model = load_model();
        let short = "passage: short".to_string();
        let long = "passage: a considerably longer text that forces padding".to_string();

        let alone = model.embed_batch(&[short.clone()], true).unwrap().to_matrix().unwrap();
        let padded = model.embed_batch(&[short, long], true).unwrap().to_matrix().unwrap();

        assert!(cosine(&alone[0], &padded[0]) > 0.999);
    }

    /// Test 4: token counting excludes padding
    #[test]
    #[ignore]
    fn test_count_tokens() {
        let model = load_model();
        let count = model.count_tokens("query: hello world").unwrap();
        assert!(count > 2 && count < 16, "unexpected token count {}", count);
    }

    /// Test 5: full path through the loader and manager
    #[tokio::test]
    #[ignore]
    async fn test_manager_with_onnx_loader() {
        let loader = OnnxModelLoader::new(OnnxLoaderConfig {
            model_dir: Some(model_dir()),
            ..Default::default()
        });
        let manager = PipelineManager::new(MODEL_NAME, Arc::new(loader));

        let query = manager
            .embed_batch(
                &["how do I reset my password?".to_string()],
                EmbedOptions {
                    mode: Mode::Query,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let passages = manager
            .embed_batch(
                &[
                    "To reset your password, open Settings and choose Security.".to_string(),
                    "The museum is closed on Mondays.".to_string(),
                ],
                EmbedOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(manager.dimension(), Some(E5_SMALL_DIM));
        assert!(cosine(&query[0], &passages[0]) > cosine(&query[0], &passages[1]));
    }
}
