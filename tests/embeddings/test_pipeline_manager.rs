// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! PipelineManager scenario tests
//!
//! Uses the counting fakes from tests/common to check:
//! - one row per input, in order, with a constant width
//! - empty batches never touch the backend
//! - instruction prefixes reach the backend verbatim
//! - concurrent first calls share a single load
//! - failed loads are retried, failed inferences are not sticky
//! - the dimension is memoized once and never overwritten

use crate::common::{
    fake_embedding, fake_manager, texts, FakeLoader, FakePipeline, Layout, ScriptedPipeline,
    TEST_MODEL,
};
use fabstir_embed_server::embeddings::{
    EmbedOptions, EmbeddingError, InstructionPolicy, Mode, PipelineManager, RawOutput, RawRow,
};
use futures_util::future::join_all;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn query() -> EmbedOptions {
    EmbedOptions {
        mode: Mode::Query,
        ..Default::default()
    }
}

/// Test 1: one row per input, equal widths, rows match the prefixed texts
#[tokio::test]
async fn test_batch_returns_row_per_text() {
    let (manager, _loader, _pipeline) = fake_manager(4, Layout::Tensor);
    let input = texts(&["a", "bb", "ccc"]);

    let rows = manager
        .embed_batch(&input, EmbedOptions::default())
        .await
        .unwrap();

    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.len() == 4));
    for (text, row) in input.iter().zip(&rows) {
        assert_eq!(row, &fake_embedding(&format!("passage: {}", text), 4));
    }
}

/// Test 2: an empty batch returns immediately without loading
#[tokio::test]
async fn test_empty_batch_skips_backend() {
    let (manager, loader, pipeline) = fake_manager(4, Layout::Tensor);

    let rows = manager
        .embed_batch(&[], EmbedOptions::default())
        .await
        .unwrap();

    assert!(rows.is_empty());
    assert_eq!(loader.loads(), 0);
    assert_eq!(pipeline.calls(), 0);
    assert!(!manager.is_loaded().await);
    assert_eq!(manager.dimension(), None);
}

/// Test 3: prefixes per mode and instruction policy
#[tokio::test]
async fn test_prefixes_forwarded_to_backend() {
    let (manager, _loader, pipeline) = fake_manager(2, Layout::Rows);

    manager.embed_batch(&texts(&["x"]), query()).await.unwrap();
    assert_eq!(pipeline.last_seen(), texts(&["query: x"]));

    manager
        .embed_batch(&texts(&["x", "y"]), EmbedOptions::default())
        .await
        .unwrap();
    assert_eq!(pipeline.last_seen(), texts(&["passage: x", "passage: y"]));

    let raw = EmbedOptions {
        mode: Mode::Query,
        instruction: InstructionPolicy::None,
        normalize: true,
    };
    manager.embed_batch(&texts(&["x"]), raw).await.unwrap();
    assert_eq!(pipeline.last_seen(), texts(&["x"]));
}

/// Test 4: concurrent first calls trigger exactly one load
#[tokio::test]
async fn test_concurrent_first_calls_load_once() {
    let pipeline = Arc::new(FakePipeline::new(3, Layout::Tensor));
    let loader = Arc::new(FakeLoader::new(pipeline.clone()).with_delay(Duration::from_millis(50)));
    let manager = PipelineManager::new(TEST_MODEL, loader.clone());

    let batches: Vec<Vec<String>> = (0..16).map(|i| vec![format!("text {}", i)]).collect();
    let results = join_all(
        batches
            .iter()
            .map(|batch| manager.embed_batch(batch, EmbedOptions::default())),
    )
    .await;

    assert_eq!(loader.loads(), 1);
    assert_eq!(pipeline.calls(), 16);
    for result in results {
        let rows = result.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 3);
    }
}

/// Test 5: same single-flight guarantee across worker threads
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_calls_across_tasks() {
    let pipeline = Arc::new(FakePipeline::new(3, Layout::Rows));
    let loader = Arc::new(FakeLoader::new(pipeline.clone()).with_delay(Duration::from_millis(50)));
    let manager = Arc::new(PipelineManager::new(TEST_MODEL, loader.clone()));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let manager = manager.clone();
            tokio::spawn(async move {
                manager
                    .embed_batch(&[format!("task {}", i)], query())
                    .await
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }
    assert_eq!(loader.loads(), 1);
    assert!(manager.is_loaded().await);
}

/// Test 6: dimension is stable and reported by model_info without a warmup
#[tokio::test]
async fn test_dimension_memoized() {
    let (manager, _loader, pipeline) = fake_manager(5, Layout::Wrapped);

    manager
        .embed_batch(&texts(&["a", "b"]), EmbedOptions::default())
        .await
        .unwrap();
    assert_eq!(manager.dimension(), Some(5));

    let info = manager.model_info().await;
    assert_eq!(info.model, TEST_MODEL);
    assert_eq!(info.dim, Some(5));
    assert_eq!(pipeline.calls(), 1);

    manager.embed_batch(&texts(&["c"]), query()).await.unwrap();
    assert_eq!(manager.dimension(), Some(5));
}

/// Test 7: model_info warms up once when the dimension is unknown
#[tokio::test]
async fn test_model_info_triggers_warmup_once() {
    let (manager, loader, pipeline) = fake_manager(6, Layout::Tensor);

    let first = manager.model_info().await;
    let second = manager.model_info().await;

    assert_eq!(first.dim, Some(6));
    assert_eq!(first, second);
    assert_eq!(loader.loads(), 1);
    assert_eq!(pipeline.calls(), 1);
    assert_eq!(pipeline.last_seen(), texts(&["passage: warmup"]));
}

/// Test 8: tensor, buffer rows and single vectors normalize identically
#[tokio::test]
async fn test_output_layouts_are_equivalent() {
    let expected = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]];
    let input = texts(&["first", "second"]);

    let tensor = RawOutput::Tensor {
        dims: vec![2, 3],
        data: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
    };
    let rows = RawOutput::Rows(vec![
        RawRow::Buffer(vec![1.0, 2.0, 3.0]),
        RawRow::Wrapped {
            data: vec![4.0, 5.0, 6.0],
        },
    ]);

    for output in [tensor, rows] {
        let pipeline = Arc::new(ScriptedPipeline::new(vec![output]));
        let manager = PipelineManager::new(TEST_MODEL, Arc::new(FakeLoader::new(pipeline)));
        let matrix = manager
            .embed_batch(&input, EmbedOptions::default())
            .await
            .unwrap();
        assert_eq!(matrix, expected);
    }

    let pipeline = Arc::new(ScriptedPipeline::new(vec![
        RawOutput::Vector(vec![1.0, 2.0, 3.0]),
        RawOutput::Vector(vec![4.0, 5.0, 6.0]),
    ]));
    let manager = PipelineManager::new(TEST_MODEL, Arc::new(FakeLoader::new(pipeline)));
    let mut matrix = Vec::new();
    for text in &input {
        matrix.extend(
            manager
                .embed_batch(&[text.clone()], EmbedOptions::default())
                .await
                .unwrap(),
        );
    }
    assert_eq!(matrix, expected);
}

/// Test 9: a failed inference does not poison the loaded pipeline
#[tokio::test]
async fn test_inference_failure_is_not_sticky() {
    let (manager, loader, pipeline) = fake_manager(4, Layout::Tensor);

    let err = assert_err!(
        manager
            .embed_batch(&texts(&["ok", "FAIL here"]), EmbedOptions::default())
            .await
    );
    assert!(matches!(err, EmbeddingError::Inference(_)));

    let rows = assert_ok!(
        manager
            .embed_batch(&texts(&["ok"]), EmbedOptions::default())
            .await
    );
    assert_eq!(rows.len(), 1);
    assert_eq!(loader.loads(), 1);
    assert_eq!(pipeline.calls(), 2);
}

/// Test 10: concurrent waiters all see a failed load; the next call retries
#[tokio::test]
async fn test_failed_load_reported_to_all_waiters_then_retried() {
    let pipeline = Arc::new(FakePipeline::new(4, Layout::Tensor));
    let loader = Arc::new(
        FakeLoader::new(pipeline.clone())
            .with_delay(Duration::from_millis(50))
            .failing(1),
    );
    let manager = PipelineManager::new(TEST_MODEL, loader.clone());

    let batches: Vec<Vec<String>> = (0..4).map(|i| vec![format!("t{}", i)]).collect();
    let results = join_all(
        batches
            .iter()
            .map(|batch| manager.embed_batch(batch, EmbedOptions::default())),
    )
    .await;

    assert_eq!(loader.loads(), 1);
    for result in results {
        match result {
            Err(EmbeddingError::Initialization { model, message }) => {
                assert_eq!(model, TEST_MODEL);
                assert!(message.contains("unavailable"));
            }
            other => panic!("expected initialization failure, got {:?}", other),
        }
    }
    assert_eq!(pipeline.calls(), 0);
    assert!(!manager.is_loaded().await);

    let rows = manager
        .embed_batch(&texts(&["again"]), EmbedOptions::default())
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(loader.loads(), 2);
    assert!(manager.is_loaded().await);
}

/// Test 11: a width change is rejected and the memo is kept
#[tokio::test]
async fn test_dimension_mismatch_rejected() {
    let (manager, _loader, pipeline) = fake_manager(4, Layout::Tensor);

    manager
        .embed_batch(&texts(&["a"]), EmbedOptions::default())
        .await
        .unwrap();

    pipeline.width.store(8, Ordering::SeqCst);
    let err = manager
        .embed_batch(&texts(&["b"]), EmbedOptions::default())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        EmbeddingError::DimensionMismatch {
            expected: 4,
            actual: 8
        }
    );
    assert_eq!(manager.dimension(), Some(4));
}

/// Test 12: model_info survives a failed load and reports no dimension
#[tokio::test]
async fn test_model_info_without_model() {
    let pipeline = Arc::new(FakePipeline::new(4, Layout::Tensor));
    let loader = Arc::new(FakeLoader::new(pipeline.clone()).failing(usize::MAX));
    let manager = PipelineManager::new(TEST_MODEL, loader.clone());

    let info = manager.model_info().await;
    assert_eq!(info.model, TEST_MODEL);
    assert_eq!(info.dim, None);

    let err = manager.warmup().await.unwrap_err();
    assert_eq!(err.kind(), "initialization_failure");
    assert_eq!(loader.loads(), 2);
}
