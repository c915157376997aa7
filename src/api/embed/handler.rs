// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /v1/embeddings HTTP handler

use crate::api::embed::{EmbeddingsRequest, EmbeddingsResponse, Usage};
use crate::api::http_server::AppState;
use crate::api::ApiError;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::time::Instant;
use tracing::{error, info};

/// POST /v1/embeddings handler
///
/// Validates the request, embeds the inputs through the shared
/// [`PipelineManager`](crate::embeddings::PipelineManager) and returns the
/// OpenAI-style envelope. Malformed JSON and validation failures are 400,
/// a model that cannot be loaded is 503, any other embedding failure is 500.
pub async fn embeddings_handler(
    State(state): State<AppState>,
    payload: Result<Json<EmbeddingsRequest>, JsonRejection>,
) -> Result<Json<EmbeddingsResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;

    request.validate(state.limits.max_batch_size, state.limits.max_input_chars)?;

    let options = request.options();
    let format = request.encoding_format;
    let texts = request.input.into_texts();
    let usage = Usage::from_texts(&texts);

    info!(
        "Embedding request: {} texts, mode={:?}, instruction={:?}, format={:?}",
        texts.len(),
        options.mode,
        options.instruction,
        format
    );

    let started = Instant::now();
    let rows = state
        .manager
        .embed_batch(&texts, options)
        .await
        .map_err(|e| {
            error!("Embedding request failed ({}): {}", e.kind(), e);
            ApiError::from(e)
        })?;

    info!(
        "✓ Embedded {} texts in {}ms",
        rows.len(),
        started.elapsed().as_millis()
    );

    Ok(Json(EmbeddingsResponse::from_rows(
        rows,
        format,
        state.manager.model(),
        usage,
    )))
}
