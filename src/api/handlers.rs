// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use crate::api::http_server::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub model: String,
    /// `null` until the model has produced its first embedding
    pub dim: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCard {
    pub id: String,
    pub object: String,
    pub owned_by: String,
    pub dim: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub object: String,
    pub data: Vec<ModelCard>,
}

/// GET /health
///
/// Reports the model identity and dimension. While the dimension is
/// unknown this runs a warmup embedding, so the first probe may be slow.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let info = state.manager.model_info().await;
    Json(HealthResponse {
        ok: true,
        model: info.model,
        dim: info.dim,
    })
}

/// GET /v1/models
///
/// Lists the single served model. Never triggers a load.
pub async fn models_handler(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        object: "list".to_string(),
        data: vec![ModelCard {
            id: state.manager.model().to_string(),
            object: "model".to_string(),
            owned_by: "local".to_string(),
            dim: state.manager.dimension(),
        }],
    })
}
