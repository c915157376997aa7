// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::embed::embeddings_handler;
use super::handlers::{health_handler, models_handler};
use crate::embeddings::PipelineManager;

/// Per-request input limits
#[derive(Debug, Clone, Copy)]
pub struct RequestLimits {
    pub max_batch_size: usize,
    pub max_input_chars: usize,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_batch_size: 256,
            max_input_chars: 8192,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<PipelineManager>,
    pub limits: RequestLimits,
}

impl AppState {
    pub fn new(manager: Arc<PipelineManager>, limits: RequestLimits) -> Self {
        Self { manager, limits }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_handler))
        // Models endpoint
        .route("/v1/models", get(models_handler))
        // Embeddings endpoint (OpenAI path plus bare alias)
        .route("/v1/embeddings", post(embeddings_handler))
        .route("/embeddings", post(embeddings_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serves the API on `listener` until `shutdown` resolves
pub async fn start_server<F>(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    info!("API server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
