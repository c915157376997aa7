// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod embed;
pub mod errors;
pub mod handlers;
pub mod http_server;

pub use embed::{embeddings_handler, EmbeddingsRequest, EmbeddingsResponse, EncodingFormat};
pub use errors::{ApiError, ErrorResponse};
pub use handlers::{HealthResponse, ModelCard, ModelsResponse};
pub use http_server::{create_router, start_server, AppState, RequestLimits};
