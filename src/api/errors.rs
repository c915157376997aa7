// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use crate::embeddings::EmbeddingError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error_type: String,
    pub message: String,
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    NotFound(String),
    InvalidRequest(String),
    ValidationError { field: String, message: String },
    /// Model could not be loaded; a later request retries the load
    ServiceUnavailable { kind: String, message: String },
    /// Inference, output shape or dimension failure
    InternalError { kind: String, message: String },
}

impl ApiError {
    pub fn to_response(&self, request_id: Option<String>) -> ErrorResponse {
        let kind_details = |kind: &str| {
            let mut details = HashMap::new();
            details.insert(
                "kind".to_string(),
                serde_json::Value::String(kind.to_string()),
            );
            Some(details)
        };

        let (error_type, message, details) = match self {
            ApiError::NotFound(msg) => ("not_found", msg.clone(), None),
            ApiError::InvalidRequest(msg) => ("invalid_request", msg.clone(), None),
            ApiError::ValidationError { field, message } => {
                let mut details = HashMap::new();
                details.insert(
                    "field".to_string(),
                    serde_json::Value::String(field.clone()),
                );
                ("validation_error", message.clone(), Some(details))
            }
            ApiError::ServiceUnavailable { kind, message } => {
                ("service_unavailable", message.clone(), kind_details(kind))
            }
            ApiError::InternalError { kind, message } => {
                ("internal_error", message.clone(), kind_details(kind))
            }
        };

        ErrorResponse {
            error_type: error_type.to_string(),
            message,
            request_id,
            details,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::NotFound(_) => 404,
            ApiError::InvalidRequest(_) | ApiError::ValidationError { .. } => 400,
            ApiError::ServiceUnavailable { .. } => 503,
            ApiError::InternalError { .. } => 500,
        }
    }
}

impl From<EmbeddingError> for ApiError {
    fn from(err: EmbeddingError) -> Self {
        let kind = err.kind().to_string();
        let message = err.to_string();
        match err {
            EmbeddingError::Initialization { .. } => ApiError::ServiceUnavailable { kind, message },
            EmbeddingError::Inference(_)
            | EmbeddingError::UnexpectedOutputShape(_)
            | EmbeddingError::DimensionMismatch { .. } => ApiError::InternalError { kind, message },
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::ValidationError { field, message } => {
                write!(f, "Validation error for {}: {}", field, message)
            }
            ApiError::ServiceUnavailable { message, .. } => {
                write!(f, "Service unavailable: {}", message)
            }
            ApiError::InternalError { message, .. } => write!(f, "Internal error: {}", message),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let error_response = self.to_response(Some(uuid::Uuid::new_v4().to_string()));

        (status, Json(error_response)).into_response()
    }
}
