// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the Fabstir Embed Server

/// Full version string with feature description
pub const VERSION: &str = "v0.1.0-e5-embeddings-2025-10-20";

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Build date
pub const BUILD_DATE: &str = "2025-10-20";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "openai-embeddings-api",
    "e5-instruction-prefix",
    "base64-encoding",
    "lazy-model-loading",
    "hf-hub-download",
    "cuda-fallback",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Fabstir Embed Server {} ({})", VERSION_NUMBER, BUILD_DATE)
}
