// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Server configuration
//!
//! Every option can be given as a CLI flag or an environment variable
//! (a `.env` file is loaded first by the binary).

use crate::embeddings::onnx_model::DEFAULT_MAX_LENGTH;
use crate::embeddings::OnnxLoaderConfig;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Default embedding model
pub const DEFAULT_MODEL: &str = "intfloat/multilingual-e5-small";

/// Embedding server options
#[derive(Parser, Debug, Clone)]
#[command(name = "fabstir-embed-server")]
#[command(about = "OpenAI-compatible text embedding server", long_about = None)]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Model identity (Hugging Face repository id)
    #[arg(long, env = "EMBED_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Local directory with model.onnx and tokenizer.json; skips the hub download
    #[arg(long, env = "MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    /// Path of the ONNX graph inside the hub repository
    #[arg(long, env = "ONNX_FILE", default_value = "onnx/model.onnx")]
    pub onnx_file: String,

    /// Maximum tokens per text; longer inputs are truncated
    #[arg(long, env = "MAX_SEQ_LENGTH", default_value_t = DEFAULT_MAX_LENGTH)]
    pub max_seq_length: usize,

    /// ONNX Runtime intra-op threads
    #[arg(long, env = "INTRA_THREADS", default_value_t = 4)]
    pub intra_threads: usize,

    /// Maximum number of texts per request
    #[arg(long, env = "MAX_BATCH_SIZE", default_value_t = 256)]
    pub max_batch_size: usize,

    /// Maximum characters per text
    #[arg(long, env = "MAX_INPUT_CHARS", default_value_t = 8192)]
    pub max_input_chars: usize,

    /// Load the model and resolve its dimension before serving
    #[arg(long, env = "WARMUP_ON_START", default_value_t = false)]
    pub warmup: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            model: DEFAULT_MODEL.to_string(),
            model_dir: None,
            onnx_file: "onnx/model.onnx".to_string(),
            max_seq_length: DEFAULT_MAX_LENGTH,
            intra_threads: 4,
            max_batch_size: 256,
            max_input_chars: 8192,
            warmup: false,
        }
    }
}

impl ServerConfig {
    /// Socket address built from `host` and `port`
    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid listen address {}:{}: {}", self.host, self.port, e))
    }

    /// Options for the ONNX model loader
    pub fn loader_config(&self) -> OnnxLoaderConfig {
        OnnxLoaderConfig {
            model_dir: self.model_dir.clone(),
            onnx_file: self.onnx_file.clone(),
            max_length: self.max_seq_length,
            intra_threads: self.intra_threads,
        }
    }
}
