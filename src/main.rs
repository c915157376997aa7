// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use clap::Parser;
use fabstir_embed_server::{
    api::{start_server, AppState, RequestLimits},
    embeddings::{OnnxModelLoader, PipelineManager},
    version, ServerConfig,
};
use std::{env, sync::Arc};
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let config = ServerConfig::parse();

    println!("🚀 Starting Fabstir Embed Server...\n");
    println!("📦 BUILD VERSION: {}", version::VERSION);
    println!("📅 Build Date: {}", version::BUILD_DATE);
    println!();

    info!("Model: {}", config.model);
    match &config.model_dir {
        Some(dir) => info!("Model files: {}", dir.display()),
        None => info!("Model files: Hugging Face Hub ({})", config.onnx_file),
    }

    let loader = Arc::new(OnnxModelLoader::new(config.loader_config()));
    let manager = Arc::new(PipelineManager::new(config.model.clone(), loader));

    if config.warmup {
        println!("🧠 Warming up embedding model...");
        match manager.warmup().await {
            Ok(dim) => println!("✅ Embedding model ready ({}D)", dim),
            Err(e) => {
                // The next request retries the load
                error!("❌ Warmup failed: {}", e);
                warn!("   Serving anyway; /v1/embeddings will return 503 until the model loads");
            }
        }
    } else {
        println!("💤 Model loads on first request (set WARMUP_ON_START=true to preload)");
    }

    let limits = RequestLimits {
        max_batch_size: config.max_batch_size,
        max_input_chars: config.max_input_chars,
    };
    let state = AppState::new(manager, limits);

    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;

    let separator = "=".repeat(60);
    println!("\n{}", separator);
    println!("Embedding server running");
    println!("  Embeddings:   POST http://{}/v1/embeddings", local_addr);
    println!("  Health:       GET  http://{}/health", local_addr);
    println!("  Models:       GET  http://{}/v1/models", local_addr);
    println!("\nTest with curl:");
    println!("  curl -X POST http://{}/v1/embeddings \\", local_addr);
    println!("    -H 'Content-Type: application/json' \\");
    println!("    -d '{{\"input\": [\"how do I reset my password?\"], \"mode\": \"query\"}}'");
    println!("\nPress Ctrl+C to shutdown...");
    println!("{}\n", separator);

    start_server(listener, state, async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        println!("\n⏹️  Shutting down...");
    })
    .await?;

    println!("👋 Goodbye!");
    Ok(())
}
