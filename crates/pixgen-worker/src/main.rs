//! pixgen worker
//!
//! GPU worker process exposing the train and generate endpoints.

use anyhow::Context;
use clap::Parser;
use pixgen_api::create_router;
use pixgen_core::{Secrets, WorkerConfig};
use pixgen_tasks::TaskRunner;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// pixgen worker - LoRA fine-tuning and image generation
#[derive(Parser, Debug)]
#[command(name = "pixgen-worker")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the worker config file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to bind the API server (overrides config)
    #[arg(long)]
    address: Option<String>,

    /// Port for the API server (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");

    info!("Starting pixgen worker v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = match &args.config {
        Some(path) => WorkerConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => WorkerConfig::default(),
    };
    if let Some(address) = args.address {
        config.api.address = address;
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }

    let secrets = Secrets::from_env().context("Missing required secrets")?;

    info!(
        weights_path = %config.volume.weights_path.display(),
        bucket = %config.object_store.bucket,
        "Worker configured"
    );

    // Build the task runner and API router
    let runner = Arc::new(TaskRunner::new(&config, &secrets));
    let router = create_router(runner);

    let addr: SocketAddr = format!("{}:{}", config.api.address, config.api.port)
        .parse()
        .context("Invalid bind address")?;

    info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind")?;
    axum::serve(listener, router).await.context("Server error")?;

    Ok(())
}
