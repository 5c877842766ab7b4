use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use logger_redacted::LoggerConfig;
use std::path::PathBuf;
use tracing::{info, warn};

use predictor_server::{create_app, server::DEFAULT_CONFIG_FILE, PredictorServer, ServerConfig};

/// COVID hospitalization predictor HTTP server
#[derive(Parser, Debug)]
#[command(name = "predictor-server")]
#[command(about = "HTTP API predicting whether a COVID patient will be hospitalized")]
#[command(version)]
struct Args {
    /// Server bind address (overrides the configuration file)
    #[arg(long)]
    host: Option<String>,

    /// Server port
    #[arg(short, long)]
    port: Option<u16>,

    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Model bundle artifact
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = ServerConfig::load(&args.config)?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(model) = args.model {
        config.model_path = model;
    }

    let logger = LoggerConfig::new(["predictor-server", "predictor-core"])
        .with_format(config.log_format)
        .verbose(args.verbose);
    logger_redacted::init(&logger)?;

    info!("🏥 {}", format!("Starting {}", config.name).bright_cyan());
    info!("📋 Version: {}", env!("CARGO_PKG_VERSION").bright_white());
    info!(model = %config.model_path.display(), "Loading model bundle");

    // Load before binding so no request sees a half-initialised service
    let server = PredictorServer::from_config(config);
    if !server.service().is_loaded() {
        warn!("⚠️  {}", "Model not loaded; prediction endpoints will answer 503".bright_yellow());
    }

    let addr = server.config().bind_address();
    let app = create_app(server);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("🚀 {}", format!("Predictor running on http://{}", addr).bright_green());
    info!("📋 {}", format!("Health check available at: http://{}/health", addr).bright_blue());
    info!("📋 {}", format!("OpenAPI document at: http://{}/api-docs/openapi.json", addr).bright_blue());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
