//! shellmatch-engine - customer-to-shell account matching service
//!
//! Serves the batch matching API over HTTP REST + SSE. The account directory
//! is either a REST endpoint or an offline JSON snapshot; the assessment
//! service is disabled when no API key is configured.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shellmatch_common::events::EventBus;
use shellmatch_engine::assessment::{AssessmentService, DisabledAssessment, OpenAiAssessmentClient};
use shellmatch_engine::config::EngineConfig;
use shellmatch_engine::directory::{AccountDirectory, InMemoryDirectory, RestDirectory};
use shellmatch_engine::orchestrator::MatchOrchestrator;
use shellmatch_engine::AppState;

/// Command-line arguments for shellmatch-engine
#[derive(Parser, Debug)]
#[command(name = "shellmatch-engine")]
#[command(about = "Customer-to-shell account matching service")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to the TOML config file
    #[arg(short, long, env = "SHELLMATCH_CONFIG")]
    config: Option<PathBuf>,

    /// JSON account snapshot to use instead of the REST directory
    #[arg(long, env = "SHELLMATCH_DIRECTORY_SNAPSHOT")]
    directory_snapshot: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = EngineConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(snapshot) = args.directory_snapshot {
        config.directory.snapshot_path = Some(snapshot);
    }

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("shellmatch_engine={0},tower_http={0}", config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting shellmatch-engine");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let directory: Arc<dyn AccountDirectory> = match &config.directory.snapshot_path {
        Some(path) => {
            info!("Account directory: snapshot {}", path.display());
            Arc::new(InMemoryDirectory::from_snapshot(path).context("Failed to load directory snapshot")?)
        }
        None => {
            let rest = RestDirectory::new(&config.directory).context("No account directory configured")?;
            info!("Account directory: REST");
            Arc::new(rest)
        }
    };

    let assessment: Arc<dyn AssessmentService> = match config.assessment.api_key.clone() {
        Some(key) => {
            info!(model = %config.assessment.model, "Assessment service: {}", config.assessment.base_url);
            Arc::new(
                OpenAiAssessmentClient::new(&config.assessment, key)
                    .context("Failed to initialize assessment client")?,
            )
        }
        None => {
            warn!("Assessment service disabled; matched pairs keep provisional confidence");
            Arc::new(DisabledAssessment)
        }
    };

    let event_bus = EventBus::new(100);
    let orchestrator = MatchOrchestrator::new(directory, assessment, event_bus.clone());
    let state = AppState::new(orchestrator, event_bus, config.matching.clone());

    let app = shellmatch_engine::build_router(state).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
