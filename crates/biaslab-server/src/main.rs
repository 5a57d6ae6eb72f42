//! BiasLab Server
//!
//! HTTP service that scores news text for bias sentence by sentence, explains
//! each flagged sentence with word-level attributions, and labels uploaded
//! images and videos as real or manipulated.

use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info, warn};

mod config;
mod routes;
mod state;

use config::ServerConfig;

#[derive(Parser, Debug)]
#[command(name = "biaslab-server")]
#[command(about = "Explainable media bias analysis service", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "biaslab.yaml")]
    config: String,

    /// Listen address (overrides the configuration file)
    #[arg(short = 'l', long)]
    listen: Option<String>,

    /// Listen port (overrides the configuration file)
    #[arg(short = 'P', long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    info!("Starting BiasLab server");

    let config = ServerConfig::load(&cli.config, &cli)?;
    info!("Configuration loaded successfully");
    info!(
        exact_max_words = config.analyzer.attribution.exact_max_words,
        highlight_threshold = config.analyzer.pipeline.highlight_threshold,
        "Analyzer settings"
    );

    let metrics_handle = init_metrics()?;

    info!("Loading models...");
    let state = state::AppState::new(&config, metrics_handle).await?;
    info!("Application state initialized successfully");

    let addr: SocketAddr = format!("{}:{}", config.listen, config.port).parse()?;
    let app = routes::create_router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    let shutdown = async {
        shutdown_signal().await;
        warn!("Shutdown signal received, stopping server...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("biaslab=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("biaslab=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(
        "biaslab_requests_total",
        "Total number of requests processed by route"
    );
    metrics::describe_counter!(
        "biaslab_sentences_scored_total",
        "Total number of sentences scored by the bias classifier"
    );
    metrics::describe_counter!(
        "biaslab_explanation_fallbacks_total",
        "Sentences explained by the word-list fallback"
    );
    metrics::describe_counter!(
        "biaslab_video_jobs_total",
        "Video job state transitions by status"
    );
    metrics::describe_histogram!(
        "biaslab_pipeline_latency_us",
        metrics::Unit::Microseconds,
        "Analysis latency in microseconds by phase"
    );
    metrics::describe_counter!("biaslab_errors_total", "Total number of errors by type");

    info!("Metrics exporter initialized");
    Ok(handle)
}
