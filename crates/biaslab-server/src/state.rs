//! Shared application state

use crate::config::ServerConfig;
use biaslab_classifiers::BiasAnalyzer;
use biaslab_media::{ImageAnalyzer, JobManager, UnavailableScorer, VideoAnalyzer};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tracing::info;

/// Services shared by every request handler
#[derive(Clone)]
pub struct AppState {
    /// Sentence and article bias analysis
    pub analyzer: Arc<BiasAnalyzer>,

    /// Image manipulation detection
    pub images: Arc<ImageAnalyzer>,

    /// Background video jobs
    pub jobs: JobManager,

    /// Prometheus metrics handle
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    /// Load models and build the shared services.
    ///
    /// Model loading blocks, so it runs on the blocking pool.
    pub async fn new(config: &ServerConfig, metrics_handle: PrometheusHandle) -> anyhow::Result<Self> {
        let analyzer_config = config.analyzer.clone();
        let analyzer =
            tokio::task::spawn_blocking(move || BiasAnalyzer::from_config(&analyzer_config))
                .await??;
        info!(model = analyzer.model_name(), "Text analyzer loaded");

        // No image or video model ships with the service; requests fail until one is wired in
        let images = ImageAnalyzer::new(Arc::new(UnavailableScorer::new("image")));
        let videos = VideoAnalyzer::new(Arc::new(UnavailableScorer::new("video")));

        Ok(Self::from_parts(
            analyzer,
            images,
            JobManager::new(videos, config.jobs.max_concurrent, config.jobs.timeout()),
            metrics_handle,
        ))
    }

    /// Assemble state from already built services
    pub fn from_parts(
        analyzer: BiasAnalyzer,
        images: ImageAnalyzer,
        jobs: JobManager,
        metrics_handle: PrometheusHandle,
    ) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
            images: Arc::new(images),
            jobs,
            metrics_handle,
        }
    }
}
