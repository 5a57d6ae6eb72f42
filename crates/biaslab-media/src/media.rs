//! Opaque media scorers and verdict thresholding

use async_trait::async_trait;
use biaslab_core::{Error, MediaVerdict, Result};
use std::sync::Arc;
use tracing::debug;

/// A pretrained image or video model invoked as a black box
#[async_trait]
pub trait MediaScorer: Send + Sync {
    /// Probability of the positive label ("manipulated" or "deepfake")
    async fn score(&self, bytes: &[u8]) -> Result<f64>;

    /// Get the scorer name
    fn name(&self) -> &str;
}

/// Placeholder for a model that has not been configured
#[derive(Debug, Clone)]
pub struct UnavailableScorer {
    name: String,
}

impl UnavailableScorer {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl MediaScorer for UnavailableScorer {
    async fn score(&self, _bytes: &[u8]) -> Result<f64> {
        Err(Error::media(format!("{} model is not configured", self.name)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

async fn score_upload(scorer: &dyn MediaScorer, bytes: &[u8]) -> Result<f64> {
    if bytes.is_empty() {
        return Err(Error::media("uploaded file is empty"));
    }

    let probability = scorer.score(bytes).await?;
    if !probability.is_finite() {
        return Err(Error::media(format!(
            "{} returned a non-finite probability",
            scorer.name()
        )));
    }

    debug!(scorer = scorer.name(), bytes = bytes.len(), probability, "Scored media");
    Ok(probability)
}

/// Image manipulation detection
#[derive(Clone)]
pub struct ImageAnalyzer {
    scorer: Arc<dyn MediaScorer>,
}

impl ImageAnalyzer {
    pub const POSITIVE: &'static str = "manipulated";
    pub const NEGATIVE: &'static str = "real";

    pub fn new(scorer: Arc<dyn MediaScorer>) -> Self {
        Self { scorer }
    }

    /// Label an image "manipulated" or "real"
    pub async fn analyze(&self, bytes: &[u8]) -> Result<MediaVerdict> {
        let probability = score_upload(self.scorer.as_ref(), bytes).await?;
        Ok(MediaVerdict::from_probability(
            probability,
            Self::POSITIVE,
            Self::NEGATIVE,
        ))
    }
}

/// Video deepfake detection
#[derive(Clone)]
pub struct VideoAnalyzer {
    scorer: Arc<dyn MediaScorer>,
}

impl VideoAnalyzer {
    pub const POSITIVE: &'static str = "deepfake";
    pub const NEGATIVE: &'static str = "real";

    pub fn new(scorer: Arc<dyn MediaScorer>) -> Self {
        Self { scorer }
    }

    /// Label a video "deepfake" or "real"
    pub async fn analyze(&self, bytes: &[u8]) -> Result<MediaVerdict> {
        let probability = score_upload(self.scorer.as_ref(), bytes).await?;
        Ok(MediaVerdict::from_probability(
            probability,
            Self::POSITIVE,
            Self::NEGATIVE,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedScorer(f64);

    #[async_trait]
    impl MediaScorer for FixedScorer {
        async fn score(&self, _bytes: &[u8]) -> Result<f64> {
            Ok(self.0)
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn test_image_labels() {
        let manipulated = ImageAnalyzer::new(Arc::new(FixedScorer(0.9)))
            .analyze(b"png")
            .await
            .unwrap();
        assert_eq!(manipulated.label, "manipulated");
        assert!((manipulated.score - 0.9).abs() < 1e-12);

        let real = ImageAnalyzer::new(Arc::new(FixedScorer(0.25)))
            .analyze(b"png")
            .await
            .unwrap();
        assert_eq!(real.label, "real");
        assert!((real.score - 0.75).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_video_labels() {
        let verdict = VideoAnalyzer::new(Arc::new(FixedScorer(0.51)))
            .analyze(b"mp4")
            .await
            .unwrap();
        assert_eq!(verdict.label, "deepfake");
    }

    #[tokio::test]
    async fn test_empty_upload_rejected() {
        let result = ImageAnalyzer::new(Arc::new(FixedScorer(0.9))).analyze(b"").await;
        assert!(matches!(result, Err(Error::Media(_))));
    }

    #[tokio::test]
    async fn test_non_finite_probability_rejected() {
        let result = VideoAnalyzer::new(Arc::new(FixedScorer(f64::NAN)))
            .analyze(b"mp4")
            .await;
        assert!(matches!(result, Err(Error::Media(_))));
    }

    #[tokio::test]
    async fn test_unavailable_scorer() {
        let err = ImageAnalyzer::new(Arc::new(UnavailableScorer::new("image")))
            .analyze(b"png")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "media error: image model is not configured");
    }
}
