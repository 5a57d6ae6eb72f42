//! Classifier traits and common types

use async_trait::async_trait;
use biaslab_core::Result;

/// A binary sequence classifier over text.
///
/// Implementations return one P(biased) per input, in input order. They are
/// expected to be deterministic for fixed weights and to enforce their own
/// token limit; batching is handled by [`crate::BiasClassifierAdapter`].
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Score a batch of texts
    async fn predict_batch(&self, texts: &[String]) -> Result<Vec<f64>>;

    /// Get the classifier name
    fn name(&self) -> &str;
}

/// Whole-document score used when no sentence is reported
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentScore {
    /// Bias probability for the whole document (0.0-1.0)
    pub score: f64,

    /// Topic tags produced alongside the score
    pub themes: Vec<String>,
}

impl DocumentScore {
    /// Create a document score with no themes
    pub fn new(score: f64) -> Self {
        Self {
            score,
            themes: Vec::new(),
        }
    }
}

/// Optional whole-document model
#[async_trait]
pub trait DocumentScorer: Send + Sync {
    /// Score an entire document
    async fn score_document(&self, text: &str) -> Result<DocumentScore>;

    /// Get the scorer name
    fn name(&self) -> &str;
}
