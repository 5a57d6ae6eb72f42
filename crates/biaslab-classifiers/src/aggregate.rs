//! Article-level aggregation

use crate::classifier::DocumentScore;
use biaslab_core::{round_to, ArticleVerdict, OverallBias, SentenceRecord};

/// Combines reported sentences into one verdict.
///
/// The bias probability is the mean score of the highlights. With no
/// highlights it is the whole-document score when one is supplied and 0.0
/// otherwise. Confidence is reported for the chosen verdict, so it is never
/// below 0.5; a document whose sentences were all filtered out is therefore
/// "neutral" with confidence 1.0 unless a document score says otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArticleAggregator;

impl ArticleAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Build the verdict for a document
    pub fn aggregate(
        &self,
        highlights: Vec<SentenceRecord>,
        document: Option<DocumentScore>,
        original_text: impl Into<String>,
    ) -> ArticleVerdict {
        let (raw, themes) = if !highlights.is_empty() {
            let sum: f64 = highlights.iter().map(|h| h.score).sum();
            (sum / highlights.len() as f64, Vec::new())
        } else if let Some(document) = document {
            (document.score, document.themes)
        } else {
            (0.0, Vec::new())
        };

        let bias_prob = if raw.is_finite() {
            raw.clamp(0.0, 1.0)
        } else {
            0.0
        };

        let overall_bias = OverallBias::from_probability(bias_prob);
        let confidence = match overall_bias {
            OverallBias::Biased => bias_prob,
            OverallBias::Neutral => 1.0 - bias_prob,
        };
        let confidence_score = round_to(confidence, 4);

        ArticleVerdict {
            overall_bias,
            confidence_score,
            confidence_pct: round_to(confidence_score * 100.0, 2),
            highlights,
            themes,
            original_text: original_text.into(),
        }
    }
}
