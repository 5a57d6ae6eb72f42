//! Core types for BiasLab

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse bias bucket derived from a sentence score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BiasLevel {
    Neutral,
    Low,
    Medium,
    High,
}

impl BiasLevel {
    /// Upper bound (exclusive) of the `Low` bucket
    pub const MEDIUM_THRESHOLD: f64 = 0.3;
    /// Upper bound (exclusive) of the `Medium` bucket
    pub const HIGH_THRESHOLD: f64 = 0.6;

    /// Map a bias probability to its level.
    ///
    /// Total over all `f64` inputs: anything that is not strictly positive,
    /// including NaN, is `Neutral`.
    pub fn from_score(score: f64) -> Self {
        if score > Self::HIGH_THRESHOLD {
            Self::High
        } else if score > Self::MEDIUM_THRESHOLD {
            Self::Medium
        } else if score > 0.0 {
            Self::Low
        } else {
            Self::Neutral
        }
    }

    /// Get a human-readable label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for BiasLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reported sentence with its location, score, and explanation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceRecord {
    /// Character offset of the first occurrence of the sentence in the document
    pub start: usize,

    /// Character offset one past the end of the sentence
    pub end: usize,

    /// Sentence text
    pub sentence: String,

    /// Bias probability (0.0-1.0)
    pub score: f64,

    /// Human-readable explanation of what drove the score
    pub explanation: String,

    /// Bucket derived from `score`
    pub bias_level: BiasLevel,
}

impl SentenceRecord {
    /// Create a record, deriving the bias level from the score
    pub fn new(
        start: usize,
        end: usize,
        sentence: impl Into<String>,
        score: f64,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            start,
            end,
            sentence: sentence.into(),
            score,
            explanation: explanation.into(),
            bias_level: BiasLevel::from_score(score),
        }
    }
}

/// Document-level classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallBias {
    Biased,
    Neutral,
}

impl OverallBias {
    /// Bias probability at or above which a document is `Biased`
    pub const THRESHOLD: f64 = 0.5;

    /// Classify a bias probability
    pub fn from_probability(bias_prob: f64) -> Self {
        if bias_prob >= Self::THRESHOLD {
            Self::Biased
        } else {
            Self::Neutral
        }
    }
}

/// Aggregated verdict for a whole article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleVerdict {
    /// Chosen verdict
    pub overall_bias: OverallBias,

    /// Confidence in the chosen verdict (always >= 0.5), rounded to 4 places
    pub confidence_score: f64,

    /// `confidence_score` as a percentage, rounded to 2 places
    pub confidence_pct: f64,

    /// Reported sentences in document order
    pub highlights: Vec<SentenceRecord>,

    /// Topic tags from the whole-document model (empty when unused)
    pub themes: Vec<String>,

    /// The analysed text
    pub original_text: String,
}

/// Verdict for an image or video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaVerdict {
    /// Chosen label
    pub label: String,

    /// Confidence in the chosen label (0.0-1.0)
    pub score: f64,
}

impl MediaVerdict {
    /// Probability above which the positive label is chosen
    pub const THRESHOLD: f64 = 0.5;

    /// Build a verdict from the probability of the positive label.
    ///
    /// The score is reported as the confidence in whichever label was chosen.
    pub fn from_probability(
        probability: f64,
        positive: impl Into<String>,
        negative: impl Into<String>,
    ) -> Self {
        let probability = probability.clamp(0.0, 1.0);
        if probability > Self::THRESHOLD {
            Self {
                label: positive.into(),
                score: probability,
            }
        } else {
            Self {
                label: negative.into(),
                score: 1.0 - probability,
            }
        }
    }
}

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
