//! Degraded explanations for sentences without attributions

use biaslab_core::BiasLevel;

/// Level and naive explanation for one sentence
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackExplanation {
    pub bias_level: BiasLevel,
    pub explanation: String,
}

/// Explains a sentence by its leading words.
///
/// This is the terminal fallback: it is infallible and never calls a model.
#[derive(Debug, Clone)]
pub struct FallbackScorer {
    words: usize,
}

impl FallbackScorer {
    /// Words kept in a fallback explanation
    pub const DEFAULT_WORDS: usize = 5;

    /// Create a fallback scorer keeping `words` leading words
    pub fn new(words: usize) -> Self {
        Self { words }
    }

    /// Explain a sentence that already has a score
    pub fn explain(&self, sentence: &str, score: f64) -> FallbackExplanation {
        let explanation = sentence
            .split_whitespace()
            .take(self.words)
            .collect::<Vec<_>>()
            .join("; ");

        FallbackExplanation {
            bias_level: BiasLevel::from_score(score),
            explanation,
        }
    }
}

impl Default for FallbackScorer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WORDS)
    }
}
