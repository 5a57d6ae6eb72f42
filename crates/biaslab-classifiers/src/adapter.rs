//! Batching adapter in front of a bias classifier

use crate::attribution::ScoringOracle;
use crate::classifier::Classifier;
use crate::config::ClassifierSettings;
use async_trait::async_trait;
use biaslab_core::{Error, Result};
use std::sync::Arc;
use tracing::debug;

/// Scores sentences in fixed-size batches.
///
/// Batching is transparent: the output has the same order and length as the
/// input, and equals what an unbatched call would return. Each sentence is
/// truncated to `max_tokens` whitespace-delimited words before scoring.
#[derive(Clone)]
pub struct BiasClassifierAdapter {
    model: Arc<dyn Classifier>,
    batch_size: usize,
    max_tokens: usize,
}

impl BiasClassifierAdapter {
    /// Wrap a classifier
    pub fn new(model: Arc<dyn Classifier>, batch_size: usize, max_tokens: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::config("batch size must be at least 1"));
        }
        if max_tokens == 0 {
            return Err(Error::config("max tokens must be at least 1"));
        }
        Ok(Self {
            model,
            batch_size,
            max_tokens,
        })
    }

    /// Wrap a classifier using configured batch settings
    pub fn from_settings(model: Arc<dyn Classifier>, settings: &ClassifierSettings) -> Result<Self> {
        Self::new(model, settings.batch_size, settings.max_tokens)
    }

    /// Name of the wrapped classifier
    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Score sentences, one P(biased) in [0, 1] per input.
    ///
    /// Any model failure is a [`Error::Classifier`] for the whole call; no
    /// score is ever invented for a sentence the model did not score.
    pub async fn score_batch(&self, sentences: &[String]) -> Result<Vec<f64>> {
        let mut scores = Vec::with_capacity(sentences.len());

        for (index, chunk) in sentences.chunks(self.batch_size).enumerate() {
            // Models may score synchronously; give timers a turn between batches
            if index > 0 {
                tokio::task::yield_now().await;
            }

            let inputs: Vec<String> = chunk
                .iter()
                .map(|s| truncate_words(s, self.max_tokens).to_string())
                .collect();

            let batch_scores = self.model.predict_batch(&inputs).await.map_err(|e| match e {
                Error::Classifier(_) => e,
                other => Error::classifier(format!("{}: {other}", self.model.name())),
            })?;

            if batch_scores.len() != inputs.len() {
                return Err(Error::classifier(format!(
                    "{} returned {} scores for {} inputs",
                    self.model.name(),
                    batch_scores.len(),
                    inputs.len()
                )));
            }

            for score in batch_scores {
                if !score.is_finite() {
                    return Err(Error::classifier(format!(
                        "{} returned a non-finite score",
                        self.model.name()
                    )));
                }
                scores.push(score.clamp(0.0, 1.0));
            }

            debug!(
                model = self.model.name(),
                batch = inputs.len(),
                "Scored batch"
            );
        }

        Ok(scores)
    }
}

#[async_trait]
impl ScoringOracle for BiasClassifierAdapter {
    async fn score(&self, texts: &[String]) -> Result<Vec<f64>> {
        self.score_batch(texts).await
    }
}

/// Keep at most `max_words` whitespace-delimited words, dropping the rest
fn truncate_words(text: &str, max_words: usize) -> &str {
    let mut words = 0;
    let mut in_word = false;

    for (idx, c) in text.char_indices() {
        if c.is_whitespace() {
            if in_word {
                words += 1;
                in_word = false;
                if words == max_words {
                    return &text[..idx];
                }
            }
        } else {
            in_word = true;
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scores by word count and records every batch size it sees
    struct WordCountModel {
        calls: AtomicUsize,
        max_batch: AtomicUsize,
    }

    impl WordCountModel {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                max_batch: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Classifier for WordCountModel {
        async fn predict_batch(&self, texts: &[String]) -> Result<Vec<f64>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.max_batch.fetch_max(texts.len(), Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| t.split_whitespace().count() as f64 / 10.0)
                .collect())
        }

        fn name(&self) -> &str {
            "word_count"
        }
    }

    struct ShortModel;

    #[async_trait]
    impl Classifier for ShortModel {
        async fn predict_batch(&self, _texts: &[String]) -> Result<Vec<f64>> {
            Ok(vec![0.5])
        }

        fn name(&self) -> &str {
            "short"
        }
    }

    struct BrokenModel;

    #[async_trait]
    impl Classifier for BrokenModel {
        async fn predict_batch(&self, _texts: &[String]) -> Result<Vec<f64>> {
            Err(Error::internal("tensor shape mismatch"))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    #[test]
    fn test_truncate_words() {
        assert_eq!(truncate_words("one two three four", 2), "one two");
        assert_eq!(truncate_words("one two", 2), "one two");
        assert_eq!(truncate_words("  lead   spaces here", 1), "  lead");
        assert_eq!(truncate_words("", 3), "");
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let model: Arc<dyn Classifier> = Arc::new(WordCountModel::new());
        assert!(matches!(
            BiasClassifierAdapter::new(model, 0, 10),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_batches_are_bounded_and_ordered() {
        let model = Arc::new(WordCountModel::new());
        let adapter = BiasClassifierAdapter::new(model.clone(), 2, 128).unwrap();

        let sentences: Vec<String> = (1..=5).map(|n| vec!["w"; n].join(" ")).collect();
        let scores = adapter.score_batch(&sentences).await.unwrap();

        assert_eq!(scores, vec![0.1, 0.2, 0.3, 0.4, 0.5]);
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);
        assert_eq!(model.max_batch.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_long_sentences_are_truncated() {
        let model = Arc::new(WordCountModel::new());
        let adapter = BiasClassifierAdapter::new(model, 8, 3).unwrap();

        let long = "a b c d e f g h i j k l m n o".to_string();
        let scores = adapter.score_batch(&[long]).await.unwrap();
        assert!((scores[0] - 0.3).abs() < 1e-12);

        let adapter = BiasClassifierAdapter::new(Arc::new(WordCountModel::new()), 8, 128).unwrap();
        let scores = adapter.score_batch(&["a b c d e f g h i j k l m n o".to_string()]).await.unwrap();
        assert_eq!(scores, vec![1.0]);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let adapter = BiasClassifierAdapter::new(Arc::new(WordCountModel::new()), 8, 128).unwrap();
        assert!(adapter.score_batch(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_length_mismatch_is_classifier_error() {
        let adapter = BiasClassifierAdapter::new(Arc::new(ShortModel), 8, 128).unwrap();
        let result = adapter
            .score_batch(&["one".to_string(), "two".to_string()])
            .await;
        assert!(matches!(result, Err(Error::Classifier(_))));
    }

    #[tokio::test]
    async fn test_model_errors_become_classifier_errors() {
        let adapter = BiasClassifierAdapter::new(Arc::new(BrokenModel), 8, 128).unwrap();
        let err = adapter.score_batch(&["text".to_string()]).await.unwrap_err();
        assert!(matches!(err, Error::Classifier(_)));
        assert!(err.to_string().contains("broken"));
    }
}
