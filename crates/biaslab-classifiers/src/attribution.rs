//! Perturbation-based word attributions
//!
//! Each word's contribution is its Shapley value under a masking game: the
//! "players" are the whitespace-delimited words of the sentence, and the value
//! of a coalition is the bias probability of the sentence with every other
//! word masked. Short sentences are enumerated exactly; longer ones are
//! estimated from sampled permutations. Both satisfy
//! `sum(values) == full_value - base_value`.

use crate::config::{AttributionConfig, MAX_EXACT_WORDS};
use async_trait::async_trait;
use biaslab_core::{Error, Result};
use futures::stream::{self, StreamExt};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Batch scoring function the attributions are computed against
#[async_trait]
pub trait ScoringOracle: Send + Sync {
    /// One P(biased) per text, in input order
    async fn score(&self, texts: &[String]) -> Result<Vec<f64>>;
}

/// Signed contribution of one word
#[derive(Debug, Clone, PartialEq)]
pub struct TokenAttribution {
    /// The word as it appears in the sentence
    pub token: String,

    /// Word index in the sentence
    pub position: usize,

    /// Positive values push toward "biased"
    pub value: f64,
}

/// Attributions for one sentence
#[derive(Debug, Clone, PartialEq)]
pub struct Attribution {
    /// Score with every word masked
    pub base_value: f64,

    /// Score of the unmodified sentence
    pub full_value: f64,

    /// Per-word contributions in sentence order
    pub tokens: Vec<TokenAttribution>,
}

impl Attribution {
    /// Sum of all word contributions
    pub fn total(&self) -> f64 {
        self.tokens.iter().map(|t| t.value).sum()
    }
}

/// Per-sentence result of [`AttributionEngine::explain_batch`]
#[derive(Debug, Clone, PartialEq)]
pub enum AttributionOutcome {
    /// Attributions were computed
    Attributed(Attribution),

    /// Attributions could not be computed; the caller should fall back
    Unavailable { reason: String },
}

impl AttributionOutcome {
    /// Whether attributions are present
    pub fn is_attributed(&self) -> bool {
        matches!(self, Self::Attributed(_))
    }
}

/// Computes word attributions against a scoring oracle
#[derive(Clone)]
pub struct AttributionEngine {
    oracle: Arc<dyn ScoringOracle>,
    config: AttributionConfig,
}

impl AttributionEngine {
    /// Create an engine over the given scoring function.
    ///
    /// Exact enumeration is capped at [`MAX_EXACT_WORDS`] words; longer
    /// sentences are always sampled.
    pub fn new(oracle: Arc<dyn ScoringOracle>, mut config: AttributionConfig) -> Self {
        config.exact_max_words = config.exact_max_words.min(MAX_EXACT_WORDS);
        Self { oracle, config }
    }

    /// Engine configuration
    pub fn config(&self) -> &AttributionConfig {
        &self.config
    }

    /// Explain each sentence independently.
    ///
    /// The output is aligned with the input. A failure or timeout for one
    /// sentence yields [`AttributionOutcome::Unavailable`] for that sentence
    /// only.
    pub async fn explain_batch(&self, sentences: &[String]) -> Vec<AttributionOutcome> {
        let budget = Duration::from_millis(self.config.timeout_ms);

        stream::iter(0..sentences.len())
            .map(move |index| {
                let sentence = &sentences[index];
                async move {
                    match tokio::time::timeout(budget, self.explain(sentence)).await {
                        Ok(Ok(attribution)) => AttributionOutcome::Attributed(attribution),
                        Ok(Err(e)) => AttributionOutcome::Unavailable {
                            reason: e.to_string(),
                        },
                        Err(_) => AttributionOutcome::Unavailable {
                            reason: format!(
                                "attribution timed out after {}ms",
                                self.config.timeout_ms
                            ),
                        },
                    }
                }
            })
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await
    }

    /// Explain a single sentence
    pub async fn explain(&self, sentence: &str) -> Result<Attribution> {
        let words: Vec<&str> = sentence.split_whitespace().collect();

        if words.is_empty() {
            let values = self.score_all(vec![sentence.to_string()]).await?;
            return Ok(Attribution {
                base_value: values[0],
                full_value: values[0],
                tokens: Vec::new(),
            });
        }

        let (base_value, full_value, values) = if words.len() <= self.config.exact_max_words {
            self.exact_shapley(&words).await?
        } else {
            self.sampled_shapley(&words).await?
        };

        debug!(
            words = words.len(),
            base = base_value,
            full = full_value,
            "Computed attributions"
        );

        Ok(Attribution {
            base_value,
            full_value,
            tokens: words
                .iter()
                .zip(values)
                .enumerate()
                .map(|(position, (word, value))| TokenAttribution {
                    token: word.to_string(),
                    position,
                    value,
                })
                .collect(),
        })
    }

    /// Enumerate every coalition; coalition `mask` keeps word `i` iff bit `i` is set
    async fn exact_shapley(&self, words: &[&str]) -> Result<(f64, f64, Vec<f64>)> {
        let n = words.len();
        let coalitions = 1usize << n;

        let texts: Vec<String> = (0..coalitions)
            .map(|mask| self.compose(words, |i| mask & (1 << i) != 0))
            .collect();
        let values = self.score_all(texts).await?;

        // weight(k) = k! (n - k - 1)! / n!
        let factorial: Vec<f64> = (0..=n)
            .scan(1.0, |acc, k| {
                if k > 0 {
                    *acc *= k as f64;
                }
                Some(*acc)
            })
            .collect();
        let weights: Vec<f64> = (0..n)
            .map(|k| factorial[k] * factorial[n - k - 1] / factorial[n])
            .collect();

        let mut phi = vec![0.0; n];
        for mask in 0..coalitions {
            let size = mask.count_ones() as usize;
            for (i, slot) in phi.iter_mut().enumerate() {
                let bit = 1 << i;
                if mask & bit == 0 {
                    *slot += weights[size] * (values[mask | bit] - values[mask]);
                }
            }
        }

        Ok((values[0], values[coalitions - 1], phi))
    }

    /// Average marginal contributions over seeded random permutations
    async fn sampled_shapley(&self, words: &[&str]) -> Result<(f64, f64, Vec<f64>)> {
        let n = words.len();
        let samples = self.config.permutations.max(1);
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        let mut orders = Vec::with_capacity(samples);
        for _ in 0..samples {
            let mut order: Vec<usize> = (0..n).collect();
            order.shuffle(&mut rng);
            orders.push(order);
        }

        // Layout: [empty, full, then n - 1 proper prefixes per permutation]
        let mut texts = Vec::with_capacity(2 + samples * (n - 1));
        texts.push(self.compose(words, |_| false));
        texts.push(self.compose(words, |_| true));
        for order in &orders {
            let mut included = vec![false; n];
            for &word in &order[..n - 1] {
                included[word] = true;
                texts.push(self.compose(words, |i| included[i]));
            }
        }

        let values = self.score_all(texts).await?;
        let (base_value, full_value) = (values[0], values[1]);

        let mut phi = vec![0.0; n];
        for (sample, order) in orders.iter().enumerate() {
            let prefixes = &values[2 + sample * (n - 1)..2 + (sample + 1) * (n - 1)];
            let mut previous = base_value;
            for (step, &word) in order.iter().enumerate() {
                let current = if step + 1 == n {
                    full_value
                } else {
                    prefixes[step]
                };
                phi[word] += current - previous;
                previous = current;
            }
        }

        for value in &mut phi {
            *value /= samples as f64;
        }

        Ok((base_value, full_value, phi))
    }

    /// Rebuild the sentence keeping only included words
    fn compose(&self, words: &[&str], include: impl Fn(usize) -> bool) -> String {
        let mut parts = Vec::with_capacity(words.len());
        for (i, word) in words.iter().enumerate() {
            if include(i) {
                parts.push(*word);
            } else if let Some(mask) = self.config.mask_token.as_deref() {
                parts.push(mask);
            }
        }
        parts.join(" ")
    }

    async fn score_all(&self, texts: Vec<String>) -> Result<Vec<f64>> {
        let expected = texts.len();
        let values = self
            .oracle
            .score(&texts)
            .await
            .map_err(|e| Error::explanation(format!("perturbation scoring failed: {e}")))?;

        if values.len() != expected {
            return Err(Error::explanation(format!(
                "scorer returned {} values for {expected} perturbations",
                values.len()
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::explanation("scorer returned a non-finite value"));
        }
        Ok(values)
    }
}
