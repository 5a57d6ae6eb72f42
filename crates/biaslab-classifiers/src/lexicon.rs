//! Lexicon bias classifier
//!
//! A deterministic model over loaded and subjective terms, used when no
//! transformer checkpoint is configured. Each whole-word hit of a term with
//! weight `w` is treated as independent evidence, so a sentence scores
//! `1 - prod(1 - w)`, capped at [`LexiconBiasClassifier::MAX_SCORE`].

use crate::classifier::{Classifier, DocumentScore, DocumentScorer};
use aho_corasick::{AhoCorasick, MatchKind};
use async_trait::async_trait;
use biaslab_core::{Error, Result};
use std::collections::HashMap;
use tracing::info;

const DEFAULT_TERMS: &[(&str, f64)] = &[
    // Insults and contempt
    ("idiot", 0.55),
    ("idiots", 0.55),
    ("moron", 0.55),
    ("morons", 0.55),
    ("clueless", 0.45),
    ("pathetic", 0.45),
    ("incompetent", 0.4),
    ("disgraceful", 0.45),
    ("shameful", 0.4),
    ("ridiculous", 0.35),
    ("absurd", 0.3),
    // Loaded political labels
    ("radical", 0.3),
    ("extremist", 0.4),
    ("extremists", 0.4),
    ("corrupt", 0.4),
    ("regime", 0.25),
    ("propaganda", 0.35),
    ("elites", 0.25),
    ("thugs", 0.5),
    ("so-called", 0.3),
    // Sensational framing
    ("outrageous", 0.35),
    ("shocking", 0.3),
    ("disastrous", 0.35),
    ("catastrophic", 0.3),
    ("devastating", 0.25),
    ("slammed", 0.3),
    ("blasted", 0.3),
    ("destroyed", 0.25),
    ("scandal", 0.25),
    ("chaos", 0.25),
    ("reckless", 0.35),
    ("insane", 0.4),
    // Certainty and intensifiers
    ("obviously", 0.2),
    ("clearly", 0.15),
    ("undeniably", 0.2),
    ("everyone knows", 0.3),
    ("always", 0.1),
    ("never", 0.1),
    ("totally", 0.15),
];

/// Lexicon-based bias classifier
pub struct LexiconBiasClassifier {
    name: String,
    matcher: AhoCorasick,
    weights: Vec<f64>,
}

impl LexiconBiasClassifier {
    /// Highest probability the lexicon will report
    pub const MAX_SCORE: f64 = 0.95;

    /// Weighted hits per word that saturate the document score
    const DOCUMENT_DENSITY_SCALE: f64 = 5.0;

    /// Create a classifier with the builtin term list
    pub fn new() -> Result<Self> {
        Self::with_terms(&HashMap::new())
    }

    /// Create a classifier with extra terms; an extra term overrides a builtin weight
    pub fn with_terms(extra: &HashMap<String, f64>) -> Result<Self> {
        let mut terms: HashMap<String, f64> = DEFAULT_TERMS
            .iter()
            .map(|(term, weight)| (term.to_string(), *weight))
            .collect();

        for (term, weight) in extra {
            if !(0.0..=1.0).contains(weight) {
                return Err(Error::config(format!(
                    "lexicon weight for '{term}' must be within [0, 1]"
                )));
            }
            let term = term.trim().to_lowercase();
            if !term.is_empty() {
                terms.insert(term, *weight);
            }
        }

        let mut entries: Vec<(String, f64)> = terms.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let matcher = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .match_kind(MatchKind::LeftmostLongest)
            .build(entries.iter().map(|(term, _)| term.as_str()))
            .map_err(|e| Error::classifier(format!("Failed to build bias lexicon matcher: {e}")))?;

        info!(terms = entries.len(), "Loaded bias lexicon");

        Ok(Self {
            name: "lexicon".to_string(),
            matcher,
            weights: entries.into_iter().map(|(_, weight)| weight).collect(),
        })
    }

    /// Weights of every whole-word term hit in `text`
    fn hits(&self, text: &str) -> Vec<f64> {
        self.matcher
            .find_iter(text)
            .filter(|m| is_word_boundary(text, m.start(), m.end()))
            .map(|m| self.weights[m.pattern().as_usize()])
            .collect()
    }

    /// Sentence-level P(biased)
    pub fn score_text(&self, text: &str) -> f64 {
        let neutral: f64 = self.hits(text).iter().map(|w| 1.0 - w).product();
        (1.0 - neutral).clamp(0.0, Self::MAX_SCORE)
    }
}

fn is_word_boundary(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
}

#[async_trait]
impl Classifier for LexiconBiasClassifier {
    async fn predict_batch(&self, texts: &[String]) -> Result<Vec<f64>> {
        Ok(texts.iter().map(|t| self.score_text(t)).collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl DocumentScorer for LexiconBiasClassifier {
    async fn score_document(&self, text: &str) -> Result<DocumentScore> {
        let words = text.split_whitespace().count();
        if words == 0 {
            return Ok(DocumentScore::new(0.0));
        }

        let weighted: f64 = self.hits(text).iter().sum();
        let density = weighted / words as f64;
        Ok(DocumentScore::new(
            (density * Self::DOCUMENT_DENSITY_SCALE).min(Self::MAX_SCORE),
        ))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_neutral_sentence() {
        let classifier = LexiconBiasClassifier::new().unwrap();
        let scores = classifier
            .predict_batch(&["The policy is great.".to_string()])
            .await
            .unwrap();
        assert_eq!(scores, vec![0.0]);
    }

    #[tokio::test]
    async fn test_loaded_sentence() {
        let classifier = LexiconBiasClassifier::new().unwrap();
        let score = classifier.score_text("Critics are clueless idiots.");
        // 1 - (1 - 0.45) * (1 - 0.55)
        assert!((score - 0.7525).abs() < 1e-9);
    }

    #[test]
    fn test_case_insensitive_whole_words() {
        let classifier = LexiconBiasClassifier::new().unwrap();
        assert!(classifier.score_text("CORRUPT officials") > 0.0);
        // "corruption" is not the term "corrupt"
        assert_eq!(classifier.score_text("anti-corruption corruptions"), 0.0);
        assert_eq!(classifier.score_text("a radicalized group"), 0.0);
    }

    #[test]
    fn test_score_is_capped() {
        let classifier = LexiconBiasClassifier::new().unwrap();
        let score = classifier.score_text("idiots idiots idiots idiots morons thugs insane");
        assert_eq!(score, LexiconBiasClassifier::MAX_SCORE);
    }

    #[test]
    fn test_extra_terms() {
        let mut extra = HashMap::new();
        extra.insert("Spin Doctors".to_string(), 0.5);
        let classifier = LexiconBiasClassifier::with_terms(&extra).unwrap();
        assert!((classifier.score_text("the spin doctors said") - 0.5).abs() < 1e-12);

        extra.insert("bad".to_string(), 1.5);
        assert!(matches!(
            LexiconBiasClassifier::with_terms(&extra),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_document_score_scales_with_density() {
        let classifier = LexiconBiasClassifier::new().unwrap();

        let empty = classifier.score_document("  ").await.unwrap();
        assert_eq!(empty.score, 0.0);
        assert!(empty.themes.is_empty());

        let calm = classifier
            .score_document("The council met on Tuesday to review the budget.")
            .await
            .unwrap();
        assert_eq!(calm.score, 0.0);

        // 0.1 weighted hits over 10 words, scaled by 5
        let mild = classifier
            .score_document("It will never be finished in time for the event.")
            .await
            .unwrap();
        assert!((mild.score - 0.05).abs() < 1e-9);
    }
}
