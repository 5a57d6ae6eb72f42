//! Sentence pipeline orchestration
//!
//! Segment, score every sentence in batches, explain the sentences that will
//! be reported, then assemble [`SentenceRecord`]s in document order.

use crate::adapter::BiasClassifierAdapter;
use crate::attribution::{AttributionEngine, AttributionOutcome};
use crate::config::AnalyzerConfig;
use crate::explanation::ExplanationFormatter;
use crate::fallback::FallbackScorer;
use crate::segmenter::SentenceSegmenter;
use biaslab_core::{Result, SentenceRecord};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Output of one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct SentenceAnalysis {
    /// Sentences produced by the segmenter and scored by the model
    pub sentences_scored: usize,

    /// Reported sentences (score above the highlight threshold), in document order
    pub records: Vec<SentenceRecord>,

    /// How many reported sentences used the fallback explanation
    pub fallbacks: usize,
}

/// Drives segmentation, scoring, attribution and record assembly
#[derive(Clone)]
pub struct SentencePipeline {
    segmenter: SentenceSegmenter,
    adapter: Arc<BiasClassifierAdapter>,
    engine: AttributionEngine,
    formatter: ExplanationFormatter,
    fallback: FallbackScorer,
    highlight_threshold: f64,
}

impl SentencePipeline {
    /// Assemble a pipeline from its parts
    pub fn new(
        segmenter: SentenceSegmenter,
        adapter: Arc<BiasClassifierAdapter>,
        engine: AttributionEngine,
        formatter: ExplanationFormatter,
        highlight_threshold: f64,
    ) -> Self {
        Self {
            segmenter,
            adapter,
            engine,
            formatter,
            fallback: FallbackScorer::default(),
            highlight_threshold,
        }
    }

    /// Build a pipeline whose attributions use the same adapter it scores with
    pub fn from_config(adapter: Arc<BiasClassifierAdapter>, config: &AnalyzerConfig) -> Result<Self> {
        config.validate()?;

        let segmenter =
            SentenceSegmenter::with_abbreviations(&config.segmenter.extra_abbreviations)?;
        let engine = AttributionEngine::new(adapter.clone(), config.attribution.clone());
        let formatter = ExplanationFormatter::from_config(&config.explanation);

        Ok(Self::new(
            segmenter,
            adapter,
            engine,
            formatter,
            config.pipeline.highlight_threshold,
        ))
    }

    /// Replace the attribution engine
    pub fn with_engine(mut self, engine: AttributionEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Replace the fallback scorer
    pub fn with_fallback(mut self, fallback: FallbackScorer) -> Self {
        self.fallback = fallback;
        self
    }

    /// Analyse a document.
    ///
    /// Fails only when the classifier cannot score; attribution failures fall
    /// back per sentence.
    pub async fn run(&self, text: &str) -> Result<SentenceAnalysis> {
        let start = Instant::now();

        let sentences = self.segmenter.segment(text);
        if sentences.is_empty() {
            return Ok(SentenceAnalysis {
                sentences_scored: 0,
                records: Vec::new(),
                fallbacks: 0,
            });
        }

        let scores = self.adapter.score_batch(&sentences).await?;
        metrics::counter!("biaslab_sentences_scored_total").increment(sentences.len() as u64);
        metrics::histogram!("biaslab_pipeline_latency_us", "phase" => "classify")
            .record(start.elapsed().as_micros() as f64);

        // Only reported sentences need explanations
        let survivors: Vec<(String, f64)> = sentences
            .iter()
            .zip(&scores)
            .filter(|(_, score)| **score > self.highlight_threshold)
            .map(|(sentence, &score)| (sentence.clone(), score))
            .collect();

        let explain_start = Instant::now();
        let texts: Vec<String> = survivors.iter().map(|(s, _)| s.clone()).collect();
        let outcomes = self.engine.explain_batch(&texts).await;
        metrics::histogram!("biaslab_pipeline_latency_us", "phase" => "attribution")
            .record(explain_start.elapsed().as_micros() as f64);

        let mut records = Vec::with_capacity(survivors.len());
        let mut fallbacks = 0;

        for ((sentence, score), outcome) in survivors.into_iter().zip(outcomes) {
            let explanation = match outcome {
                AttributionOutcome::Attributed(attribution) => self.formatter.format(&attribution),
                AttributionOutcome::Unavailable { reason } => {
                    warn!(%reason, "Attribution unavailable, using fallback explanation");
                    metrics::counter!("biaslab_explanation_fallbacks_total").increment(1);
                    fallbacks += 1;
                    self.fallback.explain(&sentence, score).explanation
                }
            };

            let (begin, end) = char_span(text, &sentence);
            records.push(SentenceRecord::new(begin, end, sentence, score, explanation));
        }

        debug!(
            sentences = sentences.len(),
            reported = records.len(),
            fallbacks,
            latency_us = start.elapsed().as_micros() as u64,
            "Sentence pipeline complete"
        );

        Ok(SentenceAnalysis {
            sentences_scored: sentences.len(),
            records,
            fallbacks,
        })
    }
}

/// Character offsets of the first occurrence of `needle`, or the whole
/// sentence length from zero when it is absent
fn char_span(haystack: &str, needle: &str) -> (usize, usize) {
    let len = needle.chars().count();
    match haystack.find(needle) {
        Some(byte_start) => {
            let start = haystack[..byte_start].chars().count();
            (start, start + len)
        }
        None => (0, len),
    }
}
