//! Bias analyzer service object
//!
//! Owns the loaded model handles and wires them into a [`SentencePipeline`]
//! and an [`ArticleAggregator`]. Build one at startup and share it behind an
//! `Arc`; model weights are read-only after load.

use crate::adapter::BiasClassifierAdapter;
use crate::aggregate::ArticleAggregator;
use crate::classifier::{Classifier, DocumentScorer};
use crate::config::{AnalyzerConfig, ModelSpec};
use crate::lexicon::LexiconBiasClassifier;
use crate::pipeline::{SentenceAnalysis, SentencePipeline};
use biaslab_core::{ArticleVerdict, Result, SentenceRecord};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Explainable sentence and article bias analysis
#[derive(Clone)]
pub struct BiasAnalyzer {
    pipeline: SentencePipeline,
    aggregator: ArticleAggregator,
    document_scorer: Option<Arc<dyn DocumentScorer>>,
    model_name: String,
}

impl BiasAnalyzer {
    /// Load the configured model and build the analyzer.
    ///
    /// Loading a BERT checkpoint blocks on file IO and, for Hub models, the
    /// network.
    pub fn from_config(config: &AnalyzerConfig) -> Result<Self> {
        config.validate()?;

        let model: Arc<dyn Classifier> = match &config.model {
            ModelSpec::Lexicon { extra_terms } => {
                Arc::new(LexiconBiasClassifier::with_terms(extra_terms)?)
            }
            ModelSpec::Bert { .. } => load_bert(config)?,
        };

        let mut analyzer = Self::with_model(model, config)?;

        if config.document_model.enabled {
            analyzer.document_scorer = Some(Arc::new(LexiconBiasClassifier::new()?));
        }

        Ok(analyzer)
    }

    /// Build the analyzer around an already loaded classifier
    pub fn with_model(model: Arc<dyn Classifier>, config: &AnalyzerConfig) -> Result<Self> {
        config.validate()?;

        let model_name = model.name().to_string();
        let adapter = Arc::new(BiasClassifierAdapter::from_settings(model, &config.classifier)?);
        let pipeline = SentencePipeline::from_config(adapter, config)?;

        info!(model = %model_name, "Bias analyzer ready");

        Ok(Self {
            pipeline,
            aggregator: ArticleAggregator::new(),
            document_scorer: None,
            model_name,
        })
    }

    /// Use a whole-document scorer when no sentence is reported
    pub fn with_document_scorer(mut self, scorer: Arc<dyn DocumentScorer>) -> Self {
        self.document_scorer = Some(scorer);
        self
    }

    /// Replace the sentence pipeline
    pub fn with_pipeline(mut self, pipeline: SentencePipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Name of the sentence model
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Reported sentences only
    pub async fn analyze_sentences(&self, text: &str) -> Result<Vec<SentenceRecord>> {
        Ok(self.pipeline.run(text).await?.records)
    }

    /// Full article verdict
    pub async fn analyze_article(&self, text: &str) -> Result<ArticleVerdict> {
        let start = Instant::now();
        let SentenceAnalysis { records, .. } = self.pipeline.run(text).await?;

        let document = match (&self.document_scorer, records.is_empty()) {
            (Some(scorer), true) => match scorer.score_document(text).await {
                Ok(score) => Some(score),
                Err(e) => {
                    warn!(scorer = scorer.name(), error = %e, "Document scorer failed");
                    None
                }
            },
            _ => None,
        };

        let verdict = self.aggregator.aggregate(records, document, text);

        metrics::histogram!("biaslab_pipeline_latency_us", "phase" => "article")
            .record(start.elapsed().as_micros() as f64);

        Ok(verdict)
    }
}

#[cfg(feature = "ml-models")]
fn load_bert(config: &AnalyzerConfig) -> Result<Arc<dyn Classifier>> {
    let model = crate::model_loader::BertBiasClassifier::from_spec(&config.model, &config.classifier)?;
    Ok(Arc::new(model))
}

#[cfg(not(feature = "ml-models"))]
fn load_bert(_config: &AnalyzerConfig) -> Result<Arc<dyn Classifier>> {
    Err(biaslab_core::Error::config(
        "BERT models require the `ml-models` feature",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use biaslab_core::{BiasLevel, OverallBias};

    #[tokio::test]
    async fn test_lexicon_analyzer_end_to_end() {
        let analyzer = BiasAnalyzer::from_config(&AnalyzerConfig::default()).unwrap();
        assert_eq!(analyzer.model_name(), "lexicon");

        let text = "The policy is great. Critics are clueless idiots.";
        let verdict = analyzer.analyze_article(text).await.unwrap();

        assert_eq!(verdict.highlights.len(), 1);
        let record = &verdict.highlights[0];
        assert_eq!(record.sentence, "Critics are clueless idiots.");
        assert_eq!(record.start, 21);
        assert_eq!(record.end, 49);
        assert_eq!(record.bias_level, BiasLevel::High);
        assert_eq!(verdict.overall_bias, OverallBias::Biased);
        assert_eq!(verdict.confidence_score, 0.7525);
        assert!(record.explanation.starts_with("idiots; clueless"));
    }

    #[tokio::test]
    async fn test_document_scorer_only_without_highlights() {
        let mut config = AnalyzerConfig::default();
        config.document_model.enabled = true;
        let analyzer = BiasAnalyzer::from_config(&config).unwrap();

        let verdict = analyzer
            .analyze_article("It will never be finished in time for the event.")
            .await
            .unwrap();
        assert!(verdict.highlights.is_empty());
        assert_eq!(verdict.overall_bias, OverallBias::Neutral);
        assert_eq!(verdict.confidence_score, 0.95);
    }

    #[tokio::test]
    async fn test_empty_text() {
        let analyzer = BiasAnalyzer::from_config(&AnalyzerConfig::default()).unwrap();
        assert!(analyzer.analyze_sentences("").await.unwrap().is_empty());

        let verdict = analyzer.analyze_article("   ").await.unwrap();
        assert_eq!(verdict.overall_bias, OverallBias::Neutral);
        assert_eq!(verdict.confidence_score, 1.0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = AnalyzerConfig::default();
        config.attribution.permutations = 0;
        assert!(BiasAnalyzer::from_config(&config).is_err());
    }

    #[test]
    fn test_injected_model_still_validates_config() {
        let mut config = AnalyzerConfig::default();
        config.attribution.exact_max_words = 64;

        let model: Arc<dyn Classifier> = Arc::new(LexiconBiasClassifier::new().unwrap());
        let result = BiasAnalyzer::with_model(model.clone(), &config);
        assert!(matches!(result, Err(biaslab_core::Error::Config(_))));

        let adapter = Arc::new(
            BiasClassifierAdapter::from_settings(model, &config.classifier).unwrap(),
        );
        assert!(matches!(
            SentencePipeline::from_config(adapter, &config),
            Err(biaslab_core::Error::Config(_))
        ));
    }
}
