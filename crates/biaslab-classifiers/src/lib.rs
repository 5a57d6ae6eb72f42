//! BiasLab Classifiers
//!
//! Explainable sentence-bias scoring for articles.
//!
//! The pipeline runs in stages:
//! - Segmentation: raw text to an ordered list of sentences
//! - Classification: batched P(biased) per sentence through a [`Classifier`]
//! - Attribution: perturbation-based word contributions against the same scorer
//! - Explanation: ranked, human-readable strings (or a five-word fallback)
//! - Aggregation: an article verdict with asymmetric confidence
//!
//! Models are injected behind the [`Classifier`] trait. A lexicon model is
//! always available; BERT checkpoints load through Candle with the
//! `ml-models` feature.

pub mod adapter;
pub mod aggregate;
pub mod analyzer;
pub mod attribution;
pub mod classifier;
pub mod config;
pub mod explanation;
pub mod fallback;
pub mod lexicon;
#[cfg(feature = "ml-models")]
pub mod model_loader;
pub mod pipeline;
pub mod segmenter;

pub use adapter::BiasClassifierAdapter;
pub use aggregate::ArticleAggregator;
pub use analyzer::BiasAnalyzer;
pub use attribution::{
    Attribution, AttributionEngine, AttributionOutcome, ScoringOracle, TokenAttribution,
};
pub use classifier::{Classifier, DocumentScore, DocumentScorer};
pub use config::{
    AnalyzerConfig, AttributionConfig, ClassifierSettings, DeviceSpec, DocumentModelConfig,
    ExplanationConfig, ModelSource, ModelSpec, PipelineSettings, SegmenterConfig,
};
pub use explanation::{ExplanationFormatter, ExplanationStyle};
pub use fallback::{FallbackExplanation, FallbackScorer};
pub use lexicon::LexiconBiasClassifier;
#[cfg(feature = "ml-models")]
pub use model_loader::BertBiasClassifier;
pub use pipeline::{SentenceAnalysis, SentencePipeline};
pub use segmenter::SentenceSegmenter;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::analyzer::BiasAnalyzer;
    pub use crate::classifier::{Classifier, DocumentScore, DocumentScorer};
    pub use crate::config::AnalyzerConfig;
    pub use crate::lexicon::LexiconBiasClassifier;
    pub use crate::pipeline::SentencePipeline;
}
