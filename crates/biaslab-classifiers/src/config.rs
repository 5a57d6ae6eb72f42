//! Configuration for the bias analyzer and model loading

use crate::explanation::ExplanationStyle;
use biaslab_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Largest sentence (in words) attributed by exact enumeration
pub const MAX_EXACT_WORDS: usize = 16;

/// Configuration for the whole analyzer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Sentence splitting
    pub segmenter: SegmenterConfig,

    /// Batching and truncation in front of the model
    pub classifier: ClassifierSettings,

    /// Perturbation attribution
    pub attribution: AttributionConfig,

    /// Explanation rendering
    pub explanation: ExplanationConfig,

    /// Sentence filtering
    pub pipeline: PipelineSettings,

    /// Sentence model
    pub model: ModelSpec,

    /// Optional whole-document model
    pub document_model: DocumentModelConfig,
}

/// Segmenter configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Additional abbreviations that never end a sentence
    pub extra_abbreviations: Vec<String>,
}

/// Classifier adapter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    /// Sentences per model call
    pub batch_size: usize,

    /// Whitespace words kept per sentence before scoring
    pub max_tokens: usize,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            batch_size: 8,
            max_tokens: 128,
        }
    }
}

/// Attribution engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributionConfig {
    /// Sentences with at most this many words use exact Shapley values
    pub exact_max_words: usize,

    /// Sampled permutations for longer sentences
    pub permutations: usize,

    /// RNG seed, reset for every sentence
    pub seed: u64,

    /// Replacement for masked words; `None` drops them
    pub mask_token: Option<String>,

    /// Per-sentence budget in milliseconds
    pub timeout_ms: u64,

    /// Sentences attributed concurrently
    pub concurrency: usize,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            exact_max_words: 8,
            permutations: 12,
            seed: 42,
            mask_token: None,
            timeout_ms: 10_000,
            concurrency: 2,
        }
    }
}

/// Explanation formatter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplanationConfig {
    /// Tokens listed per explanation
    pub top_k: usize,

    /// Minimum |attribution| for the directional style
    pub threshold: f64,

    /// Output style
    pub style: ExplanationStyle,
}

impl Default for ExplanationConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            threshold: 0.05,
            style: ExplanationStyle::default(),
        }
    }
}

/// Sentence pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Sentences scoring strictly above this are reported
    pub highlight_threshold: f64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            highlight_threshold: 0.3,
        }
    }
}

/// Whole-document model configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentModelConfig {
    /// Use the lexicon document scorer when no sentence is reported
    pub enabled: bool,
}

/// Sentence model specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModelSpec {
    /// Builtin loaded-language lexicon
    Lexicon {
        /// Additional terms and their weights (0.0-1.0)
        #[serde(default)]
        extra_terms: HashMap<String, f64>,
    },

    /// BERT sequence classifier in safetensors format
    Bert {
        /// Where the weights live
        source: ModelSource,

        /// Device to run on
        #[serde(default)]
        device: DeviceSpec,

        /// Output index holding the "biased" label
        #[serde(default = "default_biased_label_index")]
        biased_label_index: usize,

        /// Download cache for Hub models
        #[serde(default)]
        cache_dir: Option<PathBuf>,
    },
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self::Lexicon {
            extra_terms: HashMap::new(),
        }
    }
}

/// Model weights location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelSource {
    /// Local directory with config.json, model.safetensors and a tokenizer
    Local { path: PathBuf },

    /// Hugging Face Hub repository
    HuggingFace {
        repo_id: String,
        #[serde(default)]
        revision: Option<String>,
    },
}

/// Device specification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSpec {
    #[default]
    Cpu,
    Cuda,
    Metal,
}

fn default_biased_label_index() -> usize {
    1
}

impl AnalyzerConfig {
    /// Load from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("Failed to parse analyzer config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.classifier.batch_size == 0 {
            return Err(Error::config("classifier.batch_size must be at least 1"));
        }
        if self.classifier.max_tokens == 0 {
            return Err(Error::config("classifier.max_tokens must be at least 1"));
        }
        if self.attribution.exact_max_words > MAX_EXACT_WORDS {
            return Err(Error::config(format!(
                "attribution.exact_max_words must be at most {MAX_EXACT_WORDS}"
            )));
        }
        if self.attribution.permutations == 0 {
            return Err(Error::config("attribution.permutations must be at least 1"));
        }
        if self.attribution.concurrency == 0 {
            return Err(Error::config("attribution.concurrency must be at least 1"));
        }
        if self.attribution.timeout_ms == 0 {
            return Err(Error::config("attribution.timeout_ms must be positive"));
        }
        if self.explanation.top_k == 0 {
            return Err(Error::config("explanation.top_k must be at least 1"));
        }
        if !self.explanation.threshold.is_finite() || self.explanation.threshold < 0.0 {
            return Err(Error::config("explanation.threshold must be a non-negative number"));
        }
        if !(0.0..=1.0).contains(&self.pipeline.highlight_threshold) {
            return Err(Error::config(
                "pipeline.highlight_threshold must be within [0, 1]",
            ));
        }
        if let ModelSpec::Lexicon { extra_terms } = &self.model {
            if let Some((term, _)) = extra_terms
                .iter()
                .find(|(_, weight)| !(0.0..=1.0).contains(*weight))
            {
                return Err(Error::config(format!(
                    "lexicon weight for '{term}' must be within [0, 1]"
                )));
            }
        }
        Ok(())
    }
}
