//! BERT sequence classifier loaded with Candle
//!
//! Expects a Hugging Face style checkpoint directory containing
//! `config.json`, `model.safetensors` and either `tokenizer.json` or
//! `vocab.txt`. P(biased) is the softmax probability of the configured label
//! index (1 by default).

use crate::classifier::Classifier;
use crate::config::{ClassifierSettings, DeviceSpec, ModelSource, ModelSpec};
use async_trait::async_trait;
use biaslab_core::{Error, Result};
use candle_core::{DType, Device, IndexOp, Tensor, D};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use hf_hub::api::sync::ApiBuilder;
use hf_hub::{Repo, RepoType};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tracing::{debug, info};

/// Upper bound on BERT position embeddings
const MAX_POSITIONS: usize = 512;

/// Label metadata read from `config.json` next to the BERT settings
#[derive(Debug, Default, Deserialize)]
struct HeadConfig {
    #[serde(default)]
    id2label: Option<HashMap<String, String>>,
    #[serde(default)]
    num_labels: Option<usize>,
}

impl HeadConfig {
    fn num_labels(&self) -> usize {
        self.id2label
            .as_ref()
            .map(|labels| labels.len())
            .or(self.num_labels)
            .unwrap_or(2)
    }
}

/// BERT backbone, optional pooler and linear classification head.
///
/// Inference runs on the blocking pool so a caller's timeout can abandon a
/// slow batch instead of stalling the async worker.
pub struct BertBiasClassifier {
    name: String,
    weights: Arc<BertWeights>,
}

struct BertWeights {
    tokenizer: Tokenizer,
    model: BertModel,
    pooler: Option<Linear>,
    classifier: Linear,
    device: Device,
    biased_index: usize,
}

impl BertBiasClassifier {
    /// Load the model described by a `bert` model spec
    pub fn from_spec(spec: &ModelSpec, settings: &ClassifierSettings) -> Result<Self> {
        let ModelSpec::Bert {
            source,
            device,
            biased_label_index,
            cache_dir,
        } = spec
        else {
            return Err(Error::config("model spec is not a BERT model"));
        };

        let model_dir = resolve_model_dir(source, cache_dir.as_deref())?;
        let name = match source {
            ModelSource::Local { path } => path.display().to_string(),
            ModelSource::HuggingFace { repo_id, .. } => repo_id.clone(),
        };

        Self::load(
            name,
            &model_dir,
            *device,
            *biased_label_index,
            settings.max_tokens,
        )
    }

    /// Load from a checkpoint directory
    pub fn load(
        name: impl Into<String>,
        model_dir: &Path,
        device: DeviceSpec,
        biased_index: usize,
        max_tokens: usize,
    ) -> Result<Self> {
        let name = name.into();
        let device = get_device(device)?;

        let config_path = model_dir.join("config.json");
        let bert_config: BertConfig = parse_json_config(&config_path)?;
        let head_config: HeadConfig = parse_json_config(&config_path)?;
        let num_labels = head_config.num_labels();

        if biased_index >= num_labels {
            return Err(Error::config(format!(
                "biased label index {biased_index} is out of range for {num_labels} labels"
            )));
        }

        let vb = load_var_builder(model_dir, &device)?;
        let model = load_bert_backbone(&vb, &bert_config)?;
        let pooler = load_pooler(&vb, bert_config.hidden_size);
        let classifier = load_classification_head(&vb, bert_config.hidden_size, num_labels)?;
        let tokenizer = load_tokenizer(model_dir, max_tokens.min(MAX_POSITIONS))?;

        info!(
            model = %name,
            num_labels,
            biased_index,
            pooler = pooler.is_some(),
            "Loaded BERT bias classifier"
        );

        Ok(Self {
            name,
            weights: Arc::new(BertWeights {
                tokenizer,
                model,
                pooler,
                classifier,
                device,
                biased_index,
            }),
        })
    }
}

impl BertWeights {
    fn forward(&self, texts: &[String]) -> Result<Vec<f64>> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| Error::classifier(format!("Tokenization failed: {e}")))?;

        let mut ids = Vec::with_capacity(encodings.len());
        let mut type_ids = Vec::with_capacity(encodings.len());
        let mut masks = Vec::with_capacity(encodings.len());
        for encoding in &encodings {
            ids.push(Tensor::new(encoding.get_ids(), &self.device).map_err(candle_err("input ids"))?);
            type_ids.push(
                Tensor::new(encoding.get_type_ids(), &self.device)
                    .map_err(candle_err("token type ids"))?,
            );
            masks.push(
                Tensor::new(encoding.get_attention_mask(), &self.device)
                    .map_err(candle_err("attention mask"))?,
            );
        }

        let ids = Tensor::stack(&ids, 0).map_err(candle_err("stack input ids"))?;
        let type_ids = Tensor::stack(&type_ids, 0).map_err(candle_err("stack token type ids"))?;
        let mask = Tensor::stack(&masks, 0).map_err(candle_err("stack attention mask"))?;

        let hidden = self
            .model
            .forward(&ids, &type_ids, Some(&mask))
            .map_err(candle_err("forward pass"))?;

        // [CLS] embedding per row: (batch, hidden)
        let mut pooled = hidden.i((.., 0)).map_err(candle_err("CLS token"))?;
        if let Some(pooler) = &self.pooler {
            pooled = pooler
                .forward(&pooled)
                .and_then(|t| t.tanh())
                .map_err(candle_err("pooler"))?;
        }

        let logits = self
            .classifier
            .forward(&pooled)
            .map_err(candle_err("classification head"))?;
        let probabilities = candle_nn::ops::softmax(&logits, D::Minus1)
            .map_err(candle_err("softmax"))?
            .i((.., self.biased_index))
            .map_err(candle_err("select biased label"))?
            .to_dtype(DType::F32)
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(candle_err("read probabilities"))?;

        debug!(batch = texts.len(), "BERT batch scored");

        Ok(probabilities.into_iter().map(f64::from).collect())
    }
}

#[async_trait]
impl Classifier for BertBiasClassifier {
    async fn predict_batch(&self, texts: &[String]) -> Result<Vec<f64>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let weights = Arc::clone(&self.weights);
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || weights.forward(&texts))
            .await
            .map_err(|e| Error::classifier(format!("{}: inference task failed: {e}", self.name)))?
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn candle_err(context: &'static str) -> impl Fn(candle_core::Error) -> Error {
    move |e| Error::classifier(format!("{context} failed: {e}"))
}

fn get_device(device: DeviceSpec) -> Result<Device> {
    match device {
        DeviceSpec::Cpu => Ok(Device::Cpu),
        DeviceSpec::Cuda => Device::new_cuda(0)
            .map_err(|e| Error::classifier(format!("Failed to initialize CUDA: {e}"))),
        DeviceSpec::Metal => Device::new_metal(0)
            .map_err(|e| Error::classifier(format!("Failed to initialize Metal: {e}"))),
    }
}

/// Local directory as-is; Hub repositories are downloaded into the cache
fn resolve_model_dir(source: &ModelSource, cache_dir: Option<&Path>) -> Result<PathBuf> {
    match source {
        ModelSource::Local { path } => {
            if !path.is_dir() {
                return Err(Error::config(format!(
                    "Model directory not found: {}",
                    path.display()
                )));
            }
            Ok(path.clone())
        }
        ModelSource::HuggingFace { repo_id, revision } => {
            let cache_dir = cache_dir.map(Path::to_path_buf).unwrap_or_else(default_cache_dir);
            let api = ApiBuilder::new()
                .with_cache_dir(cache_dir)
                .build()
                .map_err(|e| Error::config(format!("Failed to initialize HF API: {e}")))?;

            let repo = api.repo(Repo::with_revision(
                repo_id.clone(),
                RepoType::Model,
                revision.clone().unwrap_or_else(|| "main".to_string()),
            ));

            let download = |file: &str| {
                repo.get(file).map_err(|e| {
                    Error::config(format!("Failed to download {file} from {repo_id}: {e}"))
                })
            };

            let config_path = download("config.json")?;
            download("model.safetensors")?;
            if download("tokenizer.json").is_err() {
                download("vocab.txt")?;
            }

            info!(repo = %repo_id, "Downloaded model from Hugging Face Hub");

            config_path
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| Error::internal("Downloaded file has no parent directory"))
        }
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("biaslab")
        .join("models")
}

fn parse_json_config<T: serde::de::DeserializeOwned>(config_path: &Path) -> Result<T> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        Error::classifier(format!(
            "Failed to read config {}: {e}",
            config_path.display()
        ))
    })?;

    serde_json::from_str(&config_str).map_err(|e| {
        Error::classifier(format!(
            "Failed to parse config {}: {e}",
            config_path.display()
        ))
    })
}

fn load_var_builder(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let weights_path = model_dir.join("model.safetensors");
    if !weights_path.exists() {
        return Err(Error::classifier(format!(
            "model.safetensors not found in {}",
            model_dir.display()
        )));
    }

    // SAFETY: the weights file is memory-mapped read-only and not modified while loaded
    let vb = unsafe {
        VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device)
            .map_err(|e| Error::classifier(format!("Failed to load weights: {e}")))?
    };

    Ok(vb)
}

fn load_bert_backbone(vb: &VarBuilder, config: &BertConfig) -> Result<BertModel> {
    let mut errors = Vec::new();

    for prefix in ["bert", ""] {
        let vb_prefix = if prefix.is_empty() {
            vb.clone()
        } else {
            vb.pp(prefix)
        };

        match BertModel::load(vb_prefix, config) {
            Ok(model) => {
                debug!(prefix = if prefix.is_empty() { "<root>" } else { prefix }, "Loaded BERT backbone");
                return Ok(model);
            }
            Err(e) => errors.push(format!(
                "{}: {e}",
                if prefix.is_empty() { "<root>" } else { prefix }
            )),
        }
    }

    Err(Error::classifier(format!(
        "Failed to load BERT backbone with tried prefixes [{}]",
        errors.join(" | ")
    )))
}

fn load_pooler(vb: &VarBuilder, hidden_size: usize) -> Option<Linear> {
    ["bert.pooler.dense", "pooler.dense"]
        .iter()
        .find_map(|prefix| candle_nn::linear(hidden_size, hidden_size, vb.pp(prefix)).ok())
}

/// A checkpoint without a trained head cannot score bias, so this never
/// falls back to random weights
fn load_classification_head(vb: &VarBuilder, hidden_size: usize, num_labels: usize) -> Result<Linear> {
    ["classifier", "score"]
        .iter()
        .find_map(|prefix| candle_nn::linear(hidden_size, num_labels, vb.pp(prefix)).ok())
        .ok_or_else(|| {
            Error::classifier(format!(
                "No classification head with {num_labels} labels found (tried classifier, score)"
            ))
        })
}

fn load_tokenizer(model_dir: &Path, max_length: usize) -> Result<Tokenizer> {
    let tokenizer_json_path = model_dir.join("tokenizer.json");
    let vocab_path = model_dir.join("vocab.txt");

    let mut tokenizer = if tokenizer_json_path.exists() {
        Tokenizer::from_file(&tokenizer_json_path)
            .map_err(|e| Error::classifier(format!("Failed to load tokenizer.json: {e}")))?
    } else if vocab_path.exists() {
        use tokenizers::models::wordpiece::WordPiece;
        use tokenizers::normalizers::BertNormalizer;
        use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
        use tokenizers::processors::bert::BertProcessing;

        let wordpiece = WordPiece::from_file(vocab_path.to_string_lossy().as_ref())
            .unk_token("[UNK]".to_string())
            .build()
            .map_err(|e| Error::classifier(format!("Failed to build WordPiece model: {e}")))?;

        let mut tokenizer = Tokenizer::new(wordpiece);
        tokenizer.with_normalizer(Some(BertNormalizer::default()));
        tokenizer.with_pre_tokenizer(Some(BertPreTokenizer));
        tokenizer.with_post_processor(Some(BertProcessing::new(
            ("[SEP]".to_string(), 102),
            ("[CLS]".to_string(), 101),
        )));
        tokenizer
    } else {
        return Err(Error::classifier(format!(
            "No tokenizer found in {} (tried tokenizer.json, vocab.txt)",
            model_dir.display()
        )));
    };

    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length,
            ..Default::default()
        }))
        .map_err(|e| Error::classifier(format!("Failed to configure truncation: {e}")))?;

    let pad_id = tokenizer.token_to_id("[PAD]").unwrap_or(0);
    tokenizer.with_padding(Some(PaddingParams {
        strategy: PaddingStrategy::BatchLongest,
        pad_id,
        pad_token: "[PAD]".to_string(),
        ..Default::default()
    }));

    Ok(tokenizer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_config_label_count() {
        let config: HeadConfig =
            serde_json::from_str(r#"{"id2label": {"0": "neutral", "1": "biased"}}"#).unwrap();
        assert_eq!(config.num_labels(), 2);

        let config: HeadConfig = serde_json::from_str(r#"{"num_labels": 3}"#).unwrap();
        assert_eq!(config.num_labels(), 3);

        let config: HeadConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.num_labels(), 2);
    }

    #[test]
    fn test_cpu_device() {
        assert!(matches!(get_device(DeviceSpec::Cpu), Ok(Device::Cpu)));
    }

    #[test]
    fn test_missing_local_directory() {
        let source = ModelSource::Local {
            path: PathBuf::from("/nonexistent/bias-model"),
        };
        assert!(matches!(
            resolve_model_dir(&source, None),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_directory_without_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let result = BertBiasClassifier::load("empty", dir.path(), DeviceSpec::Cpu, 1, 128);
        assert!(matches!(result, Err(Error::Classifier(_))));
    }

    #[test]
    fn test_non_bert_spec_rejected() {
        let result = BertBiasClassifier::from_spec(&ModelSpec::default(), &ClassifierSettings::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
