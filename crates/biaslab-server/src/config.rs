//! Server configuration
//!
//! Layered in order: built-in defaults, an optional YAML file, `BIASLAB__*`
//! environment variables (`BIASLAB__PORT=9000`,
//! `BIASLAB__ANALYZER__CLASSIFIER__BATCH_SIZE=16`), then CLI flags.

use biaslab_classifiers::AnalyzerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub listen: String,

    /// Listen port
    pub port: u16,

    /// Largest accepted request body in bytes
    pub max_upload_bytes: usize,

    /// Text analysis pipeline
    pub analyzer: AnalyzerConfig,

    /// Background video jobs
    pub jobs: JobsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0".to_string(),
            port: 8000,
            max_upload_bytes: 50 * 1024 * 1024,
            analyzer: AnalyzerConfig::default(),
            jobs: JobsConfig::default(),
        }
    }
}

/// Video job configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Per-job analysis budget in seconds
    pub timeout_secs: u64,

    /// Videos analysed at the same time
    pub max_concurrent: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            max_concurrent: 2,
        }
    }
}

impl JobsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ServerConfig {
    /// Load configuration from file and environment, then apply CLI overrides
    pub fn load(config_path: &str, cli: &crate::Cli) -> anyhow::Result<Self> {
        let mut config = Self::from_sources(config_path)?;

        if let Some(listen) = &cli.listen {
            config.listen = listen.clone();
        }
        if let Some(port) = cli.port {
            config.port = port;
        }

        config.analyzer.validate()?;
        Ok(config)
    }

    /// Defaults, then the file if it exists, then `BIASLAB__*` variables
    pub fn from_sources(config_path: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(Path::new(config_path)).required(false))
            .add_source(
                config::Environment::with_prefix("BIASLAB")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biaslab_classifiers::ExplanationStyle;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let config = ServerConfig::from_sources("/nonexistent/biaslab.yaml").unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.max_upload_bytes, 52_428_800);
        assert_eq!(config.jobs.timeout_secs, 300);
        assert_eq!(config.jobs.max_concurrent, 2);
        assert_eq!(config.analyzer, AnalyzerConfig::default());
    }

    #[test]
    fn test_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            r#"
port: 9100
jobs:
  timeout_secs: 30
analyzer:
  classifier:
    batch_size: 4
  explanation:
    style: directional
"#
        )
        .unwrap();

        let config = ServerConfig::from_sources(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.jobs.timeout(), Duration::from_secs(30));
        assert_eq!(config.jobs.max_concurrent, 2);
        assert_eq!(config.analyzer.classifier.batch_size, 4);
        assert_eq!(config.analyzer.classifier.max_tokens, 128);
        assert_eq!(config.analyzer.explanation.style, ExplanationStyle::Directional);
    }
}
