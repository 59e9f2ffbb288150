use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::embedding::{DEFAULT_DIM, DEFAULT_SEED};
use crate::errors::GenerationErrorKind;
use crate::generation::DEFAULT_MAX_TOKENS;
use crate::prompt::DEFAULT_MAX_CONTEXT_CHARS;
use crate::retrieval::RetrievalConfig;
use crate::vectorstore::VectorProvider;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub vector: VectorConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub dim: usize,
    pub seed: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dim: DEFAULT_DIM,
            seed: DEFAULT_SEED,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorConfig {
    pub provider: VectorProvider,
    /// OpenSearch index name; ignored by the in-memory provider
    pub index: String,
    /// OpenSearch endpoint; required when `provider = "opensearch"`
    pub endpoint: Option<String>,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            provider: VectorProvider::Memory,
            index: "advisory-chunks".to_string(),
            endpoint: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Backend endpoint; `None` selects the stub adapter
    pub endpoint: Option<String>,
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
    /// Make the stub adapter fail every call with this kind, for drills
    /// against quota and credit exhaustion
    pub simulate_failure: Option<GenerationErrorKind>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: "granite-13b-chat".to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: 0.2,
            simulate_failure: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    pub max_context_chars: usize,
    pub language: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
            language: "auto".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Config::default();
            config.save()?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, toml_string).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;

        Ok(home.join(".agroadvisor").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::RetrievalProvider;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.retrieval.provider, RetrievalProvider::Keyword);
        assert_eq!(config.embedding.dim, DEFAULT_DIM);
        assert_eq!(config.vector.provider, VectorProvider::Memory);
        assert!(config.generation.endpoint.is_none());
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let mut config = Config::default();
        config.retrieval.provider = RetrievalProvider::Embedding;
        config.retrieval.freshness_enabled = true;
        config.generation.model = "granite-20b".to_string();

        let toml_string = toml::to_string(&config).unwrap();
        assert!(toml_string.contains("embedding"));
        assert!(toml_string.contains("granite-20b"));

        let deserialized: Config = toml::from_str(&toml_string).unwrap();
        assert_eq!(deserialized.retrieval.provider, RetrievalProvider::Embedding);
        assert!(deserialized.retrieval.freshness_enabled);
        assert_eq!(deserialized.generation.model, "granite-20b");
    }

    #[test]
    fn test_simulated_failure_parses_snake_case() {
        let config: Config = toml::from_str(
            "[generation]\nmodel = \"granite-13b-chat\"\nmax_tokens = 256\ntemperature = 0.2\nsimulate_failure = \"quota_exceeded\"\n",
        )
        .unwrap();
        assert_eq!(
            config.generation.simulate_failure,
            Some(GenerationErrorKind::QuotaExceeded)
        );
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str("[retrieval]\nprovider = \"keyword\"\nfreshness_enabled = true\nreranker_enabled = false\ndecay_lambda_per_day = 0.05\nauthority_boost = 0.1\ndefault_k = 4\n").unwrap();
        assert!(config.retrieval.freshness_enabled);
        assert_eq!(config.prompt.language, "auto");
        assert_eq!(config.generation.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn test_save_and_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.vector.index = "field-notes".to_string();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.vector.index, "field-notes");
    }
}
