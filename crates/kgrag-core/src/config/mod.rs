//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// kgrag configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub retrieval: RetrievalConfig,
    pub storage: StorageConfig,
}

/// Model server settings (text generation + embeddings)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub generation_model: String,
    pub embedding_model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

/// Retrieval limits and per-call timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Upper bound on file summaries added to a context
    pub max_file_count: usize,
    /// Node count used when the classifier falls back to defaults
    pub default_node_count: usize,
    pub classifier_timeout_secs: u64,
    pub embedding_timeout_secs: u64,
    pub graph_timeout_secs: u64,
    /// Run local and global retrieval concurrently
    pub concurrent_retrieval: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file backing the graph store
    pub database_path: PathBuf,
    /// JSON snapshot with node and summary embeddings
    pub index_path: PathBuf,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            generation_model: "llama3.2".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            temperature: 0.2,
            timeout_secs: 120,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_file_count: 1,
            default_node_count: 1,
            classifier_timeout_secs: 60,
            embedding_timeout_secs: 30,
            graph_timeout_secs: 10,
            concurrent_retrieval: true,
        }
    }
}

impl RetrievalConfig {
    pub fn classifier_timeout(&self) -> Duration {
        Duration::from_secs(self.classifier_timeout_secs)
    }

    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.embedding_timeout_secs)
    }

    pub fn graph_timeout(&self) -> Duration {
        Duration::from_secs(self.graph_timeout_secs)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: crate::storage::database::default_database_path(),
            index_path: PathBuf::from("indexes").join("indexed_embeddings.json"),
        }
    }
}

/// Keys accepted by `get` / `set`
const CONFIG_KEYS: &[&str] = &[
    "llm.base_url",
    "llm.generation_model",
    "llm.embedding_model",
    "llm.temperature",
    "llm.timeout_secs",
    "retrieval.max_file_count",
    "retrieval.default_node_count",
    "retrieval.classifier_timeout_secs",
    "retrieval.embedding_timeout_secs",
    "retrieval.graph_timeout_secs",
    "retrieval.concurrent_retrieval",
    "storage.database_path",
    "storage.index_path",
];

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("KGRAG_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("kgrag")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or fall back to defaults if it doesn't exist.
    ///
    /// Environment overrides are applied on top of whatever was loaded.
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        let mut config = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Config::default()
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Override selected values from `KGRAG_*` environment variables
    pub fn apply_env(&mut self) {
        if let Ok(url) = env::var("KGRAG_LLM_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Ok(path) = env::var("KGRAG_DATABASE_PATH") {
            self.storage.database_path = PathBuf::from(path);
        }
        if let Ok(path) = env::var("KGRAG_INDEX_PATH") {
            self.storage.index_path = PathBuf::from(path);
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.llm.base_url.trim().is_empty() {
            return Err(anyhow!("llm.base_url must not be empty"));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(anyhow!("Temperature must be between 0.0 and 2.0"));
        }
        if self.retrieval.default_node_count == 0 {
            return Err(anyhow!("retrieval.default_node_count must be at least 1"));
        }
        for (key, secs) in [
            ("llm.timeout_secs", self.llm.timeout_secs),
            ("retrieval.classifier_timeout_secs", self.retrieval.classifier_timeout_secs),
            ("retrieval.embedding_timeout_secs", self.retrieval.embedding_timeout_secs),
            ("retrieval.graph_timeout_secs", self.retrieval.graph_timeout_secs),
        ] {
            if secs == 0 {
                return Err(anyhow!("{} must be greater than zero", key));
            }
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "llm.base_url" => Ok(self.llm.base_url.clone()),
            "llm.generation_model" => Ok(self.llm.generation_model.clone()),
            "llm.embedding_model" => Ok(self.llm.embedding_model.clone()),
            "llm.temperature" => Ok(self.llm.temperature.to_string()),
            "llm.timeout_secs" => Ok(self.llm.timeout_secs.to_string()),

            "retrieval.max_file_count" => Ok(self.retrieval.max_file_count.to_string()),
            "retrieval.default_node_count" => Ok(self.retrieval.default_node_count.to_string()),
            "retrieval.classifier_timeout_secs" => {
                Ok(self.retrieval.classifier_timeout_secs.to_string())
            }
            "retrieval.embedding_timeout_secs" => {
                Ok(self.retrieval.embedding_timeout_secs.to_string())
            }
            "retrieval.graph_timeout_secs" => Ok(self.retrieval.graph_timeout_secs.to_string()),
            "retrieval.concurrent_retrieval" => {
                Ok(self.retrieval.concurrent_retrieval.to_string())
            }

            "storage.database_path" => Ok(self.storage.database_path.display().to_string()),
            "storage.index_path" => Ok(self.storage.index_path.display().to_string()),

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `kgrag config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "llm.base_url" => {
                if value.trim().is_empty() {
                    return Err(anyhow!("llm.base_url must not be empty"));
                }
                self.llm.base_url = value.trim_end_matches('/').to_string();
            }
            "llm.generation_model" => self.llm.generation_model = value.to_string(),
            "llm.embedding_model" => self.llm.embedding_model = value.to_string(),
            "llm.temperature" => {
                let temp: f32 = value
                    .parse()
                    .with_context(|| format!("Invalid temperature value: {}", value))?;
                if !(0.0..=2.0).contains(&temp) {
                    return Err(anyhow!("Temperature must be between 0.0 and 2.0"));
                }
                self.llm.temperature = temp;
            }
            "llm.timeout_secs" => self.llm.timeout_secs = parse_secs(key, value)?,

            "retrieval.max_file_count" => {
                self.retrieval.max_file_count = value
                    .parse()
                    .with_context(|| format!("Invalid max_file_count value: {}", value))?;
            }
            "retrieval.default_node_count" => {
                let count: usize = value
                    .parse()
                    .with_context(|| format!("Invalid default_node_count value: {}", value))?;
                if count == 0 {
                    return Err(anyhow!("retrieval.default_node_count must be at least 1"));
                }
                self.retrieval.default_node_count = count;
            }
            "retrieval.classifier_timeout_secs" => {
                self.retrieval.classifier_timeout_secs = parse_secs(key, value)?
            }
            "retrieval.embedding_timeout_secs" => {
                self.retrieval.embedding_timeout_secs = parse_secs(key, value)?
            }
            "retrieval.graph_timeout_secs" => {
                self.retrieval.graph_timeout_secs = parse_secs(key, value)?
            }
            "retrieval.concurrent_retrieval" => {
                self.retrieval.concurrent_retrieval = value
                    .parse()
                    .with_context(|| format!("Invalid boolean value: {}", value))?;
            }

            "storage.database_path" => self.storage.database_path = PathBuf::from(value),
            "storage.index_path" => self.storage.index_path = PathBuf::from(value),

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `kgrag config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        CONFIG_KEYS
            .iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}

fn parse_secs(key: &str, value: &str) -> anyhow::Result<u64> {
    let secs: u64 = value
        .parse()
        .with_context(|| format!("Invalid {} value: {}", key, value))?;
    if secs == 0 {
        return Err(anyhow!("{} must be greater than zero", key));
    }
    Ok(secs)
}
