use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_CONFIG_PATH: &str = "HEARTSIGHT_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Tunables for retrieval, generation and chat sessions
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Chunks retrieved for an initial explanation
    pub explanation_top_k: usize,
    /// Chunks retrieved for each chat turn
    pub chat_top_k: usize,
    /// Recent turns kept per chat session
    pub history_window: usize,
    pub completion_timeout_secs: u64,
    pub search_timeout_secs: u64,
    pub max_tokens: u64,
    pub temperature: f64,
    /// JSON file holding the pre-chunked reference corpus
    pub corpus_path: PathBuf,
    /// Chunks shorter than this are treated as headers/metadata and dropped
    pub min_chunk_chars: usize,
    /// Upper bound on concurrently retained chat sessions
    pub max_sessions: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            explanation_top_k: 3,
            chat_top_k: 5,
            history_window: 4,
            completion_timeout_secs: 30,
            search_timeout_secs: 10,
            max_tokens: 400,
            temperature: 0.3,
            corpus_path: PathBuf::from("data/corpus.json"),
            min_chunk_chars: 50,
            max_sessions: 1000,
        }
    }
}

impl PipelineConfig {
    pub fn completion_timeout(&self) -> Duration {
        Duration::from_secs(self.completion_timeout_secs)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }
}

/// YAML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub port: u16,
    pub host: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            port: 8080,
            host: "127.0.0.1".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment and config file
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let config_path = std::env::var(ENV_CONFIG_PATH)
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let pipeline = Self::load_config_file(Path::new(&config_path))
            .map(|cf| cf.pipeline)
            .unwrap_or_default();

        Self {
            pipeline,
            port,
            host,
        }
    }

    /// Load configuration from YAML file
    fn load_config_file(path: &Path) -> Option<ConfigFile> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return None;
        }

        match fs::read_to_string(path) {
            Ok(contents) => {
                let contents = contents.trim();
                if contents.is_empty() {
                    tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
                    return Some(ConfigFile::default());
                }

                match serde_yaml::from_str(contents) {
                    Ok(config) => {
                        tracing::info!(path = %path.display(), "Loaded configuration from file");
                        Some(config)
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config file, using defaults"
                        );
                        None
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to read config file, using defaults"
                );
                None
            }
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
