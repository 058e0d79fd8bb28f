//! Configuration for the songcrew agent server
//!
//! A single TOML file with a section per concern. Every section and field
//! has a default, so an empty file (or no file at all) is a valid
//! configuration. API keys never live in the file; `[llm] api_key_env` names
//! the environment variable that holds it.

use crate::llm::provider::ModelSettings;
use crate::llm::providers::openai::OpenAiConfig;
use crate::tools::HttpPageFetcherConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Locations searched, in order, when no explicit path is given
pub const DEFAULT_CONFIG_PATHS: &[&str] = &["songcrew.toml", "config/songcrew.toml"];

/// Environment variables that override `[llm] model`, highest priority first
pub const MODEL_ENV_VARS: &[&str] = &["OPENAI_MODEL_NAME", "MODEL_NAME"];

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerSection,
    pub llm: LlmSection,
    pub pipeline: PipelineSection,
    pub fetch: FetchSection,
    pub evaluation: EvaluationSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmSection {
    /// Provider name; only "openai" is supported
    pub provider: String,
    pub model: String,
    /// Environment variable containing the API key
    pub api_key_env: String,
    pub base_url: String,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            temperature: Some(0.9),
            top_p: Some(0.9),
            max_tokens: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSection {
    /// Upper bound for a single step; 0 disables the limit
    pub step_timeout_secs: u64,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            step_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchSection {
    pub max_response_bytes: usize,
    pub timeout_secs: u64,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            max_response_bytes: 1024 * 1024,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EvaluationSection {
    /// Markdown file each evaluation is written to, if set
    pub persist_path: Option<PathBuf>,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ServiceConfig {
    /// Load configuration from a TOML file, then apply environment overrides
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: ServiceConfig = toml::from_str(&content)?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load from `explicit` if given, otherwise from the first default
    /// location that exists, otherwise fall back to defaults.
    ///
    /// An explicit path that does not exist is an error.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        if let Some(path) = explicit {
            return Ok((Self::load_from_file(path)?, Some(path.to_path_buf())));
        }

        for candidate in DEFAULT_CONFIG_PATHS {
            let path = Path::new(candidate);
            if path.is_file() {
                return Ok((Self::load_from_file(path)?, Some(path.to_path_buf())));
            }
        }

        let mut config = Self::default();
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok((config, None))
    }

    /// Apply environment overrides through `lookup` (pure given `lookup`)
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = MODEL_ENV_VARS
            .iter()
            .filter_map(|name| lookup(name))
            .find(|value| !value.trim().is_empty())
        {
            self.llm.model = model.trim().to_string();
        }
    }

    /// Check values that deserialize fine but cannot work
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.provider != "openai" {
            return Err(ConfigError::InvalidConfig(format!(
                "Unsupported LLM provider '{}' (expected \"openai\")",
                self.llm.provider
            )));
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "[llm] model must not be empty".to_string(),
            ));
        }
        if let Some(temperature) = self.llm.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::InvalidConfig(format!(
                    "[llm] temperature {temperature} is outside 0.0..=2.0"
                )));
            }
        }
        if let Some(top_p) = self.llm.top_p {
            if !(0.0..=1.0).contains(&top_p) {
                return Err(ConfigError::InvalidConfig(format!(
                    "[llm] top_p {top_p} is outside 0.0..=1.0"
                )));
            }
        }
        if self.fetch.max_response_bytes == 0 {
            return Err(ConfigError::InvalidConfig(
                "[fetch] max_response_bytes must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Get LLM API key from the configured environment variable
    pub fn get_llm_api_key(&self) -> Result<String, ConfigError> {
        std::env::var(&self.llm.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ConfigError::EnvVarNotFound(self.llm.api_key_env.clone()))
    }

    pub fn model_settings(&self) -> ModelSettings {
        ModelSettings {
            model: self.llm.model.clone(),
            temperature: self.llm.temperature,
            top_p: self.llm.top_p,
            max_tokens: self.llm.max_tokens,
        }
    }

    /// Provider settings; reads the API key from the environment
    pub fn openai_config(&self) -> Result<OpenAiConfig, ConfigError> {
        Ok(OpenAiConfig {
            api_key: self.get_llm_api_key()?,
            base_url: self.llm.base_url.clone(),
            timeout: Duration::from_secs(self.llm.timeout_secs),
            ..OpenAiConfig::default()
        })
    }

    pub fn fetcher_config(&self) -> HttpPageFetcherConfig {
        HttpPageFetcherConfig {
            timeout: Duration::from_secs(self.fetch.timeout_secs),
            max_response_bytes: self.fetch.max_response_bytes,
            ..HttpPageFetcherConfig::default()
        }
    }

    pub fn step_timeout(&self) -> Option<Duration> {
        match self.pipeline.step_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
