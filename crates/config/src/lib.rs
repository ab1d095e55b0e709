//! Configuration management for CodePilot
//!
//! Loads and saves the JSON config file and applies environment overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod paths;

pub use paths::{config_path, data_dir};

/// Environment variable that overrides `provider.api_key`
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Errors in the configuration layer
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Model service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: None,
            model: default_model(),
        }
    }
}

fn default_model() -> String {
    "gemini-2.0-flash-001".to_string()
}

/// Agent loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_working_dir")]
    pub working_dir: String,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            working_dir: default_working_dir(),
            max_iterations: default_max_iterations(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

fn default_working_dir() -> String {
    ".".to_string()
}

fn default_max_iterations() -> u32 {
    10
}

fn default_max_tokens() -> u32 {
    8192
}

fn default_temperature() -> f32 {
    0.7
}

/// Workspace tool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_max_file_chars")]
    pub max_file_chars: usize,
    #[serde(default = "default_exec_timeout_secs")]
    pub exec_timeout_secs: u64,
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    #[serde(default = "default_script_extension")]
    pub script_extension: String,
    #[serde(default = "default_script_language")]
    pub script_language: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            max_file_chars: default_max_file_chars(),
            exec_timeout_secs: default_exec_timeout_secs(),
            interpreter: default_interpreter(),
            script_extension: default_script_extension(),
            script_language: default_script_language(),
        }
    }
}

fn default_max_file_chars() -> usize {
    10_000
}

fn default_exec_timeout_secs() -> u64 {
    30
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_script_extension() -> String {
    "py".to_string()
}

fn default_script_language() -> String {
    "Python".to_string()
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Config {
    /// Load from the default location, then apply environment overrides
    pub async fn load() -> Result<Self> {
        let path = config_path();
        let mut config = Self::load_from(&path).await?;
        config.apply_env();
        Ok(config)
    }

    /// Load from a specific location
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        debug!("Reading config from {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save to the default location
    pub async fn save(&self) -> Result<()> {
        let path = config_path();
        self.save_to(&path).await
    }

    /// Save to a specific location
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        debug!("Writing config to {:?}", path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Override file values with environment variables
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                debug!("Using API key from {}", API_KEY_ENV);
                self.provider.api_key = key.trim().to_string();
            }
        }
    }

    /// Absolute working directory, with `~` expanded and relative paths
    /// resolved against the process working directory
    pub fn working_dir(&self) -> PathBuf {
        let raw = &self.agent.working_dir;
        let path = if let Some(rest) = raw.strip_prefix("~/") {
            match dirs::home_dir() {
                Some(home) => home.join(rest),
                None => PathBuf::from(raw),
            }
        } else if raw == "~" {
            dirs::home_dir().unwrap_or_else(|| PathBuf::from(raw))
        } else {
            PathBuf::from(raw)
        };

        if path.is_absolute() {
            path
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&path))
                .unwrap_or(path)
        }
    }

    /// Model service API key, if one is configured
    pub fn api_key(&self) -> Option<String> {
        let key = self.provider.api_key.trim();
        if key.is_empty() {
            None
        } else {
            Some(key.to_string())
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    pub fn api_base(&self) -> Option<String> {
        self.provider
            .api_base
            .clone()
            .filter(|base| !base.trim().is_empty())
    }

    pub fn default_model(&self) -> String {
        self.provider.model.clone()
    }
}

/// Write a default config file if none exists and return the loaded config
pub async fn init() -> Result<Config> {
    let config_path = config_path();

    if config_path.exists() {
        warn!("Config already exists at {:?}", config_path);
    } else {
        Config::default().save().await?;
        info!("Config written to {:?}", config_path);
    }

    Config::load().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_working_dir_absolute_is_kept() {
        let mut config = Config::default();
        config.agent.working_dir = "/srv/project".to_string();
        assert_eq!(config.working_dir(), PathBuf::from("/srv/project"));
    }

    #[test]
    fn test_working_dir_relative_is_made_absolute() {
        let mut config = Config::default();
        config.agent.working_dir = "calculator".to_string();
        let dir = config.working_dir();
        assert!(dir.is_absolute());
        assert!(dir.ends_with("calculator"));
    }

    #[test]
    fn test_working_dir_tilde() {
        let mut config = Config::default();
        config.agent.working_dir = "~/projects/demo".to_string();
        let home = dirs::home_dir().expect("home dir");
        assert_eq!(config.working_dir(), home.join("projects/demo"));
    }

    #[test]
    fn test_api_base_ignores_blank() {
        let mut config = Config::default();
        config.provider.api_base = Some("  ".to_string());
        assert!(config.api_base().is_none());

        config.provider.api_base = Some("http://localhost:8080".to_string());
        assert_eq!(config.api_base().as_deref(), Some("http://localhost:8080"));
    }
}
