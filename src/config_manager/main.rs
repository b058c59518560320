use std::path::{Path, PathBuf};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config_manager::utils::read_config_text;
use crate::config_manager::{CoachConfig, LlmConfig, SystemConfig};

/// Main configuration for the application
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "system_config")]
    #[serde(default)]
    pub system_config: SystemConfig,

    #[serde(rename = "llm_config")]
    #[serde(default)]
    pub llm_config: LlmConfig,

    #[serde(rename = "coach_config")]
    #[serde(default)]
    pub coach_config: CoachConfig,
}

impl Config {
    /// Load configuration from a YAML or JSON file
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with(path, |name| std::env::var(name).ok())
    }

    pub fn load_with<F>(path: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let content = read_config_text(path, lookup)?;

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let config = if is_json {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };
        Ok(config)
    }

    /// Locate a config file, falling back to defaults, then apply the
    /// environment overrides.
    pub fn from_environment() -> Result<Self> {
        let lookup = |name: &str| std::env::var(name).ok();

        let mut config = match Self::candidate_paths(lookup("CONFIG_PATH"))
            .into_iter()
            .find(|p| p.exists())
        {
            Some(path) => {
                let config = Self::load(&path)?;
                info!("Loaded configuration from: {}", path.display());
                config
            }
            None => {
                info!("No configuration file found, using defaults");
                Self::default()
            }
        };

        config.apply_env_overrides(lookup)?;
        Ok(config)
    }

    fn candidate_paths(explicit: Option<String>) -> Vec<PathBuf> {
        let paths: Vec<PathBuf> = vec![
            explicit.map(PathBuf::from),
            Some(PathBuf::from("conf.yaml")),
            Some(PathBuf::from("conf.yml")),
            Some(PathBuf::from("conf.json")),
        ]
        .into_iter()
        .flatten()
        .collect();

        debug!("Config search paths: {:?}", paths);
        paths
    }

    /// `GEMINI_API_KEY`, `PORT` and `FRONTEND_DOMAINS` win over file values.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("GEMINI_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.llm_config.api_key = Some(key);
        }

        if let Some(port) = lookup("PORT") {
            self.system_config.port = port
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid PORT '{}': {}", port, e))?;
        }

        if let Some(domains) = lookup("FRONTEND_DOMAINS") {
            self.system_config.allowed_origins = SystemConfig::parse_origins(&domains);
        }

        Ok(())
    }
}
