//! Persistent configuration.
//!
//! Stores the Scopus API key, optional institutional token and default policies in
//! `<config dir>/scopusbib/config.json`. Command-line flags and environment variables take
//! precedence over the stored values.

use crate::error::{ScopusBibError, Result};
use crate::matcher::TitleMismatchPolicy;
use crate::reconcile::CitationIdPolicy;
use crate::scopus::{ClientOptions, DEFAULT_BASE_URL};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Default config file path: `<config dir>/scopusbib/config.json`
fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|p| p.join("scopusbib").join("config.json"))
        .ok_or_else(|| ScopusBibError::Config("Cannot determine config directory".to_string()))
}

/// Stored settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopusConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub inst_token: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub title_mismatch: TitleMismatchPolicy,
    #[serde(default)]
    pub citation_id: CitationIdPolicy,
}

/// Values given on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_key: Option<String>,
    pub inst_token: Option<String>,
    pub base_url: Option<String>,
}

impl ScopusConfig {
    /// Build client options, preferring `overrides` over stored values.
    pub fn client_options(&self, overrides: &Overrides) -> Result<ClientOptions> {
        let api_key = overrides
            .api_key
            .clone()
            .or_else(|| self.api_key.clone())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                ScopusBibError::Config(
                    "No Scopus API key. Pass --api-key, set SCOPUS_API_KEY or run `scopusbib config set-key`"
                        .to_string(),
                )
            })?;

        let base_url = overrides
            .base_url
            .clone()
            .or_else(|| self.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let parsed = url::Url::parse(&base_url)
            .map_err(|e| ScopusBibError::Config(format!("Invalid base URL {}: {}", base_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ScopusBibError::Config(format!(
                "Base URL must be http or https: {}",
                base_url
            )));
        }

        let mut options = ClientOptions::new(api_key);
        options.inst_token = overrides
            .inst_token
            .clone()
            .or_else(|| self.inst_token.clone())
            .filter(|t| !t.trim().is_empty());
        options.base_url = base_url;
        Ok(options)
    }
}

/// Loads and saves [`ScopusConfig`]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Create a new ConfigStore with default path
    pub fn new() -> Result<Self> {
        Ok(Self {
            path: default_config_path()?,
        })
    }

    /// Create a new ConfigStore with custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Get the config file path
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Load the config
    ///
    /// Returns defaults if the file doesn't exist or is invalid
    pub fn load(&self) -> ScopusConfig {
        if !self.path.exists() {
            debug!("Config file not found: {:?}", self.path);
            return ScopusConfig::default();
        }

        match std::fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str::<ScopusConfig>(&content) {
                Ok(config) => {
                    debug!("Loaded config from {:?}", self.path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config: {}", e);
                    ScopusConfig::default()
                }
            },
            Err(e) => {
                warn!("Failed to read config file: {}", e);
                ScopusConfig::default()
            }
        }
    }

    /// Save the config, creating the parent directory if needed
    pub fn save(&self, config: &ScopusConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(config)?;
        std::fs::write(&self.path, content)?;
        info!("Saved config to {:?}", self.path);
        Ok(())
    }

    /// Remove the stored config
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            info!("Cleared config at {:?}", self.path);
        }
        Ok(())
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| Self {
            path: PathBuf::from(".scopusbib.json"),
        })
    }
}
