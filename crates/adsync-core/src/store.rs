//! Durable configuration store.
//!
//! A single YAML file holds the sheet target, column map, row cache, and the
//! per-platform credentials. It is read once at startup and overwritten as a
//! whole when a run or setup command finishes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::sheet::SheetSettings;
use crate::ConfigError;

fn default_api_version() -> String {
    "5.124".to_string()
}

fn default_currency_code() -> String {
    "USD".to_string()
}

/// Token credentials for the Network-Ads statistics API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAdsCredentials {
    pub ad_account_id: String,
    pub access_token: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

/// Session credentials for the Social-Graph-Ads graph API.
///
/// `access_token` and `session_id` are replaced when the platform reports an
/// expired token and a refresh succeeds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialGraphCredentials {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub authorize_params: BTreeMap<String, String>,
}

/// Extra request decoration for the Native-Mobile-Ads dashboard API.
/// Authentication itself comes from the cookie jar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeMobileSettings {
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencySettings {
    #[serde(default = "default_currency_code")]
    pub code: String,
}

impl Default for CurrencySettings {
    fn default() -> Self {
        Self {
            code: default_currency_code(),
        }
    }
}

/// Everything persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdsyncConfig {
    #[serde(default)]
    pub sheet: SheetSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_ads: Option<NetworkAdsCredentials>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_graph: Option<SocialGraphCredentials>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_mobile: Option<NativeMobileSettings>,
    #[serde(default)]
    pub currency: CurrencySettings,
}

/// Reads and writes [`AdsyncConfig`] at a fixed path.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the configuration; a missing file yields an empty configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be read or parsed,
    /// or if it stores a zero column or row number.
    pub fn load(&self) -> Result<AdsyncConfig, ConfigError> {
        if !self.path.exists() {
            tracing::info!(path = %self.path.display(), "no configuration file; starting empty");
            return Ok(AdsyncConfig::default());
        }

        let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileIo {
            path: self.path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(AdsyncConfig::default());
        }

        let config: AdsyncConfig =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::FileParse {
                path: self.path.display().to_string(),
                source: e,
            })?;
        config.sheet.validate().map_err(|e| match e {
            ConfigError::Validation(reason) => {
                ConfigError::Validation(format!("{}: {reason}", self.path.display()))
            }
            other => other,
        })?;
        tracing::debug!(path = %self.path.display(), "configuration loaded");
        Ok(config)
    }

    /// Overwrites the configuration file with `config`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if serialization or the write fails.
    pub fn save(&self, config: &AdsyncConfig) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(config).map_err(ConfigError::Serialize)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::FileWrite {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        std::fs::write(&self.path, yaml).map_err(|e| ConfigError::FileWrite {
            path: self.path.display().to_string(),
            source: e,
        })?;
        tracing::info!(path = %self.path.display(), "configuration saved");
        Ok(())
    }
}
