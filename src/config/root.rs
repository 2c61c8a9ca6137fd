use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::{CorsConfig, ImageConfig, LogConfig};
use crate::executor::traits::AuthUser;

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration for a brandmatch process
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Headers added to every response envelope
    #[serde(default)]
    pub cors: CorsConfig,

    /// Image storage layout and public URL
    #[serde(default)]
    pub images: ImageConfig,

    #[serde(default)]
    pub log: LogConfig,

    /// Identities known to the in-memory identity provider
    #[serde(default)]
    pub users: Vec<AuthUser>,
}

impl AppConfig {
    /// Parse and validate a configuration document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = &self.images.public_base_url;
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "images.publicBaseUrl must be an http(s) URL, got '{}'",
                base
            )));
        }
        if self.cors.allow_origin.trim().is_empty() {
            return Err(ConfigError::Invalid("cors.allowOrigin must not be empty".to_string()));
        }
        if let Some(user) = self.users.iter().find(|u| u.id.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "user '{}' has an empty id",
                user.email
            )));
        }
        Ok(())
    }
}
