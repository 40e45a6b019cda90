//! Configuration loading and credential resolution.
//!
//! Settings are read once at startup from a TOML file and treated as
//! read-only process-wide state. Components receive the loaded [`Settings`]
//! at construction time rather than reaching for ambient globals, so tests
//! can run against synthetic configurations.
//!
//! API keys resolve in a fixed order: the profile's environment variable
//! first, then the `[api_keys]` table of the settings file, and finally a
//! hard [`ConfigError::MissingApiKey`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use quill_types::{ChunkingPolicy, InvalidPolicy, InvalidProfile, ProviderProfile};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("no provider configured under key '{0}'")]
    UnknownProvider(String),
    #[error(
        "no API key for provider '{provider}': set the {env} environment variable \
         or add it to the [api_keys] table"
    )]
    MissingApiKey { provider: String, env: String },
    #[error("invalid chunking policy: {0}")]
    InvalidPolicy(#[from] InvalidPolicy),
    #[error("invalid provider profile: {0}")]
    InvalidProfile(#[from] InvalidProfile),
}

fn default_provider_key() -> String {
    "claude".to_string()
}

/// Process-wide configuration: provider profiles, chunking defaults, and the
/// file-based credential fallback.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_provider_key")]
    pub default_provider: String,
    pub chunking: ChunkingPolicy,
    pub providers: BTreeMap<String, ProviderProfile>,
    /// File-based secret store, consulted after the environment.
    #[serde(default)]
    api_keys: BTreeMap<String, String>,
}

impl Settings {
    /// Default location: `<config dir>/quill/config.toml`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("quill").join("config.toml"))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml_str(&raw)?;
        tracing::info!(
            path = %path.display(),
            providers = settings.providers.len(),
            "loaded settings"
        );
        Ok(settings)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let mut settings: Settings = toml::from_str(raw)?;
        for (key, profile) in &mut settings.providers {
            profile.name = key.clone();
            profile.validate()?;
        }
        settings.chunking.validate()?;
        Ok(settings)
    }

    pub fn provider(&self, key: &str) -> Result<&ProviderProfile, ConfigError> {
        self.providers
            .get(key)
            .ok_or_else(|| ConfigError::UnknownProvider(key.to_string()))
    }

    /// Resolves the API key for a profile: environment first, then the
    /// `[api_keys]` table, then failure.
    pub fn api_key(&self, profile: &ProviderProfile) -> Result<String, ConfigError> {
        let env = profile.api_key_env.as_deref().unwrap_or_default();
        if !env.is_empty()
            && let Ok(value) = std::env::var(env)
            && !value.trim().is_empty()
        {
            return Ok(value);
        }
        if let Some(value) = self.api_keys.get(&profile.name)
            && !value.trim().is_empty()
        {
            return Ok(value.clone());
        }
        Err(ConfigError::MissingApiKey {
            provider: profile.name.clone(),
            env: env.to_string(),
        })
    }
}
