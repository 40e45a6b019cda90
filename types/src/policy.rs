//! Provider profiles and the chunking policy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rough capability tier of a model within a provider's catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Fast,
    Standard,
    Flagship,
}

/// One selectable model inside a [`ProviderProfile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub id: String,
    pub display_name: String,
    pub tier: ModelTier,
}

fn default_timeout_secs() -> u64 {
    120
}

/// Static description of one text-generation backend.
///
/// Loaded from configuration and queried, never mutated, by the core. The
/// `name` is the provider key the profile was registered under
/// (e.g. "claude").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderProfile {
    #[serde(default)]
    pub name: String,
    pub max_context_tokens: u32,
    #[serde(default)]
    pub models: Vec<ModelSpec>,
    pub default_model: String,
    /// Environment variable holding the API key, when the backend needs one.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Overrides the backend's canonical endpoint. Required for Ollama,
    /// optional elsewhere.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidProfile {
    #[error("provider '{0}' has max_context_tokens = 0")]
    ZeroContextWindow(String),
    #[error("provider '{0}' has an empty default_model")]
    EmptyDefaultModel(String),
}

impl ProviderProfile {
    pub fn validate(&self) -> Result<(), InvalidProfile> {
        if self.max_context_tokens == 0 {
            return Err(InvalidProfile::ZeroContextWindow(self.name.clone()));
        }
        if self.default_model.trim().is_empty() {
            return Err(InvalidProfile::EmptyDefaultModel(self.name.clone()));
        }
        Ok(())
    }

    /// Display name for a model id, falling back to the id itself.
    #[must_use]
    pub fn display_name<'a>(&'a self, model_id: &'a str) -> &'a str {
        self.models
            .iter()
            .find(|m| m.id == model_id)
            .map_or(model_id, |m| m.display_name.as_str())
    }
}

fn default_target_chunk_tokens() -> u32 {
    4000
}

fn default_overflow_threshold() -> f32 {
    0.7
}

/// How oversized inputs are split and which models run each stage.
///
/// The threshold is deliberately below 100% of the context window to leave
/// headroom for system instructions, template text, and the model's own
/// output budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkingPolicy {
    #[serde(default = "default_target_chunk_tokens")]
    pub target_chunk_tokens: u32,
    #[serde(default = "default_overflow_threshold")]
    pub overflow_threshold: f32,
    pub map_model: String,
    pub reduce_model: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidPolicy {
    #[error("target_chunk_tokens must be positive")]
    ZeroChunkTarget,
    #[error("overflow_threshold must be in (0, 1], got {0}")]
    ThresholdOutOfRange(f32),
}

impl ChunkingPolicy {
    pub fn validate(&self) -> Result<(), InvalidPolicy> {
        if self.target_chunk_tokens == 0 {
            return Err(InvalidPolicy::ZeroChunkTarget);
        }
        if !(self.overflow_threshold > 0.0 && self.overflow_threshold <= 1.0) {
            return Err(InvalidPolicy::ThresholdOutOfRange(self.overflow_threshold));
        }
        Ok(())
    }
}
