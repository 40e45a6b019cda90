//! LLM provider clients with a unified capability surface.
//!
//! # Architecture
//!
//! The crate is organized around a provider dispatch pattern:
//!
//! - [`LlmClient`] - one variant per concrete backend, selected by a
//!   string-keyed factory ([`LlmClient::from_settings`])
//! - [`claude`] - Anthropic Claude API client (Messages API)
//! - [`openai`] - OpenAI API client (Responses API)
//! - [`ollama`] - Ollama REST API client (`/api/chat`)
//!
//! Every backend exposes the same surface: `name`, `max_context_tokens`,
//! `available_models`, `estimate_tokens`, and a non-streaming `generate`.
//! One network call per `generate` invocation; no shared mutable state
//! crosses call boundaries, so a client can serve concurrent calls.
//!
//! # Error Handling
//!
//! All failures are classified into [`GenerateError`]:
//!
//! | Error | Retried |
//! |-------|---------|
//! | `RateLimited` | yes, full backoff budget |
//! | `BackendUnavailable` | yes, smaller backoff budget |
//! | `AuthenticationFailed` | never |
//! | `EmptyResponse` | never |
//!
//! Transient errors are retried inside this crate (see [`retry`]); what a
//! caller observes is either success or a fully classified error.

pub mod claude;
pub mod estimator;
pub mod ollama;
pub mod openai;
pub mod retry;

use std::time::Duration;

use thiserror::Error;

use quill_config::{ConfigError, Settings};
use quill_types::{GenerationRequest, GenerationResult, ModelSpec, ProviderProfile};

pub use estimator::TokenEstimator;
pub use retry::RetryConfig;

/// Canonical Anthropic Messages API base URL.
pub const CLAUDE_API_BASE_URL: &str = "https://api.anthropic.com";
/// Canonical OpenAI Responses API base URL.
pub const OPENAI_API_BASE_URL: &str = "https://api.openai.com";
/// Default Ollama endpoint; normally overridden by the profile's `base_url`.
pub const OLLAMA_DEFAULT_BASE_URL: &str = "http://localhost:11434";

const CONNECT_TIMEOUT_SECS: u64 = 30;
const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_MAX_IDLE_PER_HOST: usize = 16;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// A failed generation call, classified per the retry policy.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("{provider} rate limit exceeded: {message}")]
    RateLimited {
        provider: &'static str,
        message: String,
    },
    #[error("{provider} authentication failed: {message}")]
    AuthenticationFailed {
        provider: &'static str,
        message: String,
    },
    #[error("{provider} backend unavailable: {message}")]
    BackendUnavailable {
        provider: &'static str,
        message: String,
    },
    #[error("{provider} returned an empty response")]
    EmptyResponse { provider: &'static str },
}

impl GenerateError {
    #[must_use]
    pub const fn provider(&self) -> &'static str {
        match self {
            Self::RateLimited { provider, .. }
            | Self::AuthenticationFailed { provider, .. }
            | Self::BackendUnavailable { provider, .. }
            | Self::EmptyResponse { provider } => provider,
        }
    }

    /// Whether the provider layer may retry this failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::BackendUnavailable { .. }
        )
    }
}

fn base_client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::none())
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
}

pub(crate) fn build_http_client(timeout_secs: u64) -> reqwest::Client {
    base_client_builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|e| {
            tracing::error!("failed to build tuned HTTP client: {e}; using minimal fallback");
            reqwest::Client::builder()
                .build()
                .expect("minimal HTTP client must build")
        })
}

pub(crate) async fn read_capped_error_body(response: reqwest::Response) -> String {
    let status = response.status();
    let body = match response.text().await {
        Ok(mut text) => {
            if text.len() > MAX_ERROR_BODY_BYTES {
                text.truncate(MAX_ERROR_BODY_BYTES);
                text.push_str("...(truncated)");
            }
            text
        }
        Err(e) => format!("<failed to read error body: {e}>"),
    };
    format!("HTTP {status}: {body}")
}

/// Drive a request through the retry loop and classify the outcome.
///
/// On success returns the raw response for backend-specific parsing; every
/// failure path becomes a [`GenerateError`].
pub(crate) async fn send_classified<F>(
    provider: &'static str,
    build_request: F,
    config: &RetryConfig,
) -> Result<reqwest::Response, GenerateError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    match retry::send_with_retry(build_request, config).await {
        retry::RetryOutcome::Success(response) => Ok(response),
        retry::RetryOutcome::HttpError(response) => {
            let status = response.status();
            let message = read_capped_error_body(response).await;
            Err(match status.as_u16() {
                401 | 403 => GenerateError::AuthenticationFailed { provider, message },
                429 => GenerateError::RateLimited { provider, message },
                _ => GenerateError::BackendUnavailable { provider, message },
            })
        }
        retry::RetryOutcome::ConnectionError { attempts, source } => {
            Err(GenerateError::BackendUnavailable {
                provider,
                message: format!("request failed after {attempts} attempts: {source}"),
            })
        }
        retry::RetryOutcome::NonRetryable(e) => Err(GenerateError::BackendUnavailable {
            provider,
            message: format!("request failed: {e}"),
        }),
    }
}

/// Backend family a provider key maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Claude,
    OpenAi,
    Ollama,
}

impl ProviderKind {
    /// Parses a configuration key into a backend family. Accepts the common
    /// aliases; anything else is an unknown provider.
    #[must_use]
    pub fn parse(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "claude" | "anthropic" => Some(Self::Claude),
            "openai" | "gpt" | "chatgpt" => Some(Self::OpenAi),
            "ollama" | "llama" => Some(Self::Ollama),
            _ => None,
        }
    }
}

/// A concrete text-generation backend.
///
/// One variant per backend; the profile fixes the context window, model
/// catalogue, endpoint, and timeout. Cloning is cheap (the underlying
/// `reqwest::Client` is reference-counted) and clones share connections.
#[derive(Debug, Clone)]
pub enum LlmClient {
    Claude(claude::ClaudeClient),
    OpenAi(openai::OpenAiClient),
    Ollama(ollama::OllamaClient),
}

impl LlmClient {
    /// Factory: selects the backend by the profile key and resolves its
    /// credentials. Unknown keys fail with [`ConfigError::UnknownProvider`].
    pub fn from_settings(settings: &Settings, key: &str) -> Result<Self, ConfigError> {
        let profile = settings.provider(key)?.clone();
        match ProviderKind::parse(key) {
            Some(ProviderKind::Claude) => {
                let api_key = settings.api_key(&profile)?;
                Ok(Self::Claude(claude::ClaudeClient::new(profile, api_key)))
            }
            Some(ProviderKind::OpenAi) => {
                let api_key = settings.api_key(&profile)?;
                Ok(Self::OpenAi(openai::OpenAiClient::new(profile, api_key)))
            }
            Some(ProviderKind::Ollama) => Ok(Self::Ollama(ollama::OllamaClient::new(profile))),
            None => Err(ConfigError::UnknownProvider(key.to_string())),
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Claude(_) => "claude",
            Self::OpenAi(_) => "openai",
            Self::Ollama(_) => "ollama",
        }
    }

    #[must_use]
    pub fn profile(&self) -> &ProviderProfile {
        match self {
            Self::Claude(c) => c.profile(),
            Self::OpenAi(c) => c.profile(),
            Self::Ollama(c) => c.profile(),
        }
    }

    #[must_use]
    pub fn max_context_tokens(&self) -> u32 {
        self.profile().max_context_tokens
    }

    #[must_use]
    pub fn available_models(&self) -> &[ModelSpec] {
        &self.profile().models
    }

    /// Approximate token count for `text` under this backend's estimator.
    #[must_use]
    pub fn estimate_tokens(&self, text: &str) -> u32 {
        match self {
            Self::Claude(c) => c.estimate_tokens(text),
            Self::OpenAi(c) => c.estimate_tokens(text),
            Self::Ollama(c) => c.estimate_tokens(text),
        }
    }

    /// One network call; transient failures retry internally.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, GenerateError> {
        match self {
            Self::Claude(c) => c.generate(request).await,
            Self::OpenAi(c) => c.generate(request).await,
            Self::Ollama(c) => c.generate(request).await,
        }
    }

    /// Replaces the retry policy; used by tests to avoid real backoff delays.
    #[must_use]
    pub fn with_retry(self, config: RetryConfig) -> Self {
        match self {
            Self::Claude(c) => Self::Claude(c.with_retry(config)),
            Self::OpenAi(c) => Self::OpenAi(c.with_retry(config)),
            Self::Ollama(c) => Self::Ollama(c.with_retry(config)),
        }
    }
}
