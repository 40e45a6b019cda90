//! Ollama REST API client (`/api/chat`, non-streaming).
//!
//! Ollama serves local models over plain HTTP, so the endpoint comes from the
//! profile's `base_url` and no API key is involved.

use serde::Deserialize;
use serde_json::json;

use quill_types::{GenerationRequest, GenerationResult, ProviderProfile, TokenUsage};

use crate::estimator::TokenEstimator;
use crate::retry::RetryConfig;
use crate::{GenerateError, OLLAMA_DEFAULT_BASE_URL, build_http_client, send_classified};

const PROVIDER: &str = "ollama";

/// No tokenizer is exposed for arbitrary local models; ~4 chars/token is the
/// usual English-text approximation.
const ESTIMATOR: TokenEstimator = TokenEstimator::CharsPerToken(4);

#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    profile: ProviderProfile,
    retry: RetryConfig,
}

impl OllamaClient {
    #[must_use]
    pub fn new(profile: ProviderProfile) -> Self {
        Self {
            http: build_http_client(profile.request_timeout_secs),
            profile,
            retry: RetryConfig::default(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    #[must_use]
    pub fn profile(&self) -> &ProviderProfile {
        &self.profile
    }

    #[must_use]
    pub fn estimate_tokens(&self, text: &str) -> u32 {
        ESTIMATOR.estimate(text)
    }

    fn endpoint(&self) -> String {
        let base = self
            .profile
            .base_url
            .as_deref()
            .unwrap_or(OLLAMA_DEFAULT_BASE_URL);
        format!("{}/api/chat", base.trim_end_matches('/'))
    }

    fn request_body(&self, request: &GenerationRequest) -> serde_json::Value {
        let model = request.model().unwrap_or(&self.profile.default_model);
        let mut messages = vec![json!({ "role": "system", "content": request.system() })];
        messages.extend(
            request
                .history()
                .iter()
                .map(|(role, text)| json!({ "role": role.as_str(), "content": text })),
        );
        messages.push(json!({ "role": "user", "content": request.user() }));

        json!({
            "model": model,
            "messages": messages,
            "stream": false,
            "options": {
                "temperature": request.temperature(),
                "num_predict": request.max_output_tokens(),
            },
        })
    }

    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, GenerateError> {
        let url = self.endpoint();
        let body = self.request_body(request);
        let model = request
            .model()
            .unwrap_or(&self.profile.default_model)
            .to_string();

        let response = send_classified(PROVIDER, || self.http.post(&url).json(&body), &self.retry)
            .await?;

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            tracing::warn!(provider = PROVIDER, %e, "failed to decode response body");
            GenerateError::EmptyResponse { provider: PROVIDER }
        })?;

        if parsed.message.content.is_empty() {
            return Err(GenerateError::EmptyResponse { provider: PROVIDER });
        }

        Ok(GenerationResult {
            text: parsed.message.content,
            model,
            usage: TokenUsage::new(parsed.prompt_eval_count, parsed.eval_count),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: ChatMessage,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

#[derive(Debug, Default, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}
