//! Anthropic Claude API client (Messages API, non-streaming).

use serde::Deserialize;
use serde_json::json;

use quill_types::{GenerationRequest, GenerationResult, ProviderProfile, TokenUsage};

use crate::estimator::TokenEstimator;
use crate::retry::RetryConfig;
use crate::{CLAUDE_API_BASE_URL, GenerateError, build_http_client, send_classified};

const PROVIDER: &str = "claude";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Claude uses a proprietary tokenizer; `o200k_base` is close enough for
/// threshold decisions.
const ESTIMATOR: TokenEstimator = TokenEstimator::Bpe;

#[derive(Debug, Clone)]
pub struct ClaudeClient {
    http: reqwest::Client,
    profile: ProviderProfile,
    api_key: String,
    retry: RetryConfig,
}

impl ClaudeClient {
    #[must_use]
    pub fn new(profile: ProviderProfile, api_key: String) -> Self {
        Self {
            http: build_http_client(profile.request_timeout_secs),
            profile,
            api_key,
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
            .unwrap_or(CLAUDE_API_BASE_URL);
        format!("{}/v1/messages", base.trim_end_matches('/'))
    }

    fn request_body(&self, request: &GenerationRequest) -> serde_json::Value {
        let model = request.model().unwrap_or(&self.profile.default_model);
        let mut messages: Vec<serde_json::Value> = request
            .history()
            .iter()
            .map(|(role, text)| json!({ "role": role.as_str(), "content": text }))
            .collect();
        messages.push(json!({ "role": "user", "content": request.user() }));

        json!({
            "model": model,
            "max_tokens": request.max_output_tokens(),
            "temperature": request.temperature(),
            "stream": false,
            "system": request.system(),
            "messages": messages,
        })
    }

    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, GenerateError> {
        let url = self.endpoint();
        let body = self.request_body(request);

        let response = send_classified(
            PROVIDER,
            || {
                self.http
                    .post(&url)
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .json(&body)
            },
            &self.retry,
        )
        .await?;

        let parsed: MessagesResponse = response.json().await.map_err(|e| {
            tracing::warn!(provider = PROVIDER, %e, "failed to decode response body");
            GenerateError::EmptyResponse { provider: PROVIDER }
        })?;

        let text: String = parsed
            .content
            .iter()
            .map(|block| block.text.as_str())
            .collect();
        if text.is_empty() {
            return Err(GenerateError::EmptyResponse { provider: PROVIDER });
        }

        Ok(GenerationResult {
            text,
            model: parsed.model,
            usage: TokenUsage::new(parsed.usage.input_tokens, parsed.usage.output_tokens),
        })
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    model: String,
    #[serde(default)]
    usage: ResponseUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}
