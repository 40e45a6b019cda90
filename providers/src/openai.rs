//! OpenAI API client using the Responses API (non-streaming).
//!
//! Communicates with `{base}/v1/responses`. The system prompt maps to the
//! `instructions` field and conversation turns to the `input` array.

use serde::Deserialize;
use serde_json::json;

use quill_types::{GenerationRequest, GenerationResult, ProviderProfile, TokenUsage};

use crate::estimator::TokenEstimator;
use crate::retry::RetryConfig;
use crate::{GenerateError, OPENAI_API_BASE_URL, build_http_client, send_classified};

const PROVIDER: &str = "openai";

const ESTIMATOR: TokenEstimator = TokenEstimator::Bpe;

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    profile: ProviderProfile,
    api_key: String,
    retry: RetryConfig,
}

impl OpenAiClient {
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
            .unwrap_or(OPENAI_API_BASE_URL);
        format!("{}/v1/responses", base.trim_end_matches('/'))
    }

    fn request_body(&self, request: &GenerationRequest) -> serde_json::Value {
        let model = request.model().unwrap_or(&self.profile.default_model);
        let mut input: Vec<serde_json::Value> = request
            .history()
            .iter()
            .map(|(role, text)| json!({ "role": role.as_str(), "content": text }))
            .collect();
        input.push(json!({ "role": "user", "content": request.user() }));

        json!({
            "model": model,
            "stream": false,
            "max_output_tokens": request.max_output_tokens(),
            "temperature": request.temperature(),
            "instructions": request.system(),
            "input": input,
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
                    .bearer_auth(&self.api_key)
                    .json(&body)
            },
            &self.retry,
        )
        .await?;

        let parsed: ResponsesResponse = response.json().await.map_err(|e| {
            tracing::warn!(provider = PROVIDER, %e, "failed to decode response body");
            GenerateError::EmptyResponse { provider: PROVIDER }
        })?;

        // Response format:
        // { "output": [{ "type": "message", "content": [{ "type": "output_text", "text": "..." }] }] }
        let text: String = parsed
            .output
            .iter()
            .filter(|item| item.kind == "message")
            .flat_map(|item| item.content.iter())
            .filter(|block| block.kind == "output_text")
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
struct ResponsesResponse {
    #[serde(default)]
    output: Vec<OutputItem>,
    model: String,
    #[serde(default)]
    usage: ResponseUsage,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    content: Vec<OutputBlock>,
}

#[derive(Debug, Deserialize)]
struct OutputBlock {
    #[serde(rename = "type", default)]
    kind: String,
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
