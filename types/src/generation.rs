//! Request/response types exchanged with LLM backends.

use serde::{Deserialize, Serialize};

/// Speaker role for a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4096;

/// A single generation call against a backend.
///
/// Constructed once and never mutated afterwards; the `with_*` methods are
/// consumed during construction.
///
/// ```rust
/// use quill_types::GenerationRequest;
///
/// let request = GenerationRequest::new("You are a writer.", "Write about Rust.")
///     .with_model("claude-sonnet-4-6")
///     .with_temperature(0.3);
/// assert_eq!(request.model(), Some("claude-sonnet-4-6"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    system: String,
    user: String,
    #[serde(default)]
    history: Vec<(Role, String)>,
    #[serde(default)]
    model: Option<String>,
    temperature: f32,
    max_output_tokens: u32,
}

impl GenerationRequest {
    #[must_use]
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            history: Vec::new(),
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }

    /// Overrides the backend's default model. `None` keeps the default.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn with_optional_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Prior conversation turns, oldest first, sent ahead of the user prompt.
    #[must_use]
    pub fn with_history(mut self, history: Vec<(Role, String)>) -> Self {
        self.history = history;
        self
    }

    /// Sampling temperature, clamped to `[0.0, 1.0]`.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 1.0);
        self
    }

    /// Output budget for the call. Zero is coerced to one token.
    #[must_use]
    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens.max(1);
        self
    }

    #[must_use]
    pub fn system(&self) -> &str {
        &self.system
    }

    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    #[must_use]
    pub fn history(&self) -> &[(Role, String)] {
        &self.history
    }

    #[must_use]
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    #[must_use]
    pub const fn temperature(&self) -> f32 {
        self.temperature
    }

    #[must_use]
    pub const fn max_output_tokens(&self) -> u32 {
        self.max_output_tokens
    }
}

/// Token consumption reported by a backend for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    #[must_use]
    pub const fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }
}

/// The outcome of a successful generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub text: String,
    pub model: String,
    pub usage: TokenUsage,
}
