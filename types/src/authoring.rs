//! Top-level authoring request and result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::generation::TokenUsage;
use crate::source::SourceItem;

/// How the artifact is authored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// The caller wrote the text; no model call is made.
    Direct,
    /// The caller's draft is revised or reviewed with model assistance.
    Pair,
    /// The artifact is generated entirely from sources and instructions.
    Auto,
}

/// Everything the pipeline needs for one authoring run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthoringRequest {
    pub mode: WriteMode,
    #[serde(default)]
    pub draft: Option<String>,
    #[serde(default)]
    pub sources: Vec<SourceItem>,
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub style_reference_id: Option<String>,
    /// Provider key; the configured default is used when absent.
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub title: String,
    /// Free-form instruction for the model; `title` is used when empty.
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub category_path: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl AuthoringRequest {
    #[must_use]
    pub fn new(mode: WriteMode) -> Self {
        Self {
            mode,
            draft: None,
            sources: Vec::new(),
            template_id: None,
            style_reference_id: None,
            provider: None,
            model: None,
            title: String::new(),
            prompt: String::new(),
            category_path: String::new(),
            tags: Vec::new(),
        }
    }
}

/// Post metadata handed to the publishing collaborator alongside the text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostMetadata {
    pub title: String,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    /// True when a human draft was revised with model assistance.
    pub llm_assisted: bool,
    /// True when the text was generated entirely by a model.
    pub llm_generated: bool,
    pub model: Option<String>,
    pub date: DateTime<Utc>,
}

impl PostMetadata {
    /// Derives the authorship/disclaimer flags from the request mode.
    #[must_use]
    pub fn from_request(request: &AuthoringRequest) -> Self {
        Self {
            title: request.title.clone(),
            categories: if request.category_path.is_empty() {
                Vec::new()
            } else {
                vec![request.category_path.clone()]
            },
            tags: request.tags.clone(),
            llm_assisted: request.mode == WriteMode::Pair,
            llm_generated: request.mode == WriteMode::Auto,
            model: request.model.clone(),
            date: Utc::now(),
        }
    }
}

/// The terminal artifact of an authoring run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthoringResult {
    pub text: String,
    pub metadata: PostMetadata,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}
