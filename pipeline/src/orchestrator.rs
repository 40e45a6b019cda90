//! The authoring pipeline orchestrator.
//!
//! One run walks the states Idle → SourcesResolved → OptionsAssembled →
//! Generating → PostProcessed → Done; any sub-component failure transitions
//! straight to Failed, carrying the originating error and the stage it came
//! from. A terminal result is either a complete [`AuthoringResult`] or a
//! classified [`PipelineError`] - never a partially generated artifact.

use std::sync::Arc;

use thiserror::Error;

use quill_config::{ConfigError, Settings};
use quill_engine::{ChunkingEngine, EngineError};
use quill_providers::{GenerateError, LlmClient, RetryConfig};
use quill_sources::{AggregateError, SourceAggregator};
use quill_types::{
    AuthoringRequest, AuthoringResult, GenerationRequest, PostMetadata, WriteMode,
};

use crate::interfaces::{StyleLibrary, TemplateStore, TemplateVars};
use crate::prompts::{MAP_PROMPT, REDUCE_PROMPT, SYSTEM_PROMPT_AUTO, SYSTEM_PROMPT_FEEDBACK};

/// Pipeline stage in which a failure originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ResolvingSources,
    AssemblingOptions,
    Generating,
}

impl Stage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Stage::ResolvingSources => "resolving sources",
            Stage::AssemblingOptions => "assembling options",
            Stage::Generating => "generating",
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("source aggregation failed: {0}")]
    Sources(#[from] AggregateError),
    #[error("generation failed: {0}")]
    Generation(#[from] GenerateError),
    #[error("map-reduce failed: {0}")]
    MapReduce(#[from] EngineError),
}

impl PipelineError {
    /// The stage the error originated from, for diagnostics.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Config(_) => Stage::AssemblingOptions,
            Self::Sources(_) => Stage::ResolvingSources,
            Self::Generation(_) | Self::MapReduce(_) => Stage::Generating,
        }
    }
}

/// End-to-end authoring pipeline: source aggregation, prompt assembly,
/// provider dispatch, chunking decisions, and result assembly.
pub struct ContentPipeline {
    settings: Arc<Settings>,
    aggregator: SourceAggregator,
    templates: Option<Arc<dyn TemplateStore>>,
    styles: Option<Arc<dyn StyleLibrary>>,
    retry: Option<RetryConfig>,
}

impl ContentPipeline {
    #[must_use]
    pub fn new(settings: Arc<Settings>, aggregator: SourceAggregator) -> Self {
        Self {
            settings,
            aggregator,
            templates: None,
            styles: None,
            retry: None,
        }
    }

    #[must_use]
    pub fn with_templates(mut self, templates: Arc<dyn TemplateStore>) -> Self {
        self.templates = Some(templates);
        self
    }

    #[must_use]
    pub fn with_styles(mut self, styles: Arc<dyn StyleLibrary>) -> Self {
        self.styles = Some(styles);
        self
    }

    /// Overrides the retry policy of every client the pipeline creates.
    #[must_use]
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    fn client_for(&self, request: &AuthoringRequest) -> Result<LlmClient, ConfigError> {
        let key = request
            .provider
            .as_deref()
            .unwrap_or(&self.settings.default_provider);
        let client = LlmClient::from_settings(&self.settings, key)?;
        Ok(match &self.retry {
            Some(retry) => client.with_retry(retry.clone()),
            None => client,
        })
    }

    /// Executes the full authoring pipeline for one request.
    pub async fn execute(&self, request: &AuthoringRequest) -> Result<AuthoringResult, PipelineError> {
        tracing::info!(mode = ?request.mode, sources = request.sources.len(), "pipeline starting");

        if request.mode == WriteMode::Direct {
            // No model involved; the draft is the artifact.
            return Ok(AuthoringResult {
                text: request.draft.clone().unwrap_or_default(),
                metadata: PostMetadata::from_request(request),
                usage: None,
            });
        }

        let client = self.client_for(request)?;

        // Idle → SourcesResolved
        let source_text = if request.sources.is_empty() {
            String::new()
        } else {
            let merged = self.aggregator.aggregate(&request.sources).await?;
            tracing::debug!(
                included = merged.source_list.len(),
                skipped = merged.skipped.len(),
                estimated_tokens = merged.estimated_token_count,
                "sources resolved"
            );
            merged.combined_text
        };

        // SourcesResolved → OptionsAssembled
        let (system_prompt, user_prompt) = self.assemble_options(request, &source_text);

        // OptionsAssembled → Generating
        let engine = ChunkingEngine::new(client, self.settings.chunking.clone());
        let result = if engine.needs_chunking(&user_prompt) {
            tracing::info!("input exceeds context threshold; taking the map-reduce path");
            engine
                .map_reduce(&user_prompt, MAP_PROMPT, REDUCE_PROMPT)
                .await?
        } else {
            let generation = GenerationRequest::new(system_prompt, user_prompt)
                .with_optional_model(request.model.clone());
            engine.client().generate(&generation).await?
        };

        // Generating → PostProcessed → Done
        let mut metadata = PostMetadata::from_request(request);
        metadata.model = Some(result.model.clone());
        Ok(AuthoringResult {
            text: result.text,
            metadata,
            usage: Some(result.usage),
        })
    }

    /// Pair-writing entry point: one direct feedback call on the draft, with
    /// no source resolution and no publishing side effects.
    pub async fn get_feedback(
        &self,
        request: &AuthoringRequest,
    ) -> Result<AuthoringResult, PipelineError> {
        let client = self.client_for(request)?;

        let mut system_prompt = SYSTEM_PROMPT_FEEDBACK.to_string();
        if let Some(template_id) = &request.template_id
            && let Some(store) = &self.templates
            && let Some(rendered) = store.render(template_id, &TemplateVars::default())
        {
            system_prompt.push_str("\n\n## Desired writing style\n\n");
            system_prompt.push_str(&rendered.system);
        }

        let draft = request.draft.as_deref().unwrap_or_default();
        let generation = GenerationRequest::new(
            system_prompt,
            format!("Please review the following draft and provide feedback:\n\n{draft}"),
        )
        .with_optional_model(request.model.clone());
        let result = client.generate(&generation).await?;

        let mut metadata = PostMetadata::from_request(request);
        metadata.model = Some(result.model.clone());
        Ok(AuthoringResult {
            text: result.text,
            metadata,
            usage: Some(result.usage),
        })
    }

    /// Resolves template and style references into the final prompt pair.
    ///
    /// With a template, sources travel through their own placeholder, so the
    /// composed content deliberately excludes them.
    fn assemble_options(&self, request: &AuthoringRequest, source_text: &str) -> (String, String) {
        if let Some(template_id) = &request.template_id
            && let Some(store) = &self.templates
        {
            let style_reference = request
                .style_reference_id
                .as_deref()
                .and_then(|id| self.styles.as_ref().and_then(|lib| lib.content(id)))
                .unwrap_or_default();
            let content = compose_user_prompt(request, "");
            let vars = TemplateVars {
                content: &content,
                sources: source_text,
                style_reference: &style_reference,
            };
            if let Some(rendered) = store.render(template_id, &vars) {
                return (rendered.system, rendered.user);
            }
            tracing::debug!(template_id, "template not resolved; using default prompts");
        }

        (
            SYSTEM_PROMPT_AUTO.to_string(),
            compose_user_prompt(request, source_text),
        )
    }
}

/// Builds the user prompt from source text, draft, and instructions.
fn compose_user_prompt(request: &AuthoringRequest, source_text: &str) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !source_text.is_empty() {
        parts.push(format!(
            "Use the following source material as reference:\n\n{source_text}"
        ));
    }
    if let Some(draft) = &request.draft
        && !draft.is_empty()
    {
        parts.push(format!("Draft:\n\n{draft}"));
    }
    if !request.prompt.is_empty() {
        parts.push(format!("Instructions: {}", request.prompt));
    } else if !request.title.is_empty() {
        parts.push(format!("Topic: {}", request.title));
    }

    if parts.is_empty() {
        request.title.clone()
    } else {
        parts.join("\n\n---\n\n")
    }
}
