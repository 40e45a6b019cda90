//! Interfaces to external collaborators consumed by the orchestrator.
//!
//! Templates and style references live outside the core; the pipeline only
//! needs to render one and read the other. Both are optional: an unresolved
//! reference is treated as absent, never as an error.

/// Placeholder values available to a prompt template.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateVars<'a> {
    /// The composed user content (draft + instructions), without sources.
    pub content: &'a str,
    /// The merged source document, placed by the template's own section.
    pub sources: &'a str,
    /// Example text used to bias tone/structure.
    pub style_reference: &'a str,
}

/// A rendered system/user prompt pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
}

/// Prompt-template collaborator. Returns `None` for unknown template ids.
pub trait TemplateStore: Send + Sync {
    fn render(&self, template_id: &str, vars: &TemplateVars<'_>) -> Option<RenderedPrompt>;
}

/// Style-reference collaborator. Returns `None` for unknown reference ids.
pub trait StyleLibrary: Send + Sync {
    fn content(&self, reference_id: &str) -> Option<String>;
}
