//! End-to-end authoring pipeline.
//!
//! [`ContentPipeline`] is the single entry point callers use: it aggregates
//! sources, assembles template/style options, decides between a direct
//! generation call and the Map-Reduce path, and assembles the final
//! [`quill_types::AuthoringResult`]. The interactive revision flow goes
//! through [`ContentPipeline::get_feedback`].

mod interfaces;
mod orchestrator;
pub mod prompts;

pub use interfaces::{RenderedPrompt, StyleLibrary, TemplateStore, TemplateVars};
pub use orchestrator::{ContentPipeline, PipelineError, Stage};
