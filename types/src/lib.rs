//! Core domain types for Quill.
//!
//! This crate holds the data model shared by every other Quill crate: the
//! generation request/response pair exchanged with LLM backends, provider
//! profiles, the chunking policy, source descriptors, and the top-level
//! authoring request/result. It deliberately contains no IO and no async so
//! it can sit at the bottom of the dependency graph.

mod authoring;
mod generation;
mod policy;
mod source;

pub use authoring::{AuthoringRequest, AuthoringResult, PostMetadata, WriteMode};
pub use generation::{GenerationRequest, GenerationResult, Role, TokenUsage};
pub use policy::{ChunkingPolicy, InvalidPolicy, InvalidProfile, ModelSpec, ModelTier, ProviderProfile};
pub use source::{MergedDocument, PageRange, SourceFailure, SourceItem, SourceKind};
