//! Map-Reduce generation over chunked input.
//!
//! The map stage issues one `generate` call per chunk, all concurrently, and
//! joins them with first-failure-cancels-all semantics: if any chunk call
//! fails, the outstanding calls are dropped (aborting their in-flight
//! requests) and the failure surfaces tagged with the chunk index. The engine
//! never proceeds to reduce with an incomplete map set, and never truncates -
//! a reduce input that still exceeds the context window fails fast instead.

use futures_util::future::try_join_all;
use thiserror::Error;

use quill_providers::{GenerateError, LlmClient};
use quill_types::{ChunkingPolicy, GenerationRequest, GenerationResult};

use crate::splitter::{Chunk, split};

/// Marker inserted between per-chunk results so the reduce model can
/// distinguish chunk provenance.
pub const CHUNK_JOIN_MARKER: &str = "\n\n---\n\n";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("map call for chunk {index} failed: {source}")]
    MapChunk {
        index: usize,
        #[source]
        source: GenerateError,
    },
    #[error("reduce call failed: {source}")]
    Reduce {
        #[source]
        source: GenerateError,
    },
    #[error("combined map output (~{estimated} tokens) exceeds the {limit}-token context window")]
    ContextOverflow { estimated: u32, limit: u32 },
}

/// Splits oversized input and recombines it through map and reduce calls.
#[derive(Debug, Clone)]
pub struct ChunkingEngine {
    client: LlmClient,
    policy: ChunkingPolicy,
}

impl ChunkingEngine {
    #[must_use]
    pub fn new(client: LlmClient, policy: ChunkingPolicy) -> Self {
        Self { client, policy }
    }

    #[must_use]
    pub fn client(&self) -> &LlmClient {
        &self.client
    }

    /// True iff the text estimates above the backend's context window scaled
    /// by the overflow threshold. The threshold sits below 100% to leave
    /// headroom for instructions, template text, and the output budget.
    #[must_use]
    pub fn needs_chunking(&self, text: &str) -> bool {
        let limit = f64::from(self.client.max_context_tokens());
        // Round rather than truncate: widening the f32 threshold must not
        // shift the boundary (0.7 of 100k is 70_000, not 69_999).
        let threshold = (limit * f64::from(self.policy.overflow_threshold)).round() as u32;
        self.client.estimate_tokens(text) > threshold
    }

    /// Splits `text` into chunks bounded by the policy's target, using the
    /// backend's own token estimator.
    #[must_use]
    pub fn split_chunks(&self, text: &str) -> Vec<Chunk> {
        split(text, self.policy.target_chunk_tokens, &|t| {
            self.client.estimate_tokens(t)
        })
    }

    /// Runs the full Map-Reduce pipeline over `text`.
    ///
    /// Map calls use `policy.map_model`; the single reduce call uses
    /// `policy.reduce_model` and its output is the final result.
    pub async fn map_reduce(
        &self,
        text: &str,
        map_instructions: &str,
        reduce_instructions: &str,
    ) -> Result<GenerationResult, EngineError> {
        let chunks = self.split_chunks(text);
        tracing::debug!(
            chunks = chunks.len(),
            map_model = %self.policy.map_model,
            "map stage starting"
        );

        let maps = chunks.iter().enumerate().map(|(index, chunk)| {
            let request = GenerationRequest::new(map_instructions, chunk.text.as_str())
                .with_model(self.policy.map_model.as_str());
            async move {
                self.client
                    .generate(&request)
                    .await
                    .map_err(|source| EngineError::MapChunk { index, source })
            }
        });
        let summaries = try_join_all(maps).await?;

        // Reassembly is strictly original-index order regardless of which
        // call finished first.
        let joined = summaries
            .iter()
            .map(|summary| summary.text.as_str())
            .collect::<Vec<_>>()
            .join(CHUNK_JOIN_MARKER);

        let estimated = self.client.estimate_tokens(&joined);
        let limit = self.client.max_context_tokens();
        if estimated > limit {
            return Err(EngineError::ContextOverflow { estimated, limit });
        }

        tracing::debug!(reduce_model = %self.policy.reduce_model, "reduce stage starting");
        let request = GenerationRequest::new(reduce_instructions, joined)
            .with_model(self.policy.reduce_model.as_str());
        self.client
            .generate(&request)
            .await
            .map_err(|source| EngineError::Reduce { source })
    }
}
