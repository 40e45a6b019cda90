//! Source aggregation: merges multiple labeled text sources into one tagged
//! document.
//!
//! Extraction itself is external - documents, web pages, and papers each come
//! from a [`TextExtractor`] collaborator supplied by the caller. The
//! aggregator runs all extractions concurrently, wraps each result in a
//! delimiter line carrying its ordinal position and locator, and concatenates
//! them in input order. A single failing source is recorded and skipped; only
//! zero successes fail the aggregation.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use thiserror::Error;

use quill_types::{MergedDocument, PageRange, SourceFailure, SourceItem, SourceKind};

/// Token estimate for merged text: ~4 chars/token for English, ~2 for CJK;
/// 3 is the conservative middle ground.
const CHARS_PER_TOKEN: usize = 3;

/// A failed extraction of one source.
#[derive(Debug, Error)]
#[error("failed to extract '{locator}': {message}")]
pub struct ExtractError {
    pub locator: String,
    pub message: String,
}

impl ExtractError {
    #[must_use]
    pub fn new(locator: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            message: message.into(),
        }
    }
}

/// External collaborator that turns a locator into raw text.
///
/// One implementation per [`SourceKind`]: a document extractor, a web
/// fetcher, and a paper-metadata fetcher.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(
        &self,
        locator: &str,
        page_range: Option<PageRange>,
    ) -> Result<String, ExtractError>;
}

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("all {attempted} sources failed extraction")]
    NoSourcesAvailable {
        attempted: usize,
        failures: Vec<SourceFailure>,
    },
}

/// Merges an ordered list of sources into one [`MergedDocument`].
#[derive(Clone)]
pub struct SourceAggregator {
    document: Arc<dyn TextExtractor>,
    web: Arc<dyn TextExtractor>,
    paper: Arc<dyn TextExtractor>,
}

impl SourceAggregator {
    #[must_use]
    pub fn new(
        document: Arc<dyn TextExtractor>,
        web: Arc<dyn TextExtractor>,
        paper: Arc<dyn TextExtractor>,
    ) -> Self {
        Self {
            document,
            web,
            paper,
        }
    }

    fn extractor_for(&self, kind: SourceKind) -> &dyn TextExtractor {
        match kind {
            SourceKind::Document => self.document.as_ref(),
            SourceKind::WebPage => self.web.as_ref(),
            SourceKind::Paper => self.paper.as_ref(),
        }
    }

    /// Extracts every source concurrently and merges the successes.
    ///
    /// Failures are recorded in the result's `skipped` list and logged; the
    /// whole aggregation only fails with
    /// [`AggregateError::NoSourcesAvailable`] when nothing succeeded
    /// (including an empty input list).
    pub async fn aggregate(&self, sources: &[SourceItem]) -> Result<MergedDocument, AggregateError> {
        let extractions = sources.iter().map(|source| {
            let extractor = self.extractor_for(source.kind);
            async move { extractor.extract(&source.locator, source.page_range).await }
        });
        let results = join_all(extractions).await;

        let mut parts: Vec<String> = Vec::new();
        let mut included: Vec<SourceItem> = Vec::new();
        let mut skipped: Vec<SourceFailure> = Vec::new();

        for (index, (source, result)) in sources.iter().zip(results).enumerate() {
            let ordinal = index + 1;
            match result {
                Ok(text) => {
                    parts.push(format!("=== {} ===\n{text}", source.delimiter_label(ordinal)));
                    included.push(source.clone());
                }
                Err(e) => {
                    tracing::warn!(
                        ordinal,
                        locator = %source.locator,
                        error = %e,
                        "source extraction failed; omitting source"
                    );
                    skipped.push(SourceFailure {
                        ordinal,
                        locator: source.locator.clone(),
                        reason: e.message,
                    });
                }
            }
        }

        if parts.is_empty() {
            return Err(AggregateError::NoSourcesAvailable {
                attempted: sources.len(),
                failures: skipped,
            });
        }

        let combined_text = parts.join("\n\n");
        let estimated_token_count = (combined_text.chars().count() / CHARS_PER_TOKEN) as u32;

        Ok(MergedDocument {
            combined_text,
            source_list: included,
            estimated_token_count,
            skipped,
        })
    }
}
