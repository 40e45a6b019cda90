//! Approximate per-backend token counting.
//!
//! Counts are **approximate**: the `o200k_base` encoding is accurate for
//! OpenAI models and a reasonable approximation for Claude (proprietary
//! tokenizer, counts may vary by ~5-10%); Ollama-served models fall back to a
//! chars-per-token heuristic. The chunking threshold's headroom absorbs the
//! inaccuracy. What matters for the threshold decision is that an estimator
//! is monotonic over prefixes and consistent within one backend, which both
//! variants are.
//!
//! The estimator is a small standalone value so a more accurate counter can
//! be substituted per backend without touching the Map-Reduce engine.

use std::sync::OnceLock;
use tiktoken_rs::{CoreBPE, o200k_base};

/// The tiktoken encoder is expensive to initialize (loads vocabulary data),
/// so it is created once and shared across all estimators.
static ENCODER: OnceLock<Option<CoreBPE>> = OnceLock::new();

fn get_encoder() -> Option<&'static CoreBPE> {
    ENCODER.get_or_init(|| o200k_base().ok()).as_ref()
}

/// How a backend estimates token counts.
#[derive(Debug, Clone, Copy)]
pub enum TokenEstimator {
    /// tiktoken `o200k_base` byte-pair encoding; falls back to byte length
    /// if the encoder fails to initialize.
    Bpe,
    /// `ceil(chars / n)` heuristic for backends without a known tokenizer.
    CharsPerToken(u32),
}

impl TokenEstimator {
    #[must_use]
    pub fn estimate(&self, text: &str) -> u32 {
        let count = match self {
            TokenEstimator::Bpe => match get_encoder() {
                Some(encoder) => encoder.encode_ordinary(text).len(),
                None => {
                    tracing::error!(
                        "failed to initialize tiktoken o200k_base encoder; \
                         falling back to byte-length estimates"
                    );
                    text.len()
                }
            },
            TokenEstimator::CharsPerToken(n) => {
                let n = (*n).max(1) as usize;
                text.chars().count().div_ceil(n)
            }
        };

        u32::try_from(count).unwrap_or(u32::MAX)
    }
}
