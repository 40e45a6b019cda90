//! Splits long text into token-bounded segments along semantic boundaries.
//!
//! Boundaries are tried in priority order: markdown headings, blank lines,
//! newlines, and finally raw character-width windows. Cuts always land at the
//! *start* of a boundary match, so every character of the input survives into
//! exactly one chunk: concatenating the returned chunks reproduces the
//! original text byte for byte.

use std::sync::OnceLock;

use regex::Regex;

/// A bounded contiguous segment of the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    /// Set when an indivisible unit exceeded the target on its own and was
    /// emitted verbatim rather than corrupted.
    pub oversized: bool,
}

impl Chunk {
    fn fitting(text: &str) -> Self {
        Self {
            text: text.to_string(),
            oversized: false,
        }
    }
}

fn heading_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\n#{1,3} ").expect("heading pattern is valid"))
}

// Boundary levels in priority order; level 3 is the character-window fallback.
const LEVEL_PARAGRAPH: usize = 1;
const LEVEL_LINE: usize = 2;
const LEVEL_CHARS: usize = 3;

/// Splits `text` into chunks whose estimated token count stays at or below
/// `target_tokens`, preferring semantic boundaries over raw cuts.
///
/// `estimate` is the owning backend's token estimator; it only needs to be
/// monotonic over prefixes for the cuts to converge.
pub fn split<F>(text: &str, target_tokens: u32, estimate: &F) -> Vec<Chunk>
where
    F: Fn(&str) -> u32,
{
    let mut chunks = Vec::new();
    split_segment(text, 0, target_tokens, estimate, &mut chunks);
    chunks.retain(|chunk| !chunk.text.is_empty());
    chunks
}

fn split_segment<F>(segment: &str, level: usize, target: u32, estimate: &F, out: &mut Vec<Chunk>)
where
    F: Fn(&str) -> u32,
{
    if estimate(segment) <= target {
        out.push(Chunk::fitting(segment));
        return;
    }
    if level >= LEVEL_CHARS {
        char_windows(segment, target, estimate, out);
        return;
    }

    let mut bounds = cut_positions(segment, level);
    bounds.push(segment.len());

    // Greedy packing: extend the current group part by part while it still
    // fits; a lone part that does not fit recurses to the next finer level.
    let mut group_start = 0usize;
    let mut group_end = 0usize;
    for bound in bounds {
        if bound <= group_end {
            continue;
        }
        if estimate(&segment[group_start..bound]) <= target {
            group_end = bound;
            continue;
        }
        if group_end > group_start {
            out.push(Chunk::fitting(&segment[group_start..group_end]));
            group_start = group_end;
            if estimate(&segment[group_start..bound]) <= target {
                group_end = bound;
                continue;
            }
        }
        split_segment(&segment[group_start..bound], level + 1, target, estimate, out);
        group_start = bound;
        group_end = bound;
    }
    if group_end > group_start {
        out.push(Chunk::fitting(&segment[group_start..group_end]));
    }
}

/// Byte offsets of boundary starts strictly inside `segment`, ascending.
fn cut_positions(segment: &str, level: usize) -> Vec<usize> {
    match level {
        0 => heading_pattern()
            .find_iter(segment)
            .map(|m| m.start())
            .filter(|&pos| pos > 0)
            .collect(),
        LEVEL_PARAGRAPH => segment
            .match_indices("\n\n")
            .map(|(pos, _)| pos)
            .filter(|&pos| pos > 0)
            .collect(),
        LEVEL_LINE => segment
            .match_indices('\n')
            .map(|(pos, _)| pos)
            .filter(|&pos| pos > 0)
            .collect(),
        _ => Vec::new(),
    }
}

/// Last-resort fallback for a segment with no usable boundary: cut at the
/// largest character-boundary prefix that still fits the target.
fn char_windows<F>(segment: &str, target: u32, estimate: &F, out: &mut Vec<Chunk>)
where
    F: Fn(&str) -> u32,
{
    let mut rest = segment;
    while estimate(rest) > target {
        let pos = fitting_prefix(rest, target, estimate);
        if pos == 0 {
            // A single character above the target cannot be divided further.
            let width = rest.chars().next().map_or(rest.len(), char::len_utf8);
            out.push(Chunk {
                text: rest[..width].to_string(),
                oversized: true,
            });
            rest = &rest[width..];
            continue;
        }
        out.push(Chunk::fitting(&rest[..pos]));
        rest = &rest[pos..];
    }
    if !rest.is_empty() {
        out.push(Chunk::fitting(rest));
    }
}

/// Binary search for the longest prefix (ending on a char boundary) whose
/// estimate stays within `target`. Returns 0 when not even one char fits.
fn fitting_prefix<F>(text: &str, target: u32, estimate: &F) -> usize
where
    F: Fn(&str) -> u32,
{
    let ends: Vec<usize> = text
        .char_indices()
        .skip(1)
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();

    let mut lo = 0usize;
    let mut hi = ends.len();
    while lo < hi {
        let mid = (lo + hi) / 2;
        if estimate(&text[..ends[mid]]) <= target {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    if lo == 0 { 0 } else { ends[lo - 1] }
}

#[cfg(test)]
mod tests {
    use super::{Chunk, split};

    /// ~4 chars per token, rounding up - mirrors the Ollama estimator.
    fn estimate(text: &str) -> u32 {
        (text.chars().count().div_ceil(4)) as u32
    }

    fn reassemble(chunks: &[Chunk]) -> String {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = split("Short text", 100, &estimate);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Short text");
        assert!(!chunks[0].oversized);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(split("", 10, &estimate).is_empty());
    }

    #[test]
    fn concatenation_reproduces_input_exactly() {
        let text = (0..200)
            .map(|i| format!("word{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = split(&text, 25, &estimate);
        assert!(chunks.len() >= 2);
        assert_eq!(reassemble(&chunks), text);
    }

    #[test]
    fn every_chunk_fits_the_target() {
        let text = "A long paragraph here. ".repeat(40) + "\n\n" + &"Another one. ".repeat(40);
        let target = 25;
        for chunk in split(&text, target, &estimate) {
            assert!(
                estimate(&chunk.text) <= target,
                "chunk of {} tokens exceeds target {target}",
                estimate(&chunk.text)
            );
        }
    }

    #[test]
    fn splits_at_paragraph_boundary() {
        let text = format!("{}\n\n{}", "A".repeat(300), "B".repeat(300));
        let chunks = split(&text, 100, &estimate);

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.ends_with('A'));
        assert!(chunks[1].text.starts_with("\n\n"));
        assert_eq!(reassemble(&chunks), text);
    }

    #[test]
    fn splits_at_heading_boundary() {
        let section1 = "Content A. ".repeat(30);
        let text = format!("{section1}\n## Section 2\n{}", "Content B. ".repeat(30));
        let chunks = split(&text, 100, &estimate);

        assert!(chunks.len() >= 2);
        assert!(chunks.iter().skip(1).any(|c| c.text.starts_with("\n## ")));
        assert_eq!(reassemble(&chunks), text);
    }

    #[test]
    fn unbroken_line_falls_back_to_char_windows() {
        let text = "x".repeat(1000); // no boundary of any kind
        let target = 50; // 200 chars per window
        let chunks = split(&text, target, &estimate);

        assert!(chunks.len() >= 5);
        for chunk in &chunks {
            assert!(estimate(&chunk.text) <= target);
            assert!(!chunk.oversized);
        }
        assert_eq!(reassemble(&chunks), text);
    }

    #[test]
    fn char_windows_respect_utf8_boundaries() {
        let text = "té".repeat(300);
        let chunks = split(&text, 20, &estimate);
        assert_eq!(reassemble(&chunks), text);
        for chunk in &chunks {
            assert!(estimate(&chunk.text) <= 20);
        }
    }

    #[test]
    fn mixed_structure_prefers_coarser_boundaries() {
        let text = format!(
            "# Title\nintro text here\n\n{}\n# Next\n{}",
            "body. ".repeat(50),
            "tail. ".repeat(50)
        );
        let chunks = split(&text, 60, &estimate);
        assert_eq!(reassemble(&chunks), text);
        for chunk in &chunks {
            assert!(estimate(&chunk.text) <= 60);
        }
    }
}
