//! Source descriptors and the merged document produced from them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What kind of external material a [`SourceItem`] points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// A local document (PDF or similar), extracted by the document collaborator.
    Document,
    /// A web page fetched and cleaned by the web collaborator.
    WebPage,
    /// A paper identifier resolved to metadata + abstract by the paper collaborator.
    Paper,
}

impl SourceKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SourceKind::Document => "document",
            SourceKind::WebPage => "web_page",
            SourceKind::Paper => "paper",
        }
    }
}

/// An inclusive page span inside a document source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pages {}-{}", self.start, self.end)
    }
}

/// One input to the source aggregator. Owned by the caller; read once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceItem {
    pub kind: SourceKind,
    /// Path, URL, or paper id depending on `kind`.
    pub locator: String,
    #[serde(default)]
    pub page_range: Option<PageRange>,
    #[serde(default)]
    pub label: Option<String>,
}

impl SourceItem {
    #[must_use]
    pub fn new(kind: SourceKind, locator: impl Into<String>) -> Self {
        Self {
            kind,
            locator: locator.into(),
            page_range: None,
            label: None,
        }
    }

    #[must_use]
    pub fn with_page_range(mut self, start: u32, end: u32) -> Self {
        self.page_range = Some(PageRange { start, end });
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Delimiter label for this source at 1-based position `ordinal`.
    ///
    /// Falls back to the locator when no label was supplied; document page
    /// ranges are appended so the model can cite the span.
    #[must_use]
    pub fn delimiter_label(&self, ordinal: usize) -> String {
        if let Some(label) = &self.label {
            return format!("Source {ordinal}: {label}");
        }
        let mut label = format!("Source {ordinal}: {}", self.locator);
        if let Some(range) = self.page_range {
            label.push_str(&format!(" ({range})"));
        }
        label
    }
}

/// A source that failed extraction, recorded but not fatal on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    /// 1-based position of the source in the original input order.
    pub ordinal: usize,
    pub locator: String,
    pub reason: String,
}

/// All successfully extracted sources merged into one delimited document.
///
/// Built fresh per request and never mutated afterwards; the delimiter lines
/// preserve provenance for the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedDocument {
    pub combined_text: String,
    /// The sources that made it into `combined_text`, in input order.
    pub source_list: Vec<SourceItem>,
    pub estimated_token_count: u32,
    /// Sources omitted because their extraction failed.
    pub skipped: Vec<SourceFailure>,
}
