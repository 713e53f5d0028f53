//! Thread payload types.
//!
//! A `ThreadPayload` is one unit of content to submit to a target surface.
//! It is created either by a content extractor (scraped) or by a compose
//! surface (user-authored) and is immutable once enqueued into a run.

use serde::{Deserialize, Serialize};

/// Separator used when rendering paragraphs into a single text body.
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// One paragraph of a thread, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    pub text: String,
    /// Whether the paragraph carries content the adapter must reproduce
    /// specially (mentions, links, emoji sequences).
    #[serde(default)]
    pub has_special_content: bool,
}

impl Paragraph {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            has_special_content: false,
        }
    }
}

/// A single thread queued for posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadPayload {
    /// Stable identifier used for de-duplication and UI reconciliation.
    pub id: String,
    /// Full rendered text.
    pub text: String,
    /// Ordered paragraph structure. Never reordered.
    pub paragraphs: Vec<Paragraph>,
}

impl ThreadPayload {
    /// Build a payload from paragraphs, rendering `text` by joining them.
    pub fn from_paragraphs(id: impl Into<String>, paragraphs: Vec<Paragraph>) -> Self {
        let text = paragraphs
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(PARAGRAPH_SEPARATOR);
        Self {
            id: id.into(),
            text,
            paragraphs,
        }
    }

    /// Short preview of the text for logs and tables.
    pub fn preview(&self, max_chars: usize) -> String {
        let first_line = self.text.lines().next().unwrap_or_default();
        if first_line.chars().count() > max_chars {
            let truncated: String = first_line.chars().take(max_chars).collect();
            format!("{truncated}...")
        } else {
            first_line.to_string()
        }
    }
}
