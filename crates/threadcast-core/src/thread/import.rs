//! Thread list import.
//!
//! Thread lists arrive as JSON, either a bare array or `{"threads": [...]}`.
//! Each entry carries `text`, `paragraphs`, or both; a missing `id` is
//! derived from a content hash so re-imports of the same thread collide.

use std::collections::HashSet;

use serde::Deserialize;
use thiserror::Error;
use threadcast_types::thread::{Paragraph, ThreadPayload};

use crate::service::hash::ContentHasher;

/// Number of hex characters kept from the content hash.
const CONTENT_ID_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("invalid thread file: {0}")]
    Parse(String),

    #[error("thread #{0} has neither text nor paragraphs")]
    EmptyEntry(usize),
}

#[derive(Debug, Deserialize)]
struct ThreadEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    paragraphs: Option<Vec<Paragraph>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ThreadFile {
    List(Vec<ThreadEntry>),
    Wrapped { threads: Vec<ThreadEntry> },
}

/// Parse a JSON thread list into payloads, in file order.
pub fn parse_threads(json: &str, hasher: &dyn ContentHasher) -> Result<Vec<ThreadPayload>, ImportError> {
    let file: ThreadFile =
        serde_json::from_str(json).map_err(|e| ImportError::Parse(e.to_string()))?;
    build_all(file, hasher)
}

/// Same as [`parse_threads`] for an already-decoded JSON document.
pub fn threads_from_value(
    value: serde_json::Value,
    hasher: &dyn ContentHasher,
) -> Result<Vec<ThreadPayload>, ImportError> {
    let file: ThreadFile =
        serde_json::from_value(value).map_err(|e| ImportError::Parse(e.to_string()))?;
    build_all(file, hasher)
}

fn build_all(file: ThreadFile, hasher: &dyn ContentHasher) -> Result<Vec<ThreadPayload>, ImportError> {
    let entries = match file {
        ThreadFile::List(entries) => entries,
        ThreadFile::Wrapped { threads } => threads,
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| build_payload(index, entry, hasher))
        .collect()
}

fn build_payload(
    index: usize,
    entry: ThreadEntry,
    hasher: &dyn ContentHasher,
) -> Result<ThreadPayload, ImportError> {
    let paragraphs = match (entry.paragraphs, entry.text.as_deref()) {
        (Some(paragraphs), _) if !paragraphs.is_empty() => paragraphs,
        (_, Some(text)) => split_paragraphs(text),
        _ => Vec::new(),
    };
    if paragraphs.is_empty() {
        return Err(ImportError::EmptyEntry(index));
    }

    let mut payload = ThreadPayload::from_paragraphs(String::new(), paragraphs);
    if let Some(text) = entry.text.filter(|t| !t.trim().is_empty()) {
        payload.text = text;
    }
    payload.id = match entry.id.filter(|id| !id.trim().is_empty()) {
        Some(id) => id,
        None => content_id(&payload.text, hasher),
    };
    Ok(payload)
}

/// Stable identifier derived from the thread text.
pub fn content_id(text: &str, hasher: &dyn ContentHasher) -> String {
    let hash = hasher.compute_hash(text.trim());
    hash.chars().take(CONTENT_ID_LEN).collect()
}

/// Split text into paragraphs on blank lines.
pub fn split_paragraphs(text: &str) -> Vec<Paragraph> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| Paragraph {
            text: chunk.to_string(),
            has_special_content: has_special_content(chunk),
        })
        .collect()
}

/// Mentions, hashtags and links need adapter-side handling to survive
/// re-typing.
fn has_special_content(text: &str) -> bool {
    text.contains("http://")
        || text.contains("https://")
        || text
            .split_whitespace()
            .any(|word| word.len() > 1 && (word.starts_with('@') || word.starts_with('#')))
}

/// Collapse payloads with repeated ids, keeping the first occurrence.
///
/// Returns the surviving payloads in input order and the number dropped.
pub fn dedupe(items: Vec<ThreadPayload>) -> (Vec<ThreadPayload>, usize) {
    let mut seen = HashSet::new();
    let before = items.len();
    let unique: Vec<ThreadPayload> = items
        .into_iter()
        .filter(|item| seen.insert(item.id.clone()))
        .collect();
    let dropped = before - unique.len();
    (unique, dropped)
}
