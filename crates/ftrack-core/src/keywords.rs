//! Keyword normalization and the relevance filter for non-primary channels.

use crate::types::RawItem;

/// Trim a user-supplied keyword. Returns `None` for blank input.
#[must_use]
pub fn normalize_keyword(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Uniqueness key for a keyword within a channel (trimmed, lowercased).
#[must_use]
pub fn keyword_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Whether `item` is relevant for the given keyword set.
///
/// An empty set (after dropping blank entries) passes everything. Otherwise
/// the item passes when any keyword appears, case-insensitively, as a
/// substring of the title or body.
#[must_use]
pub fn matches<S: AsRef<str>>(item: &RawItem, keywords: &[S]) -> bool {
    let needles: Vec<String> = keywords
        .iter()
        .map(|k| keyword_key(k.as_ref()))
        .filter(|k| !k.is_empty())
        .collect();

    if needles.is_empty() {
        return true;
    }

    let haystack = format!("{}\n{}", item.title, item.body).to_lowercase();
    needles.iter().any(|needle| haystack.contains(needle.as_str()))
}
