//! Third-party book metadata: Google Books and data4library.
//!
//! Listing calls fail soft: a missing API key or any upstream error yields an
//! empty list and a warning. Single-item lookups return a descriptive error.

pub mod data4library;
pub mod google_books;

pub use data4library::{Data4Library, HoldingLibrary};
pub use google_books::{GoogleBooks, Volume};

use std::collections::HashSet;

/// Placeholder value shipped in sample env files.
const PLACEHOLDER_KEY: &str = "YOUR_API_KEY";

/// Keep a key only if it is set, non-blank and not the placeholder.
pub(crate) fn usable_key(key: Option<String>) -> Option<String> {
    key.map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty() && k != PLACEHOLDER_KEY)
}

/// Remove hyphens from an ISBN.
pub fn clean_isbn(isbn: &str) -> String {
    isbn.trim().chars().filter(|c| *c != '-').collect()
}

/// Drop later volumes whose title was already seen.
pub(crate) fn dedup_by_title(volumes: Vec<Volume>) -> Vec<Volume> {
    let mut seen = HashSet::new();
    volumes
        .into_iter()
        .filter(|v| seen.insert(v.title.clone()))
        .collect()
}
