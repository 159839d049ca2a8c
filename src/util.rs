//! Shared utilities for the skillgen codebase

use sha2::{Digest, Sha256};

/// Find the largest byte index <= `index` that is a char boundary in `s`.
pub fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Lowercase `text` and collapse every run of non-alphanumeric characters into
/// a single `-`. Leading and trailing separators are dropped.
/// Returns an empty string when `text` has no alphanumeric characters.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_sep = false;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('-');
            }
            pending_sep = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    slug
}

/// Like [`slugify`] but capped at `max_len` bytes, never ending on a separator.
pub fn slugify_bounded(text: &str, max_len: usize) -> String {
    let slug = slugify(text);
    if slug.len() <= max_len {
        return slug;
    }
    let cut = floor_char_boundary(&slug, max_len);
    slug[..cut].trim_end_matches('-').to_string()
}

/// Hex-encoded SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Collapse all whitespace runs to single spaces and trim.
pub fn normalize_space(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
