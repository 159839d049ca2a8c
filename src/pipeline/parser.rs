//! `llms.txt` link index parsing.
//!
//! The format is a small markdown convention: one `# Title`, an optional
//! `> summary` blockquote, optional free text, then `## Section` headers with
//! bullet links of the form `- [label](url): description`. Anything else is
//! ignored rather than rejected.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::util::{floor_char_boundary, normalize_space, slugify_bounded};

/// Title of the section that collects links appearing before any `##` header.
pub const IMPLICIT_SECTION_TITLE: &str = "Overview";

/// Longest section or link slug, in bytes. Slugs become file and directory
/// names, so this stays well under the usual 255-byte name limit.
pub const MAX_SLUG_BYTES: usize = 80;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("not an llms.txt link index: no `# title` and no `## section` headers found")]
    NotALinkIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Required,
    Optional,
    Other,
}

impl SectionKind {
    fn from_title(title: &str) -> Self {
        match title.trim().to_lowercase().as_str() {
            "optional" => SectionKind::Optional,
            "required" => SectionKind::Required,
            _ => SectionKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEntry {
    pub url: String,
    pub label: String,
    /// Empty when the bullet had no `: description` tail
    pub description: String,
    /// Index of the owning section in [`LinkIndex::sections`]
    pub section: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    /// Unique within the index; used for file names
    pub slug: String,
    pub kind: SectionKind,
    pub links: Vec<LinkEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkIndex {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub preamble: Option<String>,
    pub source_url: Option<String>,
    pub sections: Vec<Section>,
}

impl LinkIndex {
    /// Sections the pipeline works on. Optional sections only when asked.
    pub fn processed_sections(&self, include_optional: bool) -> impl Iterator<Item = &Section> {
        self.sections
            .iter()
            .filter(move |s| include_optional || s.kind != SectionKind::Optional)
    }

    /// Links of the processed sections, in source order.
    pub fn processed_links(&self, include_optional: bool) -> impl Iterator<Item = &LinkEntry> {
        self.processed_sections(include_optional)
            .flat_map(|s| s.links.iter())
    }

    pub fn link_count(&self) -> usize {
        self.sections.iter().map(|s| s.links.len()).sum()
    }

    /// Host of the document the index was read from, if known.
    pub fn source_host(&self) -> Option<String> {
        self.source_url
            .as_deref()
            .and_then(|u| Url::parse(u).ok())
            .and_then(|u| u.host_str().map(|h| h.to_string()))
    }
}

/// Parse `llms.txt` text. `source_url` is both recorded on the index and used
/// as the base for relative links.
pub fn parse_llms_text(text: &str, source_url: Option<&str>) -> Result<LinkIndex, ParseError> {
    let base = source_url.and_then(|u| Url::parse(u).ok());

    let mut title: Option<String> = None;
    let mut summary_lines: Vec<String> = Vec::new();
    let mut summary_done = false;
    let mut preamble_lines: Vec<String> = Vec::new();
    let mut sections: Vec<Section> = Vec::new();
    let mut seen_urls: Vec<HashSet<String>> = Vec::new();
    let mut used_slugs: HashSet<String> = HashSet::new();
    let mut saw_header = false;
    let mut in_fence = false;

    for raw_line in text.lines() {
        let line = raw_line.trim_end();
        let trimmed = line.trim_start();

        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }

        if let Some(h1) = heading(trimmed, 1) {
            if title.is_none() {
                title = Some(h1);
            } else {
                debug!("Ignoring extra H1: {}", trimmed);
            }
            continue;
        }

        if let Some(h2) = heading(trimmed, 2) {
            saw_header = true;
            summary_done = true;
            push_section(&mut sections, &mut seen_urls, &mut used_slugs, h2);
            continue;
        }

        if let Some((label, target, description)) = parse_link_line(trimmed) {
            summary_done = true;
            if sections.is_empty() {
                push_section(
                    &mut sections,
                    &mut seen_urls,
                    &mut used_slugs,
                    IMPLICIT_SECTION_TITLE.to_string(),
                );
            }
            let index = sections.len() - 1;
            let url = resolve_url(base.as_ref(), &target);
            if !seen_urls[index].insert(url.clone()) {
                debug!("Skipping duplicate link {} in section {}", url, index);
                continue;
            }
            sections[index].links.push(LinkEntry {
                url,
                label,
                description,
                section: index,
            });
            continue;
        }

        if !sections.is_empty() {
            if !trimmed.is_empty() {
                debug!("Skipping unrecognized line: {}", trimmed);
            }
            continue;
        }

        if let Some(quote) = trimmed.strip_prefix('>') {
            if !summary_done {
                summary_lines.push(quote.trim().to_string());
                continue;
            }
        } else if !summary_lines.is_empty() {
            summary_done = true;
        }

        if !trimmed.is_empty() && title.is_some() {
            summary_done = true;
            preamble_lines.push(trimmed.to_string());
        }
    }

    if title.is_none() && !saw_header {
        return Err(ParseError::NotALinkIndex);
    }

    let summary = Some(normalize_space(&summary_lines.join(" "))).filter(|s| !s.is_empty());
    let preamble = Some(preamble_lines.join("\n")).filter(|s| !s.is_empty());

    Ok(LinkIndex {
        title,
        summary,
        preamble,
        source_url: source_url.map(|s| s.to_string()),
        sections,
    })
}

fn push_section(
    sections: &mut Vec<Section>,
    seen_urls: &mut Vec<HashSet<String>>,
    used_slugs: &mut HashSet<String>,
    title: String,
) {
    let slug = unique_slug(&title, "section", used_slugs);
    sections.push(Section {
        kind: SectionKind::from_title(&title),
        title,
        slug,
        links: Vec::new(),
    });
    seen_urls.push(HashSet::new());
}

/// Slug of `text` (or `fallback`) made unique against `used` with `-2`, `-3`...
///
/// The result never exceeds [`MAX_SLUG_BYTES`], suffix included.
pub fn unique_slug(text: &str, fallback: &str, used: &mut HashSet<String>) -> String {
    let base = Some(slugify_bounded(text, MAX_SLUG_BYTES))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| fallback.to_string());
    let mut candidate = base.clone();
    let mut n = 2;
    while used.contains(&candidate) {
        let suffix = format!("-{}", n);
        let cut = floor_char_boundary(&base, MAX_SLUG_BYTES.saturating_sub(suffix.len()));
        candidate = format!("{}{}", base[..cut].trim_end_matches('-'), suffix);
        n += 1;
    }
    used.insert(candidate.clone());
    candidate
}

/// Text of an ATX heading of exactly `level`, without trailing `#`s.
fn heading(line: &str, level: usize) -> Option<String> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if hashes != level {
        return None;
    }
    let rest = &line[level..];
    if !rest.starts_with(' ') && !rest.starts_with('\t') {
        return None;
    }
    let text = rest.trim().trim_end_matches('#').trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Split `- [label](url "title"): description` into its parts.
fn parse_link_line(line: &str) -> Option<(String, String, String)> {
    let rest = ["- ", "* ", "+ "]
        .iter()
        .find_map(|marker| line.strip_prefix(marker))?
        .trim_start();
    let rest = rest.strip_prefix('[')?;
    let label_end = rest.find("](")?;
    let label = normalize_space(&rest[..label_end]);
    let after = &rest[label_end + 2..];
    let target_end = closing_paren(after)?;
    let target = after[..target_end].split_whitespace().next()?.to_string();
    let tail = after[target_end + 1..].trim();
    let description = tail
        .trim_start_matches([':', '-', '\u{2013}', '\u{2014}'])
        .trim()
        .to_string();

    if label.is_empty() || target.is_empty() {
        return None;
    }
    Some((label, target, description))
}

/// Byte offset of the `)` that closes a link target, skipping nested pairs
/// such as `Foo_(bar)`.
fn closing_paren(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, ch) in text.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' if depth == 0 => return Some(i),
            ')' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Absolute form of `target`, fragment removed. Relative targets are joined
/// onto `base`; without a base they are kept as written.
fn resolve_url(base: Option<&Url>, target: &str) -> String {
    let parsed = match Url::parse(target) {
        Ok(url) => Some(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => base.and_then(|b| b.join(target).ok()),
        Err(_) => None,
    };
    match parsed {
        Some(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        None => target.to_string(),
    }
}
