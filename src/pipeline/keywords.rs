//! Skill name, description and trigger keyword derivation.
//!
//! Everything is computed from a single [`Facts`] record. Keywords come from
//! one extraction pass that does not look at the heuristic level; the level
//! only picks which of the three description templates is used.

use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use super::parser::LinkIndex;
use super::snapshot::SnapshotDocument;
use crate::util::{normalize_space, slugify_bounded};

/// Longest skill name produced (agent runtimes reject longer ones)
pub const MAX_NAME_LEN: usize = 64;

const MAX_TERMS: usize = 60;
const MAX_COUNTED_HEADINGS: usize = 250;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it",
    "its", "of", "on", "or", "that", "the", "to", "was", "were", "will", "with", "this", "these",
    "those", "you", "your", "we", "our", "their", "they", "via",
];

/// Intent name and the substrings that suggest it. Order matters for output.
const INTENT_HINTS: &[(&str, &[&str])] = &[
    (
        "authentication",
        &["auth", "oauth", "token", "jwt", "sso", "identity", "credential", "login"],
    ),
    ("api key", &["api key", "apikey", "key management", "secret"]),
    ("rate limit", &["rate limit", "throttle", "quota"]),
    ("pagination", &["pagination", "page size", "cursor", "offset"]),
    ("errors", &["error", "exception", "status code", "retry"]),
    ("webhooks", &["webhook", "event delivery", "event", "callback"]),
    ("sdk", &["sdk", "library", "client", "python", "typescript", "java"]),
    ("cli", &["cli", "command line", "terminal", "shell"]),
    ("quickstart", &["quickstart", "quick start", "getting started", "setup"]),
    ("examples", &["example", "sample", "cookbook"]),
    ("reference", &["reference", "api reference", "specification"]),
    ("guides", &["guide", "how to", "walkthrough"]),
    ("tutorial", &["tutorial", "step by step"]),
    ("billing", &["billing", "invoice", "usage cost"]),
    ("pricing", &["pricing", "price", "plan"]),
    ("deployment", &["deploy", "deployment", "production", "hosting"]),
    ("configuration", &["config", "configuration", "settings", "options"]),
    ("monitoring", &["monitor", "observability", "metrics", "tracing", "logging"]),
    ("troubleshooting", &["troubleshoot", "debug", "known issues", "faq"]),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeuristicLevel {
    Compact,
    #[default]
    Balanced,
    Verbose,
}

impl HeuristicLevel {
    pub const ALL: [HeuristicLevel; 3] = [
        HeuristicLevel::Compact,
        HeuristicLevel::Balanced,
        HeuristicLevel::Verbose,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HeuristicLevel::Compact => "compact",
            HeuristicLevel::Balanced => "balanced",
            HeuristicLevel::Verbose => "verbose",
        }
    }

    /// Like `from_str` but unknown values fall back to balanced
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl fmt::Display for HeuristicLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for HeuristicLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "compact" => Ok(HeuristicLevel::Compact),
            "balanced" => Ok(HeuristicLevel::Balanced),
            "verbose" => Ok(HeuristicLevel::Verbose),
            _ => bail!("Unknown heuristic level: {} (expected compact, balanced or verbose)", s),
        }
    }
}

/// Knobs that shape a description narrative.
struct NarrativeProfile {
    heading_input: usize,
    section_preview: usize,
    include_themes: bool,
    theme_cap: usize,
    intent_cap: usize,
}

impl NarrativeProfile {
    fn for_level(level: HeuristicLevel) -> Self {
        match level {
            HeuristicLevel::Compact => Self {
                heading_input: 80,
                section_preview: 4,
                include_themes: false,
                theme_cap: 2,
                intent_cap: 2,
            },
            HeuristicLevel::Balanced => Self {
                heading_input: 180,
                section_preview: 8,
                include_themes: true,
                theme_cap: 4,
                intent_cap: 5,
            },
            HeuristicLevel::Verbose => Self {
                heading_input: 300,
                section_preview: 12,
                include_themes: true,
                theme_cap: 8,
                intent_cap: 8,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Descriptions {
    pub compact: String,
    pub balanced: String,
    pub verbose: String,
}

impl Descriptions {
    pub fn get(&self, level: HeuristicLevel) -> &str {
        match level {
            HeuristicLevel::Compact => &self.compact,
            HeuristicLevel::Balanced => &self.balanced,
            HeuristicLevel::Verbose => &self.verbose,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeywordSet {
    pub name: String,
    /// Level whose description goes into the descriptor
    pub level: HeuristicLevel,
    pub descriptions: Descriptions,
    /// Lowercase, deduplicated, ranked by weight
    pub keywords: Vec<String>,
}

impl KeywordSet {
    pub fn description(&self) -> &str {
        self.descriptions.get(self.level)
    }
}

#[derive(Debug, Clone, Default)]
pub struct KeywordOptions {
    pub level: HeuristicLevel,
    pub include_optional: bool,
    pub name_override: Option<String>,
}

/// Everything the narratives and the keyword pass are allowed to see.
struct Facts {
    title: String,
    summary: Option<String>,
    sections: Vec<String>,
    /// Section title with the labels of its links, for navigation hints
    section_links: Vec<(String, Vec<String>)>,
    headings: Vec<String>,
    descriptions: Vec<String>,
    host: Option<String>,
}

impl Facts {
    fn gather(index: &LinkIndex, snapshots: &[SnapshotDocument], include_optional: bool) -> Self {
        let host = index.source_host();
        let title = index
            .title
            .clone()
            .or_else(|| host.clone())
            .unwrap_or_else(|| "documentation".to_string());

        let mut sections = Vec::new();
        let mut section_links = Vec::new();
        let mut headings = Vec::new();
        let mut descriptions = Vec::new();
        for section in index.processed_sections(include_optional) {
            sections.push(section.title.clone());
            section_links.push((
                section.title.clone(),
                section.links.iter().map(|l| l.label.clone()).collect(),
            ));
            for link in &section.links {
                headings.push(link.label.clone());
                if !link.description.is_empty() {
                    descriptions.push(link.description.clone());
                }
            }
        }
        for doc in snapshots.iter().filter(|d| d.is_ok()) {
            if let Some(content) = &doc.content {
                headings.extend(markdown_headings(content));
            }
        }

        Self {
            title,
            summary: index.summary.clone(),
            sections,
            section_links,
            headings,
            descriptions,
            host,
        }
    }
}

/// Derive the name, all three descriptions and the keyword set.
///
/// `snapshots` may be empty; Ok documents add their markdown headings to the
/// fact record. Never fails.
pub fn derive_keywords(
    index: &LinkIndex,
    snapshots: &[SnapshotDocument],
    options: &KeywordOptions,
) -> KeywordSet {
    let facts = Facts::gather(index, snapshots, options.include_optional);

    let name = derive_name(
        options.name_override.as_deref(),
        index.title.as_deref(),
        facts.host.as_deref(),
    );

    let mut keywords = extract_keywords(&facts);
    if keywords.is_empty() {
        keywords.push(
            facts
                .host
                .clone()
                .map(|h| h.to_lowercase())
                .unwrap_or_else(|| name.clone()),
        );
    }
    debug!("Derived {} keywords for {}", keywords.len(), name);

    let descriptions = Descriptions {
        compact: render_description(&facts, HeuristicLevel::Compact),
        balanced: render_description(&facts, HeuristicLevel::Balanced),
        verbose: render_description(&facts, HeuristicLevel::Verbose),
    };

    KeywordSet {
        name,
        level: options.level,
        descriptions,
        keywords,
    }
}

/// Skill name from the override, the index title or the source host.
pub fn derive_name(name_override: Option<&str>, title: Option<&str>, host: Option<&str>) -> String {
    [name_override, title, host]
        .into_iter()
        .flatten()
        .map(|candidate| slugify_bounded(candidate, MAX_NAME_LEN))
        .find(|slug| !slug.is_empty())
        .unwrap_or_else(|| "docs".to_string())
}

/// ATX headings (levels 1-3) outside code fences
fn markdown_headings(content: &str) -> Vec<String> {
    let mut headings = Vec::new();
    let mut in_fence = false;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        let level = trimmed.chars().take_while(|c| *c == '#').count();
        if (1..=3).contains(&level) {
            let text = trimmed[level..].trim().trim_end_matches('#').trim();
            if !text.is_empty() && trimmed[level..].starts_with(' ') {
                headings.push(text.to_string());
            }
        }
    }
    headings
}

fn is_stopword(term: &str) -> bool {
    STOPWORDS.contains(&term)
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| t.len() > 2 && !is_stopword(t))
        .map(|t| t.to_string())
        .collect()
}

/// Lowercase, single-spaced, no list separators, no edge punctuation.
/// Keywords are written comma-separated, so commas never survive.
fn normalize_term(text: &str) -> String {
    normalize_space(&text.to_lowercase().replace(|c: char| c == ',' || c == ';', " "))
        .trim_matches(|c: char| ".,:;!?()[]{}<>\"'".contains(c))
        .to_string()
}

fn phrase_ngrams(tokens: &[String]) -> Vec<String> {
    let mut phrases = Vec::new();
    for n in 2..=3 {
        if tokens.len() < n {
            continue;
        }
        for window in tokens.windows(n) {
            let phrase = window.join(" ");
            if phrase.len() >= 6 {
                phrases.push(phrase);
            }
        }
    }
    phrases
}

#[derive(Default)]
struct TermCounter {
    weights: HashMap<String, u32>,
}

impl TermCounter {
    fn add(&mut self, term: &str, weight: u32) {
        let normalized = normalize_term(term);
        if normalized.is_empty() || is_stopword(&normalized) {
            return;
        }
        if normalized.split(' ').count() > 8 || normalized.len() > 80 {
            return;
        }
        *self.weights.entry(normalized).or_insert(0) += weight;
    }

    /// Add `text` whole, its tokens, and its 2-3 word phrases
    fn add_all(&mut self, text: &str, whole: u32, token: u32, phrase: Option<u32>) {
        self.add(text, whole);
        let tokens = tokenize(text);
        for t in &tokens {
            self.add(t, token);
        }
        if let Some(weight) = phrase {
            for p in phrase_ngrams(&tokens) {
                self.add(&p, weight);
            }
        }
    }

    /// Heaviest first; ties go to the longer term, then alphabetical
    fn ranked(&self, limit: usize) -> Vec<String> {
        let mut entries: Vec<(&String, &u32)> = self.weights.iter().collect();
        entries.sort_by(|a, b| {
            b.1.cmp(a.1)
                .then_with(|| b.0.len().cmp(&a.0.len()))
                .then_with(|| a.0.cmp(b.0))
        });
        entries.into_iter().take(limit).map(|(t, _)| t.clone()).collect()
    }
}

fn weighted_terms(facts: &Facts, heading_input: usize) -> TermCounter {
    let mut counter = TermCounter::default();

    counter.add_all(&facts.title, 14, 5, Some(6));
    if let Some(summary) = &facts.summary {
        counter.add_all(summary, 9, 3, None);
    }
    for section in &facts.sections {
        counter.add_all(section, 11, 4, Some(5));
    }
    let heading_cap = heading_input.min(MAX_COUNTED_HEADINGS);
    for heading in facts.headings.iter().take(heading_cap) {
        counter.add_all(heading, 7, 2, Some(3));
    }
    for description in &facts.descriptions {
        for token in tokenize(description) {
            counter.add(&token, 1);
        }
    }

    counter
}

fn detect_intents(summary: Option<&str>, sections: &[String], headings: &[String]) -> Vec<String> {
    let mut corpus = summary.unwrap_or_default().to_string();
    for part in sections.iter().chain(headings.iter()) {
        corpus.push(' ');
        corpus.push_str(part);
    }
    let corpus = corpus.to_lowercase();

    INTENT_HINTS
        .iter()
        .filter(|(_, hints)| hints.iter().any(|hint| corpus.contains(hint)))
        .map(|(intent, _)| intent.to_string())
        .collect()
}

/// Drop blanks, pure numbers, repeats, and terms contained in earlier ones.
fn dedupe_terms<I, S>(terms: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut ordered: Vec<String> = Vec::new();
    for term in terms {
        let cleaned = normalize_term(term.as_ref());
        if cleaned.is_empty() || cleaned.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let is_phrase = cleaned.contains(' ');
        let redundant = ordered.iter().any(|existing| {
            cleaned == *existing
                || (cleaned.len() >= 6 && existing.contains(cleaned.as_str()))
                || (is_phrase
                    && existing.contains(' ')
                    && existing.len() >= 6
                    && cleaned.contains(existing.as_str()))
        });
        if !redundant {
            ordered.push(cleaned);
        }
    }
    ordered
}

/// The single keyword pass. Uses fixed caps so the result cannot depend on
/// the description level.
fn extract_keywords(facts: &Facts) -> Vec<String> {
    const HEADING_INPUT: usize = 180;
    const SEED_SECTIONS: usize = 16;
    const SEED_HEADINGS: usize = 36;
    const INTENT_CAP: usize = 5;

    let counter = weighted_terms(facts, HEADING_INPUT);
    let heading_slice = &facts.headings[..facts.headings.len().min(HEADING_INPUT)];

    let seeded = facts
        .sections
        .iter()
        .take(SEED_SECTIONS)
        .chain(facts.headings.iter().take(SEED_HEADINGS))
        .cloned();
    let ranked = counter.ranked(MAX_TERMS * 2);
    let intents: Vec<String> = detect_intents(facts.summary.as_deref(), &facts.sections, heading_slice)
        .into_iter()
        .take(INTENT_CAP)
        .collect();

    let terms = dedupe_terms(seeded.chain(ranked));
    let mut terms = dedupe_terms(terms.into_iter().chain(intents));
    terms.truncate(MAX_TERMS);
    terms
}

fn human_join(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [one] => one.clone(),
        [a, b] => format!("{} and {}", a, b),
        [init @ .., last] => format!("{}, and {}", init.join(", "), last),
    }
}

fn render_description(facts: &Facts, level: HeuristicLevel) -> String {
    let profile = NarrativeProfile::for_level(level);
    let lead = facts
        .summary
        .as_deref()
        .map(normalize_space)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("Documentation skill for {}.", facts.title));

    let preview: Vec<String> = facts
        .sections
        .iter()
        .take(profile.section_preview)
        .map(|s| normalize_space(s))
        .collect();

    if level == HeuristicLevel::Compact {
        if preview.is_empty() {
            return lead;
        }
        return format!("{} Covers: {}.", lead, preview.join(", "));
    }

    let mut paragraphs = vec![lead];
    if !preview.is_empty() {
        paragraphs.push(format!("Primary coverage includes {}.", human_join(&preview)));
    }

    if profile.include_themes {
        let counter = weighted_terms(facts, profile.heading_input);
        let section_terms: HashSet<String> = facts.sections.iter().map(|s| normalize_term(s)).collect();
        let title_term = normalize_term(&facts.title);
        let title_tokens: HashSet<String> = tokenize(&facts.title).into_iter().collect();

        let mut themes = Vec::new();
        for term in counter.ranked(50) {
            if term == title_term || section_terms.contains(&term) || title_tokens.contains(&term) {
                continue;
            }
            if !term.contains(' ') && term.len() < 8 {
                continue;
            }
            themes.push(term);
            if themes.len() >= profile.theme_cap {
                break;
            }
        }
        let themes = dedupe_terms(themes);

        let intents: Vec<String> = detect_intents(facts.summary.as_deref(), &facts.sections, &[])
            .into_iter()
            .filter(|i| !section_terms.contains(&normalize_term(i)))
            .take(profile.intent_cap)
            .collect();

        let take = |v: &[String], n: usize| v[..v.len().min(n)].to_vec();
        match (themes.is_empty(), intents.is_empty()) {
            (false, false) => paragraphs.push(format!(
                "The references emphasize {}, with practical guidance for {}.",
                human_join(&take(&themes, 4)),
                human_join(&take(&intents, 5))
            )),
            (false, true) => paragraphs.push(format!(
                "The references emphasize {}.",
                human_join(&take(&themes, 5))
            )),
            (true, false) => paragraphs.push(format!(
                "Common question patterns include {}.",
                human_join(&take(&intents, 5))
            )),
            (true, true) => {}
        }
    }

    if level == HeuristicLevel::Verbose {
        let anchors = dedupe_terms(
            facts
                .sections
                .iter()
                .take(6)
                .chain(facts.headings.iter().take(8)),
        );
        if !anchors.is_empty() {
            paragraphs.push(format!(
                "Useful navigation anchors include {}.",
                human_join(&anchors[..anchors.len().min(6)])
            ));
        }

        let hints: Vec<String> = facts
            .section_links
            .iter()
            .filter(|(_, labels)| !labels.is_empty())
            .take(4)
            .map(|(section, labels)| {
                format!(
                    "See the {} section for {}.",
                    section,
                    human_join(&labels[..labels.len().min(3)])
                )
            })
            .collect();
        if !hints.is_empty() {
            paragraphs.push(hints.join(" "));
        }
    }

    paragraphs.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::parser::parse_llms_text;

    fn acme_index() -> LinkIndex {
        let text = "# Acme API Docs\n\
            > API platform for authentication, webhooks, and deployment workflows.\n\
            ## Authentication\n\
            - [Token lifecycle](https://acme.dev/auth/tokens): Issue and rotate tokens\n\
            ## Webhooks\n\
            - [Webhook retries](https://acme.dev/webhooks/retries)\n\
            ## Deployment Guide\n\
            - [Production rollout checklist](https://acme.dev/deploy/checklist)\n\
            ## API Reference\n\
            - [Endpoints](https://acme.dev/reference)\n\
            ## Optional\n\
            - [Changelog](https://acme.dev/changelog)\n";
        parse_llms_text(text, Some("https://acme.dev/llms.txt")).unwrap()
    }

    fn options(level: HeuristicLevel) -> KeywordOptions {
        KeywordOptions {
            level,
            ..KeywordOptions::default()
        }
    }

    #[test]
    fn test_keywords_are_detailed_and_intent_aware() {
        let set = derive_keywords(&acme_index(), &[], &options(HeuristicLevel::Balanced));
        assert!(set.keywords.contains(&"authentication".to_string()));
        assert!(set.keywords.contains(&"webhooks".to_string()));
        assert!(set.keywords.iter().any(|k| k.contains("deployment")));
        assert!(set.keywords.contains(&"api reference".to_string()));
        assert!(set.keywords.len() <= MAX_TERMS);
    }

    #[test]
    fn test_keywords_are_lowercase_and_unique() {
        let set = derive_keywords(&acme_index(), &[], &options(HeuristicLevel::Balanced));
        let unique: HashSet<&String> = set.keywords.iter().collect();
        assert_eq!(unique.len(), set.keywords.len());
        assert!(set.keywords.iter().all(|k| *k == k.to_lowercase()));
    }

    #[test]
    fn test_levels_change_description_not_keywords() {
        let index = acme_index();
        let compact = derive_keywords(&index, &[], &options(HeuristicLevel::Compact));
        let balanced = derive_keywords(&index, &[], &options(HeuristicLevel::Balanced));
        let verbose = derive_keywords(&index, &[], &options(HeuristicLevel::Verbose));

        assert_eq!(compact.keywords, balanced.keywords);
        assert_eq!(balanced.keywords, verbose.keywords);

        assert!(compact.description().contains("Covers:"));
        assert!(balanced.description().contains("Primary coverage includes"));
        assert!(balanced.description().contains("practical guidance for"));
        assert!(verbose.description().contains("Primary coverage includes"));
        assert!(verbose.description().contains("Useful navigation anchors include"));
        assert!(verbose
            .description()
            .contains("See the Authentication section for Token lifecycle."));
        assert_ne!(compact.description(), verbose.description());
    }

    #[test]
    fn test_compact_is_a_single_paragraph() {
        let set = derive_keywords(&acme_index(), &[], &options(HeuristicLevel::Compact));
        assert!(!set.description().contains('\n'));
    }

    #[test]
    fn test_optional_sections_only_when_included() {
        let index = acme_index();
        let without = derive_keywords(&index, &[], &options(HeuristicLevel::Compact));
        assert!(!without.keywords.contains(&"changelog".to_string()));

        let mut opts = options(HeuristicLevel::Compact);
        opts.include_optional = true;
        let with = derive_keywords(&index, &[], &opts);
        assert!(with.keywords.contains(&"changelog".to_string()));
    }

    #[test]
    fn test_name_from_title_override_and_host() {
        assert_eq!(derive_name(None, Some("Acme API Docs"), None), "acme-api-docs");
        assert_eq!(derive_name(Some("My Skill!"), Some("Acme"), None), "my-skill");
        assert_eq!(derive_name(None, None, Some("docs.acme.dev")), "docs-acme-dev");
        assert_eq!(derive_name(Some("???"), None, None), "docs");
        assert!(derive_name(None, Some(&"x".repeat(200)), None).len() <= MAX_NAME_LEN);
    }

    #[test]
    fn test_minimal_input_still_produces_metadata() {
        let index = parse_llms_text("## A\n- [B](https://q.io/b)\n", Some("https://q.io/llms.txt"))
            .unwrap();
        let set = derive_keywords(&index, &[], &options(HeuristicLevel::Verbose));
        assert_eq!(set.name, "q-io");
        assert!(!set.description().is_empty());
        assert!(!set.keywords.is_empty());
    }

    #[test]
    fn test_host_is_last_resort_keyword() {
        let index = LinkIndex {
            title: None,
            summary: None,
            preamble: None,
            source_url: Some("https://zz.example/llms.txt".to_string()),
            sections: vec![],
        };
        let set = derive_keywords(&index, &[], &options(HeuristicLevel::Compact));
        assert!(!set.keywords.is_empty());
        assert_eq!(set.name, "zz-example");
    }

    #[test]
    fn test_snapshot_headings_enrich_keywords() {
        use crate::pipeline::snapshot::{SnapshotDocument, SnapshotStatus};
        use chrono::Utc;

        let index = acme_index();
        let doc = SnapshotDocument {
            link: index.sections[0].links[0].clone(),
            content: Some("# Tokens\n\n## Refresh grants\n\n```\n# not a heading\n```\n".to_string()),
            fetched_at: Utc::now(),
            status: SnapshotStatus::Ok,
            bytes: 10,
            truncated: false,
        };
        let set = derive_keywords(&index, &[doc], &options(HeuristicLevel::Balanced));
        assert!(set.keywords.contains(&"refresh grants".to_string()));
        assert!(!set.keywords.iter().any(|k| k.contains("not a heading")));
    }

    #[test]
    fn test_dedupe_drops_contained_terms() {
        let terms = dedupe_terms(["api reference", "reference", "Reference", "2024", "api"]);
        // "reference" is long enough to count as contained; "api" is not
        assert_eq!(terms, vec!["api reference".to_string(), "api".to_string()]);
    }

    #[test]
    fn test_human_join() {
        let items: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(human_join(&items[..1]), "a");
        assert_eq!(human_join(&items[..2]), "a and b");
        assert_eq!(human_join(&items), "a, b, and c");
    }

    #[test]
    fn test_heuristic_level_parsing() {
        assert_eq!("VERBOSE".parse::<HeuristicLevel>().unwrap(), HeuristicLevel::Verbose);
        assert!("loud".parse::<HeuristicLevel>().is_err());
        assert_eq!(HeuristicLevel::parse_lenient("loud"), HeuristicLevel::Balanced);
        for level in HeuristicLevel::ALL {
            assert_eq!(level.as_str().parse::<HeuristicLevel>().unwrap(), level);
        }
    }
}
