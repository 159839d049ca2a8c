//! Assembles the skill bundle file set.
//!
//! Building is pure: every file is rendered in memory and nothing touches the
//! filesystem until the installer writes it out. Files are kept in a sorted
//! map so iteration order, and therefore the manifest, is deterministic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

use super::keywords::{HeuristicLevel, KeywordSet};
use super::parser::{unique_slug, LinkEntry, LinkIndex, Section};
use super::snapshot::{SkipReason, SnapshotDocument, SnapshotStatus};
use crate::util::sha256_hex;

pub const DESCRIPTOR_FILE: &str = "SKILL.md";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const INDEX_FILE: &str = "references/INDEX.md";
pub const CATALOG_FILE: &str = "references/catalog.json";

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub include_optional: bool,
    /// One index file per section; otherwise one per link
    pub by_section: bool,
    pub heuristic_level: HeuristicLevel,
    pub snapshot_enabled: bool,
    /// Stamped into the catalog and manifest
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub section: String,
    pub section_slug: String,
    pub label: String,
    pub url: String,
    pub description: String,
    /// `ok`, `failed` or `skipped`
    pub status: String,
    pub reason: Option<String>,
    pub index_path: String,
    pub page_path: Option<String>,
    pub provenance_path: Option<String>,
    pub bytes: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub name: String,
    pub source_url: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub url: String,
    pub label: String,
    pub section: String,
    pub status: String,
    pub reason: Option<String>,
    pub fetched_at: DateTime<Utc>,
    pub bytes: usize,
    pub truncated: bool,
    pub content_sha256: Option<String>,
    pub page_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestCounts {
    pub sections: usize,
    pub links: usize,
    pub snapshots_ok: usize,
    pub snapshots_failed: usize,
    pub snapshots_skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub title: Option<String>,
    pub source_url: Option<String>,
    pub tool_version: String,
    pub heuristic_level: HeuristicLevel,
    pub by_section: bool,
    pub include_optional: bool,
    pub snapshot: bool,
    pub generated_at: DateTime<Utc>,
    pub counts: ManifestCounts,
    pub descriptor_sha256: String,
    /// Every other file in the bundle, sorted
    pub files: Vec<String>,
}

/// A fully rendered bundle. Built once, then only read.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub name: String,
    pub catalog: Catalog,
    pub provenance: Vec<ProvenanceRecord>,
    pub manifest: Manifest,
    files: BTreeMap<String, String>,
}

impl Bundle {
    /// All files as (relative path, contents), sorted by path
    pub fn files(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(p, c)| (p.as_str(), c.as_str()))
    }

    pub fn file(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(|c| c.as_str())
    }

    pub fn descriptor(&self) -> &str {
        self.file(DESCRIPTOR_FILE).unwrap_or_default()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

/// Paths chosen for one link
struct LinkPaths {
    index: String,
    page: String,
    provenance: String,
}

/// Per-link view used by every renderer
struct Row<'a> {
    section: &'a Section,
    link: &'a LinkEntry,
    paths: LinkPaths,
    status: SnapshotStatus,
    doc: Option<&'a SnapshotDocument>,
}

impl Row<'_> {
    fn has_page(&self) -> bool {
        self.status == SnapshotStatus::Ok && self.doc.and_then(|d| d.content.as_ref()).is_some()
    }
}

/// Build the bundle for `index`.
///
/// `snapshots` are matched to links by section and URL. With snapshotting
/// disabled they are ignored and every entry is recorded as skipped.
pub fn build_bundle(
    index: &LinkIndex,
    snapshots: &[SnapshotDocument],
    keywords: &KeywordSet,
    options: &BuildOptions,
) -> serde_json::Result<Bundle> {
    let docs: HashMap<(usize, &str), &SnapshotDocument> = snapshots
        .iter()
        .map(|d| ((d.link.section, d.link.url.as_str()), d))
        .collect();

    let sections: Vec<&Section> = index.processed_sections(options.include_optional).collect();
    let mut rows: Vec<Row> = Vec::new();
    for &section in &sections {
        let mut used = HashSet::new();
        for link in &section.links {
            let link_slug = unique_slug(&link.label, "link", &mut used);
            let paths = LinkPaths {
                index: if options.by_section {
                    format!("references/sections/{}.md", section.slug)
                } else {
                    format!("references/links/{}/{}.md", section.slug, link_slug)
                },
                page: format!("references/sections/{}/pages/{}.md", section.slug, link_slug),
                provenance: format!("references/provenance/{}/{}.json", section.slug, link_slug),
            };
            let doc = if options.snapshot_enabled {
                docs.get(&(link.section, link.url.as_str())).copied()
            } else {
                None
            };
            let status = doc
                .map(|d| d.status.clone())
                .unwrap_or(SnapshotStatus::Skipped(SkipReason::Disabled));
            rows.push(Row {
                section,
                link,
                paths,
                status,
                doc,
            });
        }
    }

    let mut files: BTreeMap<String, String> = BTreeMap::new();

    files.insert(INDEX_FILE.to_string(), render_index(index, &sections, &rows));
    if options.by_section {
        for section in &sections {
            let section_rows: Vec<&Row> = rows
                .iter()
                .filter(|r| std::ptr::eq(r.section, *section))
                .collect();
            files.insert(
                format!("references/sections/{}.md", section.slug),
                render_section_index(section, &section_rows),
            );
        }
    } else {
        for row in &rows {
            files.insert(row.paths.index.clone(), render_link_index(row));
        }
    }

    let mut provenance = Vec::new();
    for row in &rows {
        if row.has_page() {
            if let Some(content) = row.doc.and_then(|d| d.content.as_deref()) {
                files.insert(row.paths.page.clone(), render_page(row.link, content));
            }
        }
        if let Some(doc) = row.doc {
            let record = ProvenanceRecord {
                url: row.link.url.clone(),
                label: row.link.label.clone(),
                section: row.section.title.clone(),
                status: row.status.label().to_string(),
                reason: row.status.reason(),
                fetched_at: doc.fetched_at,
                bytes: doc.bytes,
                truncated: doc.truncated,
                content_sha256: doc.content.as_deref().map(|c| sha256_hex(c.as_bytes())),
                page_path: row.has_page().then(|| row.paths.page.clone()),
            };
            files.insert(row.paths.provenance.clone(), to_json(&record)?);
            provenance.push(record);
        }
    }

    let catalog = Catalog {
        name: keywords.name.clone(),
        source_url: index.source_url.clone(),
        generated_at: options.generated_at,
        entries: rows.iter().map(catalog_entry).collect(),
    };
    files.insert(CATALOG_FILE.to_string(), to_json(&catalog)?);

    let descriptor = render_descriptor(index, &sections, keywords, options);
    let descriptor_sha256 = sha256_hex(descriptor.as_bytes());
    files.insert(DESCRIPTOR_FILE.to_string(), descriptor);

    let mut counts = ManifestCounts {
        sections: sections.len(),
        links: rows.len(),
        ..ManifestCounts::default()
    };
    for row in &rows {
        match row.status {
            SnapshotStatus::Ok => counts.snapshots_ok += 1,
            SnapshotStatus::Failed(_) => counts.snapshots_failed += 1,
            SnapshotStatus::Skipped(_) => counts.snapshots_skipped += 1,
        }
    }

    let manifest = Manifest {
        name: keywords.name.clone(),
        title: index.title.clone(),
        source_url: index.source_url.clone(),
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        heuristic_level: options.heuristic_level,
        by_section: options.by_section,
        include_optional: options.include_optional,
        snapshot: options.snapshot_enabled,
        generated_at: options.generated_at,
        counts,
        descriptor_sha256,
        files: files.keys().cloned().collect(),
    };
    files.insert(MANIFEST_FILE.to_string(), to_json(&manifest)?);

    debug!(
        "Built bundle {} with {} files ({} links)",
        keywords.name,
        files.len(),
        rows.len()
    );

    Ok(Bundle {
        name: keywords.name.clone(),
        catalog,
        provenance,
        manifest,
        files,
    })
}

fn to_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    Ok(text)
}

fn catalog_entry(row: &Row) -> CatalogEntry {
    CatalogEntry {
        section: row.section.title.clone(),
        section_slug: row.section.slug.clone(),
        label: row.link.label.clone(),
        url: row.link.url.clone(),
        description: row.link.description.clone(),
        status: row.status.label().to_string(),
        reason: row.status.reason(),
        index_path: row.paths.index.clone(),
        page_path: row.has_page().then(|| row.paths.page.clone()),
        provenance_path: row.doc.map(|_| row.paths.provenance.clone()),
        bytes: row.doc.map(|d| d.bytes).unwrap_or(0),
        truncated: row.doc.is_some_and(|d| d.truncated),
    }
}

fn display_title(index: &LinkIndex, name: &str) -> String {
    index
        .title
        .clone()
        .or_else(|| index.source_host())
        .unwrap_or_else(|| name.to_string())
}

fn link_line(link: &LinkEntry) -> String {
    if link.description.is_empty() {
        format!("- [{}]({})", link.label, link.url)
    } else {
        format!("- [{}]({}): {}", link.label, link.url, link.description)
    }
}

/// `to` expressed relative to the directory holding `from`
fn relative_to(from: &str, to: &str) -> String {
    let from_dir: Vec<&str> = match from.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    let to_parts: Vec<&str> = to.split('/').collect();
    let common = from_dir
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut parts: Vec<&str> = vec![".."; from_dir.len() - common];
    parts.extend(&to_parts[common..]);
    parts.join("/")
}

fn render_descriptor(
    index: &LinkIndex,
    sections: &[&Section],
    keywords: &KeywordSet,
    options: &BuildOptions,
) -> String {
    let mut out = String::new();
    out.push_str("---\n");
    out.push_str(&format!("name: {}\n", keywords.name));
    out.push_str("description: |\n");
    for line in keywords.descriptions.get(options.heuristic_level).lines() {
        if line.trim().is_empty() {
            out.push('\n');
        } else {
            out.push_str(&format!("  {}\n", line));
        }
    }
    out.push_str("---\n\n");

    out.push_str(&format!("# {}\n\n", display_title(index, &keywords.name)));
    if let Some(summary) = &index.summary {
        out.push_str(&format!("{}\n\n", summary));
    }
    if let Some(source) = &index.source_url {
        out.push_str(&format!("Source: {}\n\n", source));
    }

    out.push_str("# Trigger keywords\n");
    out.push_str(&keywords.keywords.join(", "));
    out.push_str("\n\n");

    out.push_str("## Outline\n\n");
    for section in sections {
        let count = section.links.len();
        let noun = if count == 1 { "link" } else { "links" };
        if options.by_section {
            out.push_str(&format!(
                "- [{}](references/sections/{}.md): {} {}\n",
                section.title, section.slug, count, noun
            ));
        } else {
            out.push_str(&format!(
                "- {}: {} {} under `references/links/{}/`\n",
                section.title, count, noun, section.slug
            ));
        }
    }
    out.push('\n');

    out.push_str("## How to use\n\n");
    out.push_str("- Start with `references/INDEX.md` to find the right page.\n");
    if options.snapshot_enabled {
        out.push_str(
            "- Read local snapshots under `references/sections/<section>/pages/` before fetching the web.\n",
        );
    } else {
        out.push_str("- No local snapshots were taken; follow the source links.\n");
    }
    out.push_str("- `references/catalog.json` lists every link with its snapshot status.\n");
    out
}

fn render_index(index: &LinkIndex, sections: &[&Section], rows: &[Row]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "# {} index\n\n",
        index.title.as_deref().unwrap_or("Reference")
    ));
    if let Some(summary) = &index.summary {
        out.push_str(&format!("> {}\n\n", summary));
    }
    for section in sections {
        out.push_str(&format!("## {}\n\n", section.title));
        let section_rows = rows.iter().filter(|r| std::ptr::eq(r.section, *section));
        let mut any = false;
        for row in section_rows {
            any = true;
            out.push_str(&link_line(row.link));
            out.push('\n');
            out.push_str(&format!(
                "  - Reference: `{}`\n",
                relative_to(INDEX_FILE, &row.paths.index)
            ));
            if row.has_page() {
                out.push_str(&format!(
                    "  - Snapshot: `{}`\n",
                    relative_to(INDEX_FILE, &row.paths.page)
                ));
            }
        }
        if !any {
            out.push_str("_No links._\n");
        }
        out.push('\n');
    }
    out
}

fn render_section_index(section: &Section, rows: &[&Row]) -> String {
    let mut out = format!("# {}\n\n", section.title);
    if rows.is_empty() {
        out.push_str("_No links._\n");
        return out;
    }
    for row in rows {
        out.push_str(&link_line(row.link));
        out.push('\n');
        if row.has_page() {
            out.push_str(&format!(
                "  - Snapshot: `{}`\n",
                relative_to(&row.paths.index, &row.paths.page)
            ));
        } else if let Some(reason) = row.status.reason() {
            out.push_str(&format!("  - Snapshot {}: {}\n", row.status.label(), reason));
        }
    }
    out
}

fn render_link_index(row: &Row) -> String {
    let mut out = format!("# {}\n\n", row.link.label);
    out.push_str(&format!("- Section: {}\n", row.section.title));
    out.push_str(&format!("- Source: {}\n", row.link.url));
    out.push_str(&format!("- Status: {}\n", row.status.label()));
    if let Some(reason) = row.status.reason() {
        out.push_str(&format!("- Reason: {}\n", reason));
    }
    if row.has_page() {
        out.push_str(&format!(
            "- Snapshot: `{}`\n",
            relative_to(&row.paths.index, &row.paths.page)
        ));
    }
    if !row.link.description.is_empty() {
        out.push_str(&format!("\n{}\n", row.link.description));
    }
    out
}

fn render_page(link: &LinkEntry, content: &str) -> String {
    let mut out = format!("> Source: {}\n\n", link.url);
    out.push_str(content.trim_end());
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::keywords::{derive_keywords, KeywordOptions};
    use crate::pipeline::parser::parse_llms_text;
    use chrono::TimeZone;

    const SAMPLE: &str = "# Sample Docs\n\
        > Summary line.\n\
        \n\
        ## Guides\n\
        - [Intro](https://example.com/intro): Start here\n\
        - [Setup](https://example.com/setup)\n\
        ## Optional\n\
        - [Blog](https://example.com/blog)\n";

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap()
    }

    fn options(snapshot_enabled: bool, by_section: bool) -> BuildOptions {
        BuildOptions {
            include_optional: false,
            by_section,
            heuristic_level: HeuristicLevel::Balanced,
            snapshot_enabled,
            generated_at: at(),
        }
    }

    fn ok_doc(link: &LinkEntry, body: &str) -> SnapshotDocument {
        SnapshotDocument {
            link: link.clone(),
            content: Some(body.to_string()),
            fetched_at: at(),
            status: SnapshotStatus::Ok,
            bytes: body.len(),
            truncated: false,
        }
    }

    fn build(snapshots: &[SnapshotDocument], opts: &BuildOptions) -> Bundle {
        let index = parse_llms_text(SAMPLE, Some("https://example.com/llms.txt")).unwrap();
        let keywords = derive_keywords(
            &index,
            snapshots,
            &KeywordOptions {
                level: opts.heuristic_level,
                include_optional: opts.include_optional,
                name_override: Some("sample-docs".to_string()),
            },
        );
        build_bundle(&index, snapshots, &keywords, opts).unwrap()
    }

    #[test]
    fn test_no_snapshot_bundle() {
        let bundle = build(&[], &options(false, true));

        assert!(bundle.file(DESCRIPTOR_FILE).is_some());
        assert!(bundle.file(INDEX_FILE).is_some());
        assert!(bundle.file("references/sections/guides.md").is_some());
        assert!(!bundle.files().any(|(p, _)| p.starts_with("references/provenance/")));
        assert!(bundle.provenance.is_empty());

        assert_eq!(bundle.catalog.entries.len(), 2);
        for entry in &bundle.catalog.entries {
            assert_eq!(entry.status, "skipped");
            assert_eq!(entry.reason.as_deref(), Some("disabled"));
            assert!(entry.page_path.is_none());
        }
        assert_eq!(bundle.manifest.counts.links, 2);
        assert_eq!(bundle.manifest.counts.snapshots_skipped, 2);
        assert!(!bundle.manifest.snapshot);
    }

    #[test]
    fn test_snapshot_pages_and_provenance() {
        let index = parse_llms_text(SAMPLE, Some("https://example.com/llms.txt")).unwrap();
        let intro = &index.sections[0].links[0];
        let setup = &index.sections[0].links[1];
        let docs = vec![
            ok_doc(intro, "# Intro\n\nBody"),
            SnapshotDocument {
                fetched_at: at(),
                ..SnapshotDocument::failed(setup, "HTTP 500 from https://example.com/setup")
            },
        ];
        let bundle = build(&docs, &options(true, true));

        let page = bundle
            .file("references/sections/guides/pages/intro.md")
            .unwrap();
        assert!(page.starts_with("> Source: https://example.com/intro\n"));
        assert!(page.contains("Body"));
        assert!(bundle
            .file("references/provenance/guides/intro.json")
            .is_some());
        assert!(bundle
            .file("references/provenance/guides/setup.json")
            .is_some());
        assert!(bundle
            .file("references/sections/guides/pages/setup.md")
            .is_none());

        let statuses: Vec<&str> = bundle.catalog.entries.iter().map(|e| e.status.as_str()).collect();
        assert_eq!(statuses, vec!["ok", "failed"]);
        assert_eq!(bundle.manifest.counts.snapshots_ok, 1);
        assert_eq!(bundle.manifest.counts.snapshots_failed, 1);
        assert_eq!(bundle.provenance[0].url, "https://example.com/intro");
        assert!(bundle.provenance[0].content_sha256.is_some());
    }

    #[test]
    fn test_optional_section_excluded() {
        let bundle = build(&[], &options(false, true));
        assert!(!bundle.catalog.entries.iter().any(|e| e.section == "Optional"));
        assert!(bundle.file("references/sections/optional.md").is_none());
        assert_eq!(bundle.manifest.counts.sections, 1);
    }

    #[test]
    fn test_descriptor_format() {
        let bundle = build(&[], &options(false, true));
        let descriptor = bundle.descriptor();
        assert!(descriptor.starts_with("---\nname: sample-docs\ndescription: |\n  "));
        let lines: Vec<&str> = descriptor.lines().collect();
        let idx = lines.iter().position(|l| *l == "# Trigger keywords").unwrap();
        let keywords: Vec<&str> = lines[idx + 1].split(", ").collect();
        assert!(keywords.contains(&"guides"));
        assert!(descriptor.contains("- [Guides](references/sections/guides.md): 2 links"));
    }

    #[test]
    fn test_by_link_layout() {
        let bundle = build(&[], &options(false, false));
        assert!(bundle.file("references/links/guides/intro.md").is_some());
        assert!(bundle.file("references/links/guides/setup.md").is_some());
        assert!(bundle.file("references/sections/guides.md").is_none());
        assert_eq!(
            bundle.catalog.entries[0].index_path,
            "references/links/guides/intro.md"
        );
    }

    #[test]
    fn test_manifest_lists_files_and_fingerprint() {
        let bundle = build(&[], &options(false, true));
        let manifest = &bundle.manifest;
        assert_eq!(manifest.descriptor_sha256, sha256_hex(bundle.descriptor().as_bytes()));
        assert_eq!(manifest.heuristic_level, HeuristicLevel::Balanced);
        assert_eq!(manifest.generated_at, at());

        let mut sorted = manifest.files.clone();
        sorted.sort();
        assert_eq!(manifest.files, sorted);
        assert!(manifest.files.contains(&DESCRIPTOR_FILE.to_string()));
        assert!(!manifest.files.contains(&MANIFEST_FILE.to_string()));

        let json: serde_json::Value =
            serde_json::from_str(bundle.file(MANIFEST_FILE).unwrap()).unwrap();
        assert_eq!(json["heuristic_level"], "balanced");
    }

    #[test]
    fn test_build_is_deterministic() {
        let a = build(&[], &options(false, true));
        let b = build(&[], &options(false, true));
        let fa: Vec<_> = a.files().collect();
        let fb: Vec<_> = b.files().collect();
        assert_eq!(fa, fb);
    }

    #[test]
    fn test_relative_to() {
        assert_eq!(
            relative_to("references/INDEX.md", "references/sections/a.md"),
            "sections/a.md"
        );
        assert_eq!(
            relative_to("references/links/a/b.md", "references/sections/a/pages/b.md"),
            "../../sections/a/pages/b.md"
        );
        assert_eq!(relative_to("SKILL.md", "references/INDEX.md"), "references/INDEX.md");
    }
}
