use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info};

use super::bundle::{build_bundle, BuildOptions, Bundle};
use super::keywords::{derive_keywords, HeuristicLevel, KeywordOptions};
use super::parser::{parse_llms_text, LinkEntry, LinkIndex, ParseError};
use super::snapshot::{snapshot_all, CancelSignal, SnapshotDocument, SnapshotPlan, SnapshotPolicy};
use crate::config::{limits_for_level, FetchLimits};
use crate::fetch::client::Fetcher;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("generation cancelled before the bundle was complete")]
    Cancelled,

    #[error("failed to serialize bundle metadata: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Everything that shapes one generation run.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub name_override: Option<String>,
    pub include_optional: bool,
    pub by_section: bool,
    pub heuristic_level: HeuristicLevel,
    pub snapshot: bool,
    pub allow_external: bool,
    /// Hosts fetchable in addition to the llms.txt host
    pub domain_allowlist: Vec<String>,
    pub limits: FetchLimits,
    pub concurrency: usize,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            name_override: None,
            include_optional: false,
            by_section: true,
            heuristic_level: HeuristicLevel::Balanced,
            snapshot: true,
            allow_external: false,
            domain_allowlist: Vec::new(),
            limits: limits_for_level(HeuristicLevel::Balanced),
            concurrency: 8,
        }
    }
}

pub struct Generator {
    fetcher: Box<dyn Fetcher>,
    options: GenerateOptions,
    cancel: CancelSignal,
    generated_at: Option<DateTime<Utc>>,
}

impl Generator {
    pub fn new(fetcher: Box<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            options: GenerateOptions::default(),
            cancel: CancelSignal::never(),
            generated_at: None,
        }
    }

    pub fn with_options(mut self, options: GenerateOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Pin the generation timestamp (defaults to the time `generate` runs)
    pub fn with_generated_at(mut self, at: DateTime<Utc>) -> Self {
        self.generated_at = Some(at);
        self
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    /// Parse `text` and generate a bundle from it.
    pub async fn generate_from_text(
        &self,
        text: &str,
        source_url: Option<&str>,
    ) -> Result<Bundle, GenerateError> {
        let index = parse_llms_text(text, source_url)?;
        self.generate(&index).await
    }

    pub async fn generate(&self, index: &LinkIndex) -> Result<Bundle, GenerateError> {
        let opts = &self.options;
        if self.cancel.is_cancelled() {
            return Err(GenerateError::Cancelled);
        }

        let links: Vec<LinkEntry> = index
            .processed_links(opts.include_optional)
            .cloned()
            .collect();
        info!(
            "Generating skill from {} ({} sections, {} links to process)",
            index.source_url.as_deref().unwrap_or("<local>"),
            index.sections.len(),
            links.len()
        );

        let snapshots: Vec<SnapshotDocument> = if opts.snapshot {
            let plan = self.snapshot_plan(index);
            let docs = snapshot_all(&links, self.fetcher.as_ref(), &plan, &self.cancel).await;
            if self.cancel.is_cancelled() {
                return Err(GenerateError::Cancelled);
            }
            docs
        } else {
            debug!("Snapshotting disabled");
            Vec::new()
        };

        let keywords = derive_keywords(
            index,
            &snapshots,
            &KeywordOptions {
                level: opts.heuristic_level,
                include_optional: opts.include_optional,
                name_override: opts.name_override.clone(),
            },
        );

        let build = BuildOptions {
            include_optional: opts.include_optional,
            by_section: opts.by_section,
            heuristic_level: opts.heuristic_level,
            snapshot_enabled: opts.snapshot,
            generated_at: self.generated_at.unwrap_or_else(Utc::now),
        };
        let bundle = build_bundle(index, &snapshots, &keywords, &build)?;

        info!(
            "Generated skill {} ({} files, {} keywords)",
            bundle.name,
            bundle.file_count(),
            keywords.keywords.len()
        );
        Ok(bundle)
    }

    fn snapshot_plan(&self, index: &LinkIndex) -> SnapshotPlan {
        let opts = &self.options;
        let mut allow_list = opts.domain_allowlist.clone();
        if let Some(host) = index.source_host() {
            allow_list.push(host);
        }
        SnapshotPlan {
            policy: SnapshotPolicy {
                allow_external_domains: opts.allow_external,
                domain_allow_list: allow_list,
                max_page_chars: opts.limits.max_page_chars,
                max_bytes_per_doc: opts.limits.max_bytes_per_doc,
            },
            max_pages: opts.limits.max_pages,
            max_total_bytes: opts.limits.max_total_bytes,
            concurrency: opts.concurrency.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::client::MockFetcher;
    use crate::pipeline::snapshot::cancel_pair;
    use std::time::Duration;

    const TEXT: &str = "# Sample Docs\n> Summary line.\n\n## Guides\n- [Intro](https://example.com/intro)\n";

    #[tokio::test]
    async fn test_generate_with_snapshot() {
        let fetcher = MockFetcher::new().with_body("https://example.com/intro", "# Intro\n\nBody");
        let generator = Generator::new(Box::new(fetcher));

        let bundle = generator
            .generate_from_text(TEXT, Some("https://example.com/llms.txt"))
            .await
            .unwrap();

        assert_eq!(bundle.name, "sample-docs");
        assert!(bundle
            .file("references/sections/guides/pages/intro.md")
            .is_some());
        assert_eq!(bundle.manifest.counts.snapshots_ok, 1);
    }

    #[tokio::test]
    async fn test_byte_capped_document_recorded_as_truncated() {
        let fetcher = MockFetcher::new().with_body("https://example.com/intro", "x".repeat(100));
        let mut options = GenerateOptions::default();
        options.limits.max_bytes_per_doc = 10;
        let generator = Generator::new(Box::new(fetcher)).with_options(options);

        let bundle = generator
            .generate_from_text(TEXT, Some("https://example.com/llms.txt"))
            .await
            .unwrap();
        assert!(bundle.catalog.entries[0].truncated);
        assert!(bundle.provenance[0].truncated);
        assert_eq!(bundle.provenance[0].bytes, 10);
    }

    #[tokio::test]
    async fn test_generate_without_snapshot_never_fetches() {
        let generator = Generator::new(Box::new(MockFetcher::new())).with_options(GenerateOptions {
            snapshot: false,
            ..GenerateOptions::default()
        });

        let bundle = generator
            .generate_from_text(TEXT, Some("https://example.com/llms.txt"))
            .await
            .unwrap();
        assert_eq!(bundle.catalog.entries[0].reason.as_deref(), Some("disabled"));
        assert!(bundle.provenance.is_empty());
    }

    #[tokio::test]
    async fn test_generate_rejects_non_index() {
        let generator = Generator::new(Box::new(MockFetcher::new()));
        let err = generator
            .generate_from_text("just some prose\n", None)
            .await
            .unwrap_err();
        assert!(matches!(err, GenerateError::Parse(ParseError::NotALinkIndex)));
    }

    #[tokio::test]
    async fn test_generate_pinned_timestamp() {
        let at = DateTime::parse_from_rfc3339("2026-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let generator = Generator::new(Box::new(MockFetcher::new()))
            .with_options(GenerateOptions {
                snapshot: false,
                ..GenerateOptions::default()
            })
            .with_generated_at(at);

        let bundle = generator.generate_from_text(TEXT, None).await.unwrap();
        assert_eq!(bundle.manifest.generated_at, at);
        assert_eq!(bundle.catalog.generated_at, at);
    }

    #[tokio::test]
    async fn test_generate_cancelled_mid_fetch() {
        let fetcher = MockFetcher::new()
            .with_body("https://example.com/intro", "slow")
            .with_delay("https://example.com/intro", Duration::from_secs(30));
        let (handle, signal) = cancel_pair();
        let generator = Generator::new(Box::new(fetcher)).with_cancel(signal);

        let run = generator.generate_from_text(TEXT, Some("https://example.com/llms.txt"));
        let cancel = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.cancel();
        };
        let (result, _) = tokio::join!(run, cancel);
        assert!(matches!(result, Err(GenerateError::Cancelled)));
    }
}
