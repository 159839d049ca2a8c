//! Fetching and normalizing linked documents.
//!
//! [`snapshot`] handles one link and never touches shared state.
//! [`snapshot_all`] fans out over a bounded number of in-flight fetches and
//! hands results back in source order, whatever order they complete in.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use scraper::{Html, Selector};
use serde::Serialize;
use std::fmt;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

use super::parser::LinkEntry;
use crate::fetch::client::Fetcher;
use crate::util::normalize_space;

/// Why a link was not fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// Snapshotting is turned off for the run
    Disabled,
    DomainNotAllowed,
    /// More eligible links than `max_pages`
    PageLimit,
    /// Fetched, but storing it would exceed `max_total_bytes`
    TotalBytesExceeded,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Disabled => "disabled",
            SkipReason::DomainNotAllowed => "domain-not-allowed",
            SkipReason::PageLimit => "page-limit",
            SkipReason::TotalBytesExceeded => "total-bytes-exceeded",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotStatus {
    Ok,
    Skipped(SkipReason),
    Failed(String),
}

impl SnapshotStatus {
    /// Short label used in the catalog and provenance records
    pub fn label(&self) -> &'static str {
        match self {
            SnapshotStatus::Ok => "ok",
            SnapshotStatus::Skipped(_) => "skipped",
            SnapshotStatus::Failed(_) => "failed",
        }
    }

    pub fn reason(&self) -> Option<String> {
        match self {
            SnapshotStatus::Ok => None,
            SnapshotStatus::Skipped(reason) => Some(reason.to_string()),
            SnapshotStatus::Failed(reason) => Some(reason.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotDocument {
    pub link: LinkEntry,
    /// Normalized text; `None` unless the status is `Ok`
    pub content: Option<String>,
    /// When the link was evaluated (fetch completion for fetched links)
    pub fetched_at: DateTime<Utc>,
    pub status: SnapshotStatus,
    /// Raw bytes received from the fetcher
    pub bytes: usize,
    /// Body hit `max_bytes_per_doc` or content was cut at `max_page_chars`
    pub truncated: bool,
}

impl SnapshotDocument {
    pub fn skipped(link: &LinkEntry, reason: SkipReason) -> Self {
        Self {
            link: link.clone(),
            content: None,
            fetched_at: Utc::now(),
            status: SnapshotStatus::Skipped(reason),
            bytes: 0,
            truncated: false,
        }
    }

    pub fn failed(link: &LinkEntry, reason: impl Into<String>) -> Self {
        Self {
            link: link.clone(),
            content: None,
            fetched_at: Utc::now(),
            status: SnapshotStatus::Failed(reason.into()),
            bytes: 0,
            truncated: false,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == SnapshotStatus::Ok
    }
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotPolicy {
    pub allow_external_domains: bool,
    /// Hosts that may be fetched. Subdomains of a listed host match too.
    pub domain_allow_list: Vec<String>,
    /// Characters kept per document; 0 means unlimited
    pub max_page_chars: usize,
    /// Raw bytes kept per document; 0 means unlimited
    pub max_bytes_per_doc: u64,
}

impl SnapshotPolicy {
    pub fn allows(&self, url: &str) -> bool {
        if self.allow_external_domains {
            return true;
        }
        let host = match Url::parse(url).ok().and_then(|u| u.host_str().map(|h| h.to_lowercase())) {
            Some(host) => host,
            None => return false,
        };
        self.domain_allow_list.iter().any(|entry| {
            let entry = entry.trim().trim_start_matches("*.").to_lowercase();
            !entry.is_empty() && (host == entry || host.ends_with(&format!(".{}", entry)))
        })
    }
}

/// Run-wide budget for [`snapshot_all`].
#[derive(Debug, Clone)]
pub struct SnapshotPlan {
    pub policy: SnapshotPolicy,
    /// Eligible links past this count are skipped without fetching; 0 means unlimited
    pub max_pages: usize,
    /// Cumulative raw bytes kept across documents; 0 means unlimited
    pub max_total_bytes: u64,
    pub concurrency: usize,
}

/// Cancellation side of a run. Cheap to clone; never fires once the
/// [`CancelHandle`] is dropped without cancelling.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Create a linked handle/signal pair.
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl CancelSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the run has been cancelled
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Handle dropped without cancelling
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Fetch and normalize one link.
pub async fn snapshot(
    link: &LinkEntry,
    fetcher: &dyn Fetcher,
    policy: &SnapshotPolicy,
) -> SnapshotDocument {
    if !policy.allows(&link.url) {
        debug!("Skipping {}: domain not allowed", link.url);
        return SnapshotDocument::skipped(link, SkipReason::DomainNotAllowed);
    }

    match fetcher.fetch(&link.url).await {
        Ok(mut body) => {
            let capped = cap_body(&mut body, policy.max_bytes_per_doc);
            if capped {
                debug!("{} reached {} bytes, truncated", link.url, policy.max_bytes_per_doc);
            }
            let bytes = body.len();
            let (content, cut) = normalize_content(&body, policy.max_page_chars);
            SnapshotDocument {
                link: link.clone(),
                content: Some(content),
                fetched_at: Utc::now(),
                status: SnapshotStatus::Ok,
                bytes,
                truncated: capped || cut,
            }
        }
        Err(e) => {
            warn!("Snapshot failed for {}: {}", link.url, e);
            SnapshotDocument::failed(link, e.to_string())
        }
    }
}

/// Cut `body` to `cap` bytes without splitting a UTF-8 sequence.
///
/// Returns true when the body reached the cap, which is also the case for a
/// fetcher that already stopped reading there.
fn cap_body(body: &mut Vec<u8>, cap: u64) -> bool {
    let cap = match usize::try_from(cap) {
        Ok(0) | Err(_) => return false,
        Ok(cap) => cap,
    };
    if body.len() < cap {
        return false;
    }
    body.truncate(cap);
    if let Err(e) = std::str::from_utf8(body) {
        // Only an incomplete trailing sequence, not invalid bytes mid-body
        if e.error_len().is_none() {
            body.truncate(e.valid_up_to());
        }
    }
    true
}

/// Snapshot every link, at most `plan.concurrency` at a time.
///
/// The returned vector has one document per input link, in input order.
pub async fn snapshot_all(
    links: &[LinkEntry],
    fetcher: &dyn Fetcher,
    plan: &SnapshotPlan,
    cancel: &CancelSignal,
) -> Vec<SnapshotDocument> {
    let mut slots: Vec<Option<SnapshotDocument>> = vec![None; links.len()];
    let mut queued = Vec::new();

    for (idx, link) in links.iter().enumerate() {
        if !plan.policy.allows(&link.url) {
            slots[idx] = Some(SnapshotDocument::skipped(link, SkipReason::DomainNotAllowed));
        } else if plan.max_pages > 0 && queued.len() >= plan.max_pages {
            slots[idx] = Some(SnapshotDocument::skipped(link, SkipReason::PageLimit));
        } else {
            queued.push((idx, link));
        }
    }

    info!(
        "Snapshotting {} of {} links ({} in flight)",
        queued.len(),
        links.len(),
        plan.concurrency.max(1)
    );

    let policy = &plan.policy;
    let fetched: Vec<(usize, SnapshotDocument)> = stream::iter(queued)
        .map(|(idx, link)| async move {
            let doc = tokio::select! {
                doc = snapshot(link, fetcher, policy) => doc,
                _ = cancel.cancelled() => SnapshotDocument::failed(link, "cancelled"),
            };
            (idx, doc)
        })
        .buffer_unordered(plan.concurrency.max(1))
        .collect()
        .await;

    for (idx, doc) in fetched {
        slots[idx] = Some(doc);
    }

    let mut total: u64 = 0;
    let mut docs = Vec::with_capacity(links.len());
    for (idx, slot) in slots.into_iter().enumerate() {
        let doc = slot.unwrap_or_else(|| SnapshotDocument::failed(&links[idx], "cancelled"));
        if doc.is_ok() && plan.max_total_bytes > 0 {
            let size = doc.bytes as u64;
            if total + size > plan.max_total_bytes {
                warn!(
                    "max_total_bytes limit reached; dropping snapshot of {}",
                    doc.link.url
                );
                docs.push(SnapshotDocument::skipped(
                    &doc.link,
                    SkipReason::TotalBytesExceeded,
                ));
                continue;
            }
            total += size;
        }
        docs.push(doc);
    }
    docs
}

/// Decode and clean a fetched body. Returns the text and whether it was cut.
pub fn normalize_content(body: &[u8], max_chars: usize) -> (String, bool) {
    let decoded = String::from_utf8_lossy(body);
    let mut text = decoded
        .trim_start_matches('\u{feff}')
        .replace("\r\n", "\n")
        .replace('\r', "\n");

    if looks_like_html(&text) {
        text = html_to_text(&text);
    }

    if max_chars > 0 {
        if let Some((cut, _)) = text.char_indices().nth(max_chars) {
            text.truncate(cut);
            return (text, true);
        }
    }
    (text, false)
}

fn looks_like_html(text: &str) -> bool {
    let head: String = text.trim_start().chars().take(512).collect::<String>().to_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html") || head.contains("<body")
}

/// Readable text of an HTML page, one line per text node.
fn html_to_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let root = ["main", "article", "body"]
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|sel| doc.select(&sel).next())
        .unwrap_or_else(|| doc.root_element());

    let mut lines = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value().as_element().is_some_and(|e| {
                matches!(
                    e.name(),
                    "script" | "style" | "noscript" | "template" | "nav" | "svg"
                )
            })
        });
        if hidden {
            continue;
        }
        let line = normalize_space(text);
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines.join("\n")
}
