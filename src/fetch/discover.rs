use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::{debug, info};
use url::Url;

use super::client::Fetcher;
use crate::pipeline::parser::parse_llms_text;

/// A loaded `llms.txt` document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSource {
    pub text: String,
    /// URL the text came from, or the base URL given for a local file
    pub source_url: Option<String>,
}

/// Where to look for `llms.txt` given a user-supplied URL.
///
/// A URL ending in `.txt` is taken as is. Anything else is treated as a
/// documentation base: `<url>/llms.txt`, then `<origin>/llms.txt`, then
/// `<origin>/.well-known/llms.txt`.
pub fn candidate_urls(input: &str) -> Result<Vec<String>> {
    let url = Url::parse(input.trim()).with_context(|| format!("Invalid URL: {}", input))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("Unsupported URL scheme '{}' in {}", url.scheme(), input);
    }

    let mut without_fragment = url.clone();
    without_fragment.set_fragment(None);
    if url.path().to_lowercase().ends_with(".txt") {
        return Ok(vec![without_fragment.to_string()]);
    }

    let origin = url.origin().ascii_serialization();
    let base = {
        let mut base = without_fragment;
        base.set_query(None);
        base.to_string().trim_end_matches('/').to_string()
    };

    let mut candidates = Vec::new();
    for candidate in [
        format!("{}/llms.txt", base),
        format!("{}/llms.txt", origin),
        format!("{}/.well-known/llms.txt", origin),
    ] {
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }
    Ok(candidates)
}

fn decode(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body).into_owned();
    match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    }
}

/// Find the `llms.txt` for `input` and return its URL and text.
///
/// The first candidate that fetches and parses as a link index wins.
pub async fn discover_llms_url(fetcher: &dyn Fetcher, input: &str) -> Result<(String, String)> {
    let candidates = candidate_urls(input)?;
    let mut attempts = Vec::new();

    for candidate in &candidates {
        debug!("Trying {}", candidate);
        match fetcher.fetch(candidate).await {
            Ok(body) => {
                let text = decode(&body);
                if parse_llms_text(&text, Some(candidate)).is_ok() {
                    info!("Found llms.txt at {}", candidate);
                    return Ok((candidate.clone(), text));
                }
                attempts.push(format!("{}: not an llms.txt link index", candidate));
            }
            Err(e) => attempts.push(e.to_string()),
        }
    }

    bail!(
        "No llms.txt found for {}. Tried:\n  {}",
        input,
        attempts.join("\n  ")
    )
}

/// Load `source` from a local file or by discovery over HTTP.
///
/// For local files `base_url` becomes the source URL, so relative links
/// resolve and the host joins the allow-list.
pub async fn load_source(
    fetcher: &dyn Fetcher,
    source: &str,
    base_url: Option<&str>,
) -> Result<LoadedSource> {
    let path = Path::new(source);
    if path.is_file() {
        let body = std::fs::read(path).with_context(|| format!("Failed to read {}", source))?;
        debug!("Read {} bytes from {}", body.len(), source);
        return Ok(LoadedSource {
            text: decode(&body),
            source_url: base_url.map(|b| b.to_string()),
        });
    }

    if !source.contains("://") {
        bail!("{} is neither a readable file nor a URL", source);
    }

    let (url, text) = discover_llms_url(fetcher, source).await?;
    Ok(LoadedSource {
        text,
        source_url: Some(url),
    })
}
