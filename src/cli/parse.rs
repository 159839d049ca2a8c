use anyhow::{Context, Result};

use crate::config::Config;
use crate::fetch::client_impl::HttpFetcher;
use crate::fetch::discover::load_source;
use crate::pipeline::parser::parse_llms_text;

/// Print the parsed link index as JSON.
pub async fn run(source: String, base_url: Option<String>, config_path: Option<String>) -> Result<()> {
    let config = Config::load_with_path(config_path)?;
    let fetcher = HttpFetcher::new(&config.user_agent, config.request_timeout_secs, u64::MAX)?;

    let loaded = load_source(&fetcher, &source, base_url.as_deref()).await?;
    let index = parse_llms_text(&loaded.text, loaded.source_url.as_deref())
        .with_context(|| format!("Failed to parse {}", source))?;

    println!("{}", serde_json::to_string_pretty(&index)?);
    Ok(())
}
