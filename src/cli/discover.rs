use anyhow::Result;

use crate::config::Config;
use crate::fetch::client_impl::HttpFetcher;
use crate::fetch::discover::discover_llms_url;

pub async fn run(url: String) -> Result<()> {
    let config = Config::load()?;
    let fetcher = HttpFetcher::new(&config.user_agent, config.request_timeout_secs, u64::MAX)?;
    let (found, _) = discover_llms_url(&fetcher, &url).await?;
    println!("{}", found);
    Ok(())
}
