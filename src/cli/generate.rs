use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;
use crate::fetch::client_impl::HttpFetcher;
use crate::fetch::discover::load_source;
use crate::pipeline::generator::{GenerateError, GenerateOptions, Generator};
use crate::pipeline::installer::{install, resolve_root, InstallScope, InstallTarget, InstallVariant};
use crate::pipeline::keywords::HeuristicLevel;
use crate::pipeline::parser::parse_llms_text;
use crate::pipeline::snapshot::{cancel_pair, CancelHandle};

/// Cancel the run on Ctrl-C or once `timeout` elapses.
fn spawn_cancel_watch(handle: CancelHandle, timeout: Option<Duration>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let deadline = async {
            match timeout {
                Some(t) => tokio::time::sleep(t).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => warn!("Interrupted, cancelling"),
            _ = deadline => warn!("Run timeout reached, cancelling"),
        }
        handle.cancel();
    })
}

#[allow(clippy::too_many_arguments)]
pub async fn run(
    source: String,
    out: Option<String>,
    name: Option<String>,
    include_optional: bool,
    no_snapshot: bool,
    allow_external: bool,
    heuristic_level: Option<String>,
    by_link: bool,
    target: Option<String>,
    scope: Option<String>,
    claude: bool,
    no_install: bool,
    no_overwrite: bool,
    base_url: Option<String>,
    config_path: Option<String>,
    timeout_override: Option<u64>,
) -> Result<()> {
    if no_install && out.is_none() {
        bail!("Nothing to write: pass --out or drop --no-install");
    }

    info!("Source: {}", source);
    if let Some(ref cfg) = config_path {
        info!("Config: {}", cfg);
    }

    let mut config = Config::load_with_path(config_path)?;

    // CLI flags win over the config file
    if include_optional {
        info!("CLI override: include_optional = true");
        config.include_optional = true;
    }
    if no_snapshot {
        info!("CLI override: snapshot = false");
        config.snapshot = false;
    }
    if allow_external {
        info!("CLI override: allow_external = true");
        config.allow_external = true;
    }
    if by_link {
        info!("CLI override: by_section = false");
        config.by_section = false;
    }
    if let Some(secs) = timeout_override {
        info!("CLI override: run_timeout_secs = {}", secs);
        config.run_timeout_secs = Some(secs);
    }
    let level = match heuristic_level {
        Some(ref level) => HeuristicLevel::from_str(level)?,
        None => config.get_heuristic_level(),
    };
    info!("Heuristic level: {}", level);

    let limits = config.fetch_limits(level);
    let fetcher = HttpFetcher::new(
        &config.user_agent,
        config.request_timeout_secs,
        limits.max_bytes_per_doc,
    )?;

    let loaded = load_source(&fetcher, &source, base_url.as_deref()).await?;
    let index = parse_llms_text(&loaded.text, loaded.source_url.as_deref())
        .with_context(|| format!("Failed to parse {}", source))?;
    info!(
        "Parsed {} sections with {} links",
        index.sections.len(),
        index.link_count()
    );

    let options = GenerateOptions {
        name_override: name,
        include_optional: config.include_optional,
        by_section: config.by_section,
        heuristic_level: level,
        snapshot: config.snapshot,
        allow_external: config.allow_external,
        domain_allowlist: config.domain_allowlist.clone(),
        limits,
        concurrency: config.concurrency,
    };

    let (handle, signal) = cancel_pair();
    let watch = spawn_cancel_watch(handle, config.run_timeout_secs.map(Duration::from_secs));
    let generator = Generator::new(Box::new(fetcher))
        .with_options(options)
        .with_cancel(signal);
    let result = generator.generate(&index).await;
    watch.abort();

    let bundle = match result {
        Ok(bundle) => bundle,
        Err(GenerateError::Cancelled) => bail!("Generation cancelled; nothing was written"),
        Err(e) => return Err(e.into()),
    };

    if no_overwrite {
        info!("CLI override: overwrite = false");
    }

    if let Some(out_dir) = out {
        let target = InstallTarget::new(&out_dir, &bundle.name).with_overwrite(!no_overwrite);
        let report = install(&bundle, &target)
            .with_context(|| format!("Failed to write bundle to {}", out_dir))?;
        println!("Wrote {} ({} files)", report.path.display(), report.files);
    }

    if no_install {
        return Ok(());
    }

    let variant = if claude {
        InstallVariant::Claude
    } else {
        match target {
            Some(ref t) => InstallVariant::from_str(t)?,
            None => InstallVariant::default(),
        }
    };
    let scope = match scope {
        Some(ref s) => InstallScope::from_str(s)?,
        None => InstallScope::default(),
    };
    let root: PathBuf = resolve_root(variant, scope)?;
    info!("Installing for {} into {}", variant, root.display());

    let target = InstallTarget::new(root, &bundle.name).with_overwrite(!no_overwrite);
    let report = install(&bundle, &target)?;
    println!("Installed {} ({} files)", report.path.display(), report.files);
    Ok(())
}
