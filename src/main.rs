use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use skillgen::cli;

#[derive(Parser)]
#[command(name = "skillgen", version)]
#[command(about = "Turn an llms.txt link index into an installable agent skill", long_about = None)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a skill bundle and install it
    Generate {
        /// llms.txt URL, documentation base URL, or local file
        source: String,

        /// Also write the bundle to <OUT>/<name>
        #[arg(short, long)]
        out: Option<String>,

        /// Skill name (defaults to one derived from the llms.txt title)
        #[arg(long)]
        name: Option<String>,

        /// Process sections titled "Optional"
        #[arg(long)]
        include_optional: bool,

        /// Do not fetch linked documents
        #[arg(long)]
        no_snapshot: bool,

        /// Fetch documents hosted outside the llms.txt host and allow-list
        #[arg(long)]
        allow_external: bool,

        /// Description detail: compact, balanced, verbose
        #[arg(long)]
        heuristic_level: Option<String>,

        /// Write one reference file per link instead of per section
        #[arg(long)]
        by_link: bool,

        /// Install target: agents, amp, claude, codex, opencode, roo
        #[arg(long)]
        target: Option<String>,

        /// Install scope: user or project
        #[arg(long)]
        scope: Option<String>,

        /// Shorthand for --target claude
        #[arg(long, conflicts_with = "target")]
        claude: bool,

        /// Skip installation (requires --out)
        #[arg(long)]
        no_install: bool,

        /// Fail instead of replacing an existing skill directory
        #[arg(long)]
        no_overwrite: bool,

        /// Base URL for a local llms.txt file
        #[arg(long)]
        base_url: Option<String>,

        /// Path to config file (defaults to ./skillgen.toml or ~/.config/skillgen/config.toml)
        #[arg(long)]
        config: Option<String>,

        /// Abandon the run after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Parse an llms.txt and print it as JSON
    Parse {
        source: String,

        #[arg(long)]
        base_url: Option<String>,

        #[arg(long)]
        config: Option<String>,
    },
    /// Find the llms.txt for a documentation URL
    Discover { url: String },
    /// List installed skills
    List {
        /// Skills directory to inspect (overrides --target/--scope)
        #[arg(long)]
        root: Option<String>,

        #[arg(long)]
        target: Option<String>,

        #[arg(long)]
        scope: Option<String>,
    },
    /// Show install targets and their directories
    Targets,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Generate {
            source,
            out,
            name,
            include_optional,
            no_snapshot,
            allow_external,
            heuristic_level,
            by_link,
            target,
            scope,
            claude,
            no_install,
            no_overwrite,
            base_url,
            config,
            timeout,
        } => {
            cli::generate::run(
                source,
                out,
                name,
                include_optional,
                no_snapshot,
                allow_external,
                heuristic_level,
                by_link,
                target,
                scope,
                claude,
                no_install,
                no_overwrite,
                base_url,
                config,
                timeout,
            )
            .await?;
        }
        Commands::Parse {
            source,
            base_url,
            config,
        } => {
            cli::parse::run(source, base_url, config).await?;
        }
        Commands::Discover { url } => {
            cli::discover::run(url).await?;
        }
        Commands::List {
            root,
            target,
            scope,
        } => {
            cli::list::run(root, target, scope)?;
        }
        Commands::Targets => {
            cli::targets::run()?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generate_defaults() {
        let cli = Cli::try_parse_from(["skillgen", "generate", "https://example.com/llms.txt"]).unwrap();
        assert!(!cli.verbose);
        match cli.command {
            Commands::Generate {
                source,
                out,
                no_snapshot,
                claude,
                no_install,
                no_overwrite,
                heuristic_level,
                ..
            } => {
                assert_eq!(source, "https://example.com/llms.txt");
                assert!(out.is_none());
                assert!(!no_snapshot);
                assert!(!claude);
                assert!(!no_install);
                assert!(!no_overwrite);
                assert!(heuristic_level.is_none());
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn test_parse_generate_with_all_args() {
        let cli = Cli::try_parse_from([
            "skillgen",
            "generate",
            "./llms.txt",
            "--out",
            "dist",
            "--name",
            "acme",
            "--include-optional",
            "--no-snapshot",
            "--allow-external",
            "--heuristic-level",
            "verbose",
            "--by-link",
            "--target",
            "codex",
            "--scope",
            "project",
            "--no-install",
            "--no-overwrite",
            "--base-url",
            "https://acme.dev/llms.txt",
            "--timeout",
            "60",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Generate {
                out,
                name,
                include_optional,
                heuristic_level,
                by_link,
                target,
                scope,
                no_overwrite,
                base_url,
                timeout,
                ..
            } => {
                assert_eq!(out.unwrap(), "dist");
                assert_eq!(name.unwrap(), "acme");
                assert!(include_optional);
                assert_eq!(heuristic_level.unwrap(), "verbose");
                assert!(by_link);
                assert_eq!(target.unwrap(), "codex");
                assert_eq!(scope.unwrap(), "project");
                assert!(no_overwrite);
                assert_eq!(base_url.unwrap(), "https://acme.dev/llms.txt");
                assert_eq!(timeout, Some(60));
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn test_claude_conflicts_with_target() {
        let result = Cli::try_parse_from([
            "skillgen", "generate", "x.txt", "--claude", "--target", "roo",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_list_and_targets() {
        let cli = Cli::try_parse_from(["skillgen", "list", "--root", "/tmp/skills"]).unwrap();
        match cli.command {
            Commands::List { root, .. } => assert_eq!(root.unwrap(), "/tmp/skills"),
            _ => panic!("expected list"),
        }
        assert!(matches!(
            Cli::try_parse_from(["skillgen", "targets"]).unwrap().command,
            Commands::Targets
        ));
    }

    #[test]
    fn test_generate_requires_source() {
        assert!(Cli::try_parse_from(["skillgen", "generate"]).is_err());
    }

    #[test]
    fn test_parse_missing_subcommand() {
        assert!(Cli::try_parse_from(["skillgen"]).is_err());
    }
}
