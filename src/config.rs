use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::pipeline::keywords::HeuristicLevel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Fetch and store linked documents (default: true)
    #[serde(default = "default_true")]
    pub snapshot: bool,

    /// Process sections titled "Optional" (default: false)
    #[serde(default)]
    pub include_optional: bool,

    /// Fetch from hosts outside the llms.txt host and `domain_allowlist`
    #[serde(default)]
    pub allow_external: bool,

    /// Extra hosts that may be fetched; subdomains match too
    #[serde(default)]
    pub domain_allowlist: Vec<String>,

    /// "compact", "balanced" or "verbose" (default: "balanced")
    #[serde(default = "default_heuristic_level")]
    pub heuristic_level: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// One index per section (true) or one per link (false)
    #[serde(default = "default_true")]
    pub by_section: bool,

    /// Maximum number of fetches in flight (default: 8)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-request timeout in seconds (default: 30)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Abandon the whole run after this many seconds
    #[serde(default)]
    pub run_timeout_secs: Option<u64>,

    /// Optional overrides for the per-level fetch limits
    #[serde(default)]
    pub limits: LimitOverrides,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitOverrides {
    #[serde(default)]
    pub max_pages: Option<usize>,
    #[serde(default)]
    pub max_page_chars: Option<usize>,
    #[serde(default)]
    pub max_total_bytes: Option<u64>,
    #[serde(default)]
    pub max_bytes_per_doc: Option<u64>,
}

/// Fetch budget for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchLimits {
    pub max_pages: usize,
    pub max_page_chars: usize,
    pub max_total_bytes: u64,
    pub max_bytes_per_doc: u64,
}

/// Fetch budget for a heuristic level. Larger levels mirror more content.
pub fn limits_for_level(level: HeuristicLevel) -> FetchLimits {
    match level {
        HeuristicLevel::Compact => FetchLimits {
            max_pages: 150,
            max_page_chars: 100_000,
            max_total_bytes: 20_000_000,
            max_bytes_per_doc: 1_000_000,
        },
        HeuristicLevel::Balanced => FetchLimits {
            max_pages: 500,
            max_page_chars: 200_000,
            max_total_bytes: 100_000_000,
            max_bytes_per_doc: 5_000_000,
        },
        HeuristicLevel::Verbose => FetchLimits {
            max_pages: 1200,
            max_page_chars: 400_000,
            max_total_bytes: 250_000_000,
            max_bytes_per_doc: 10_000_000,
        },
    }
}

fn default_true() -> bool {
    true
}

fn default_heuristic_level() -> String {
    "balanced".to_string()
}

fn default_user_agent() -> String {
    format!("skillgen/{}", env!("CARGO_PKG_VERSION"))
}

fn default_concurrency() -> usize {
    8
}

fn default_request_timeout() -> u64 {
    30
}

impl Config {
    /// Load config from the working directory or user config directory
    pub fn load() -> Result<Self> {
        Self::load_with_path(None)
    }

    /// Load configuration from a specific path, or use default search paths
    pub fn load_with_path(path: Option<String>) -> Result<Self> {
        // An explicit path must exist and parse
        if let Some(config_path) = path {
            debug!("Loading config from explicit path: {}", config_path);
            return Self::load_from_path(&config_path)
                .with_context(|| format!("failed to load config from {}", config_path));
        }

        if let Ok(config) = Self::load_from_path("skillgen.toml") {
            debug!("Loaded config from ./skillgen.toml");
            return Ok(config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("skillgen").join("config.toml");
            if let Ok(config) = Self::load_from_path(&config_path) {
                debug!("Loaded config from {:?}", config_path);
                return Ok(config);
            }
        }

        debug!("Using default config");
        Ok(Self::default())
    }

    fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Parse `heuristic_level`, falling back to balanced for unknown values
    pub fn get_heuristic_level(&self) -> HeuristicLevel {
        HeuristicLevel::parse_lenient(&self.heuristic_level)
    }

    /// Level limits with any configured overrides applied
    pub fn fetch_limits(&self, level: HeuristicLevel) -> FetchLimits {
        let mut limits = limits_for_level(level);
        if let Some(v) = self.limits.max_pages {
            limits.max_pages = v;
        }
        if let Some(v) = self.limits.max_page_chars {
            limits.max_page_chars = v;
        }
        if let Some(v) = self.limits.max_total_bytes {
            limits.max_total_bytes = v;
        }
        if let Some(v) = self.limits.max_bytes_per_doc {
            limits.max_bytes_per_doc = v;
        }
        limits
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snapshot: true,
            include_optional: false,
            allow_external: false,
            domain_allowlist: Vec::new(),
            heuristic_level: default_heuristic_level(),
            user_agent: default_user_agent(),
            by_section: true,
            concurrency: default_concurrency(),
            request_timeout_secs: default_request_timeout(),
            run_timeout_secs: None,
            limits: LimitOverrides::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.snapshot);
        assert!(!config.include_optional);
        assert!(!config.allow_external);
        assert_eq!(config.heuristic_level, "balanced");
        assert!(config.user_agent.starts_with("skillgen/"));
        assert!(config.by_section);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("heuristic_level = \"balanced\""));
        assert!(toml_str.contains("snapshot = true"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("allow_external = true\n").unwrap();
        assert!(config.allow_external);
        assert!(config.snapshot);
        assert_eq!(config.concurrency, 8);
    }

    #[test]
    fn test_limits_for_level_profiles_are_distinct() {
        let compact = limits_for_level(HeuristicLevel::Compact);
        let balanced = limits_for_level(HeuristicLevel::Balanced);
        let verbose = limits_for_level(HeuristicLevel::Verbose);

        assert!(compact.max_pages < balanced.max_pages && balanced.max_pages < verbose.max_pages);
        assert!(compact.max_total_bytes < balanced.max_total_bytes);
        assert!(balanced.max_total_bytes < verbose.max_total_bytes);
        assert!(compact.max_bytes_per_doc < balanced.max_bytes_per_doc);
        assert!(balanced.max_bytes_per_doc < verbose.max_bytes_per_doc);
        assert!(compact.max_page_chars < balanced.max_page_chars);
        assert!(balanced.max_page_chars < verbose.max_page_chars);
    }

    #[test]
    fn test_unknown_level_defaults_to_balanced() {
        let mut config = Config::default();
        config.heuristic_level = "unknown-level".to_string();
        assert_eq!(config.get_heuristic_level(), HeuristicLevel::Balanced);
        assert_eq!(
            config.fetch_limits(config.get_heuristic_level()),
            limits_for_level(HeuristicLevel::Balanced)
        );
    }

    #[test]
    fn test_limit_overrides_apply() {
        let mut config = Config::default();
        config.limits.max_pages = Some(3);
        let limits = config.fetch_limits(HeuristicLevel::Verbose);
        assert_eq!(limits.max_pages, 3);
        assert_eq!(limits.max_page_chars, 400_000);
    }

    #[test]
    fn test_load_with_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("skillgen.toml");
        fs::write(
            &path,
            "heuristic_level = \"verbose\"\ndomain_allowlist = [\"cdn.example.net\"]\n",
        )
        .unwrap();

        let config = Config::load_with_path(Some(path.to_string_lossy().to_string())).unwrap();
        assert_eq!(config.get_heuristic_level(), HeuristicLevel::Verbose);
        assert_eq!(config.domain_allowlist, vec!["cdn.example.net".to_string()]);
    }

    #[test]
    fn test_load_with_missing_explicit_path_fails() {
        let result = Config::load_with_path(Some("/nonexistent/skillgen.toml".to_string()));
        assert!(result.is_err());
    }
}
