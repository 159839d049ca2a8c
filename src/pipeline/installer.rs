//! Writing a bundle to disk and locating agent skill directories.
//!
//! Installation is staged: files are written into a temporary directory
//! created inside the destination root, then promoted with a rename. The
//! previous bundle, if any, is moved aside first and restored if promotion
//! fails, so readers see either the old tree or the new one.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::bundle::{Bundle, Manifest, DESCRIPTOR_FILE, MANIFEST_FILE};

const STAGING_PREFIX: &str = ".skillgen-staging-";

const WINDOWS_RESERVED: &[&str] = &["con", "nul", "aux", "prn"];

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("cannot write to {path}: {source}")]
    NotWritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("'{name}' cannot be used as a skill directory name")]
    ReservedName { name: String },

    #[error("{path} already exists and overwriting is disabled")]
    AlreadyExists { path: PathBuf },
}

fn not_writable(path: &Path) -> impl FnOnce(io::Error) -> InstallError + '_ {
    move |source| InstallError::NotWritable {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTarget {
    pub root_dir: PathBuf,
    pub skill_name: String,
    /// Replace an existing skill directory (the default) or refuse to
    pub overwrite: bool,
}

impl InstallTarget {
    pub fn new(root_dir: impl Into<PathBuf>, skill_name: impl Into<String>) -> Self {
        Self {
            root_dir: root_dir.into(),
            skill_name: skill_name.into(),
            overwrite: true,
        }
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn destination(&self) -> PathBuf {
        self.root_dir.join(&self.skill_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub path: PathBuf,
    pub files: usize,
    /// A previous bundle was replaced
    pub replaced: bool,
}

/// Reject names that would escape the root, hide the directory, or collide
/// with device names on Windows.
pub fn validate_skill_name(name: &str) -> Result<(), InstallError> {
    let reserved = || InstallError::ReservedName {
        name: name.to_string(),
    };
    if name.trim().is_empty() || name == "." || name == ".." || name.starts_with('.') {
        return Err(reserved());
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        return Err(reserved());
    }
    let lower = name.to_lowercase();
    let stem = lower.split('.').next().unwrap_or_default();
    let numbered = |prefix: &str| {
        stem.strip_prefix(prefix)
            .is_some_and(|n| n.len() == 1 && n.chars().all(|c| ('1'..='9').contains(&c)))
    };
    if WINDOWS_RESERVED.contains(&stem) || numbered("com") || numbered("lpt") {
        return Err(reserved());
    }
    Ok(())
}

/// Install `bundle` at `target.root_dir/target.skill_name`.
///
/// An existing directory at the destination is replaced in full: files from
/// the previous bundle that the new one does not contain are gone afterwards.
/// On error the previous destination is left as it was. With
/// `overwrite` off an existing destination is an error and nothing is written.
pub fn install(bundle: &Bundle, target: &InstallTarget) -> Result<InstallReport, InstallError> {
    validate_skill_name(&target.skill_name)?;

    let destination = target.destination();
    if !target.overwrite && destination.symlink_metadata().is_ok() {
        return Err(InstallError::AlreadyExists { path: destination });
    }

    let root = &target.root_dir;
    fs::create_dir_all(root).map_err(not_writable(root))?;

    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(root)
        .map_err(not_writable(root))?;
    let staged = staging.path().join(&target.skill_name);

    let mut files = 0;
    for (relative, contents) in bundle.files() {
        let path = staged.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(not_writable(parent))?;
        }
        fs::write(&path, contents).map_err(not_writable(&path))?;
        files += 1;
    }
    debug!("Staged {} files in {}", files, staged.display());

    let replaced = promote(staging, &staged, &destination, |from, to| fs::rename(from, to))?;

    info!("Installed {} ({} files)", destination.display(), files);
    Ok(InstallReport {
        path: destination,
        files,
        replaced,
    })
}

/// Swap `staged` in at `destination`, parking any previous tree in the
/// staging directory. Returns whether a previous tree was replaced.
fn promote<F>(
    staging: TempDir,
    staged: &Path,
    destination: &Path,
    mut rename: F,
) -> Result<bool, InstallError>
where
    F: FnMut(&Path, &Path) -> io::Result<()>,
{
    let backup = staging.path().join(".previous");
    let replaced = destination.symlink_metadata().is_ok();
    if replaced {
        rename(destination, &backup).map_err(not_writable(destination))?;
    }

    if let Err(e) = rename(staged, destination) {
        if replaced {
            if let Err(restore) = rename(&backup, destination) {
                // The staging directory now holds the only copy of the old bundle
                let kept = staging.keep();
                warn!(
                    "Could not restore previous bundle at {}: {}. It was kept at {}",
                    destination.display(),
                    restore,
                    kept.join(".previous").display()
                );
            }
        }
        return Err(not_writable(destination)(e));
    }

    // Dropping the staging directory removes the previous bundle with it
    if let Err(e) = staging.close() {
        warn!("Could not remove staging directory: {}", e);
    }
    Ok(replaced)
}

/// Agent runtimes that read skill directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InstallVariant {
    #[default]
    Agents,
    Amp,
    Claude,
    Codex,
    OpenCode,
    Roo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstallScope {
    /// Under the home directory
    #[default]
    User,
    /// Under the current working directory
    Project,
}

impl InstallVariant {
    pub const ALL: [InstallVariant; 6] = [
        InstallVariant::Agents,
        InstallVariant::Amp,
        InstallVariant::Claude,
        InstallVariant::Codex,
        InstallVariant::OpenCode,
        InstallVariant::Roo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InstallVariant::Agents => "agents",
            InstallVariant::Amp => "amp",
            InstallVariant::Claude => "claude",
            InstallVariant::Codex => "codex",
            InstallVariant::OpenCode => "opencode",
            InstallVariant::Roo => "roo",
        }
    }

    /// Skills directory for this runtime. Pure; callers supply the
    /// environment.
    pub fn root(
        &self,
        scope: InstallScope,
        home: &Path,
        cwd: &Path,
        codex_home: Option<&Path>,
    ) -> PathBuf {
        match (self, scope) {
            (InstallVariant::Agents, InstallScope::User) => home.join(".agents").join("skills"),
            (InstallVariant::Agents, InstallScope::Project) => cwd.join(".agents").join("skills"),
            (InstallVariant::Amp, InstallScope::User) => {
                home.join(".config").join("agents").join("skills")
            }
            (InstallVariant::Amp, InstallScope::Project) => cwd.join(".agents").join("skills"),
            (InstallVariant::Claude, InstallScope::User) => home.join(".claude").join("skills"),
            (InstallVariant::Claude, InstallScope::Project) => cwd.join(".claude").join("skills"),
            (InstallVariant::Codex, InstallScope::User) => match codex_home {
                Some(dir) => dir.join("skills"),
                None => home.join(".codex").join("skills"),
            },
            (InstallVariant::Codex, InstallScope::Project) => cwd.join(".codex").join("skills"),
            (InstallVariant::OpenCode, InstallScope::User) => {
                home.join(".config").join("opencode").join("skill")
            }
            (InstallVariant::OpenCode, InstallScope::Project) => {
                cwd.join(".opencode").join("skill")
            }
            (InstallVariant::Roo, InstallScope::User) => home.join(".roo").join("skills"),
            (InstallVariant::Roo, InstallScope::Project) => cwd.join(".roo").join("skills"),
        }
    }
}

impl fmt::Display for InstallVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for InstallVariant {
    type Err = anyhow::Error;

    /// Accepts target names and the client names people tend to type
    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_lowercase().replace(['_', ' '], "-");
        match key.as_str() {
            "agents" | "agent" | "default" => Ok(InstallVariant::Agents),
            "amp" | "sourcegraph" | "sourcegraph-amp" => Ok(InstallVariant::Amp),
            "claude" | "claude-code" | "claudecode" | "claude-desktop" => {
                Ok(InstallVariant::Claude)
            }
            "codex" | "codex-cli" | "openai-codex" => Ok(InstallVariant::Codex),
            "opencode" | "open-code" | "opencode-ai" => Ok(InstallVariant::OpenCode),
            "roo" | "roo-code" | "roocode" | "roo-cline" => Ok(InstallVariant::Roo),
            _ => bail!(
                "Unknown install target: {} (expected one of: agents, amp, claude, codex, opencode, roo)",
                s
            ),
        }
    }
}

impl FromStr for InstallScope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "user" | "global" => Ok(InstallScope::User),
            "project" | "local" => Ok(InstallScope::Project),
            _ => bail!("Unknown install scope: {} (expected user or project)", s),
        }
    }
}

/// Resolve the skills directory for `variant` from the process environment
/// (`HOME`, `CODEX_HOME` and the working directory).
pub fn resolve_root(variant: InstallVariant, scope: InstallScope) -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    let cwd = std::env::current_dir().context("Could not determine current directory")?;
    let codex_home = std::env::var_os("CODEX_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    Ok(variant.root(scope, &home, &cwd, codex_home.as_deref()))
}

/// A skill directory found under an install root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledSkill {
    pub name: String,
    pub path: PathBuf,
    pub source_url: Option<String>,
    pub generated_at: Option<DateTime<Utc>>,
}

/// Skills under `root`, sorted by name. A missing root is an empty list.
///
/// Directories without a descriptor are ignored. A descriptor without a
/// readable manifest is still listed, just without source details.
pub fn list_installed(root: &Path) -> Result<Vec<InstalledSkill>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut skills = Vec::new();
    for entry in fs::read_dir(root).with_context(|| format!("Failed to read {}", root.display()))? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || !path.is_dir() || !path.join(DESCRIPTOR_FILE).is_file() {
            continue;
        }

        let manifest = fs::read_to_string(path.join(MANIFEST_FILE))
            .ok()
            .and_then(|text| serde_json::from_str::<Manifest>(&text).ok());
        if manifest.is_none() {
            debug!("No readable manifest in {}", path.display());
        }

        skills.push(InstalledSkill {
            name,
            path,
            source_url: manifest.as_ref().and_then(|m| m.source_url.clone()),
            generated_at: manifest.map(|m| m.generated_at),
        });
    }
    skills.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(skills)
}
