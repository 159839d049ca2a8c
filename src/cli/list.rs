use anyhow::Result;
use std::path::PathBuf;
use std::str::FromStr;

use crate::pipeline::installer::{list_installed, resolve_root, InstallScope, InstallVariant};

/// List skills under an install root.
///
/// `root` wins over `target`/`scope` when given.
pub fn run(root: Option<String>, target: Option<String>, scope: Option<String>) -> Result<()> {
    let root = match root {
        Some(r) => PathBuf::from(r),
        None => {
            let variant = match target {
                Some(ref t) => InstallVariant::from_str(t)?,
                None => InstallVariant::default(),
            };
            let scope = match scope {
                Some(ref s) => InstallScope::from_str(s)?,
                None => InstallScope::default(),
            };
            resolve_root(variant, scope)?
        }
    };

    let skills = list_installed(&root)?;
    if skills.is_empty() {
        println!("No skills installed under {}", root.display());
        return Ok(());
    }

    for skill in skills {
        let source = skill.source_url.as_deref().unwrap_or("-");
        let generated = skill
            .generated_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        println!("{}\t{}\t{}", skill.name, source, generated);
    }
    Ok(())
}
