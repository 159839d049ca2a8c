use anyhow::Result;

use crate::pipeline::installer::{resolve_root, InstallScope, InstallVariant};

pub fn run() -> Result<()> {
    for variant in InstallVariant::ALL {
        let user = resolve_root(variant, InstallScope::User)?;
        let project = resolve_root(variant, InstallScope::Project)?;
        println!(
            "{:<9} user: {}  project: {}",
            variant.as_str(),
            user.display(),
            project.display()
        );
    }
    Ok(())
}
