use anyhow::Result;
use log::debug;

use crate::config::Config;
use crate::package::PackageStore;
use crate::runtime::Runtime;

/// Remove every cached version of a package and the links into it.
#[tracing::instrument(skip(runtime, config))]
pub fn uninstall<R: Runtime>(runtime: &R, config: &Config, name: &str) -> Result<()> {
    let store = PackageStore::new(runtime, config);
    let report = store.uninstall(name)?;

    let Some(repository) = report.repository else {
        debug!("Nothing to uninstall for {}", name);
        println!("No installed package matches '{}'", name);
        return Ok(());
    };

    println!(
        "Uninstalled {} ({})",
        repository,
        if report.versions.is_empty() {
            "no cached versions".to_string()
        } else {
            report.versions.join(", ")
        }
    );
    for link in &report.links {
        println!("  Removed link {}", config.link_path(link).display());
    }
    Ok(())
}
