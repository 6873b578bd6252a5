use anyhow::Result;
use log::debug;

use crate::config::Config;
use crate::package::{InstalledPackage, PackageStore};
use crate::runtime::Runtime;

use super::newest_version;

/// List installed packages, or print them as Kilnfile lines with `dump`.
#[tracing::instrument(skip(runtime, config))]
pub fn list<R: Runtime>(runtime: &R, config: &Config, dump: bool) -> Result<()> {
    debug!("Listing packages from {:?}", config.store_root);
    let packages = PackageStore::new(runtime, config).list_installed()?;

    if dump {
        for line in dump_lines(&packages) {
            println!("{}", line);
        }
        return Ok(());
    }

    if packages.is_empty() {
        println!("No packages installed.");
        return Ok(());
    }

    println!("Installed packages:");
    for package in &packages {
        println!("  {} ({})", package.name, package.repository);
        for version in &package.versions {
            if version.linked.is_empty() {
                println!("    - {}", version.version);
            } else {
                println!(
                    "    - {} (linked: {})",
                    version.version,
                    version.linked.join(", ")
                );
            }
        }
    }
    Ok(())
}

/// One `repository@version` line per package: the linked version, or the
/// newest one when nothing is linked.
fn dump_lines(packages: &[InstalledPackage]) -> Vec<String> {
    packages
        .iter()
        .filter_map(|package| {
            let linked = package
                .versions
                .iter()
                .rev()
                .find(|v| !v.linked.is_empty())
                .map(|v| v.version.as_str());
            let versions: Vec<String> = package
                .versions
                .iter()
                .map(|v| v.version.clone())
                .collect();
            let version = linked.or_else(|| newest_version(&versions))?.to_string();
            Some(format!("{}@{}", package.repository, version))
        })
        .collect()
}
