use anyhow::Result;
use std::path::PathBuf;

use crate::config::Config;
use crate::error::KilnError;
use crate::package::PackageStore;
use crate::runtime::Runtime;

use super::{lookup_reference, newest_version, select_executable};

/// Print the cached path of a package's executable.
#[tracing::instrument(skip(runtime, config))]
pub fn which<R: Runtime>(
    runtime: &R,
    config: &Config,
    package: &str,
    executable: Option<&str>,
) -> Result<()> {
    let path = executable_path(runtime, config, package, executable)?;
    println!("{}", path.display());
    Ok(())
}

/// Unpinned packages resolve to the newest cached version; nothing is
/// fetched.
fn executable_path<R: Runtime>(
    runtime: &R,
    config: &Config,
    package: &str,
    executable: Option<&str>,
) -> Result<PathBuf> {
    let store = PackageStore::new(runtime, config);
    let mut reference = lookup_reference(runtime, config, package)?;

    if !reference.has_version() {
        let versions = store.installed_versions(&reference)?;
        let newest = newest_version(&versions)
            .ok_or_else(|| KilnError::PackageNotInstalled(reference.repository.clone()))?;
        reference.version = newest.to_string();
    }

    if !store.is_installed(&reference) {
        return Err(KilnError::PackageNotInstalled(reference.to_string()).into());
    }

    let name = select_executable(&reference, &store.executables(&reference), executable)?;
    Ok(store.install_path(&reference).join(name))
}
