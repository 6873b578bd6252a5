//! CLI commands. Each prints its own output and returns errors to `main`.

mod bootstrap;
mod install;
mod list;
mod run;
mod uninstall;
mod which;

pub use bootstrap::bootstrap;
pub use install::install;
pub use list::list;
pub use run::run;
pub use uninstall::uninstall;
pub use which::which;

use anyhow::Result;
use log::debug;

use crate::config::Config;
use crate::error::KilnError;
use crate::package::{Manifest, PackageReference, PackageStore, VersionResolver};
use crate::runtime::Runtime;

/// Parse `raw`, taking the version from the Kilnfile when none is given and
/// the Kilnfile lists the package.
pub(crate) fn pinned_reference<R: Runtime>(
    runtime: &R,
    config: &Config,
    raw: &str,
) -> Result<PackageReference> {
    let reference: PackageReference = raw.parse()?;
    if reference.has_version() {
        return Ok(reference);
    }

    if let Some(manifest) = Manifest::load_optional(runtime, &config.manifest_path)?
        && let Some(entry) = manifest.package_for(&reference.repository)
        && entry.has_version()
    {
        debug!("Using {} from {:?}", entry, config.manifest_path);
        let mut pinned = entry.clone();
        if !reference.subpath.is_empty() {
            pinned.subpath = reference.subpath;
        }
        return Ok(pinned);
    }

    Ok(reference)
}

/// Like [`pinned_reference`], but a bare package name (no `/`) that the
/// Kilnfile does not pin is looked up among installed packages.
pub(crate) fn lookup_reference<R: Runtime>(
    runtime: &R,
    config: &Config,
    raw: &str,
) -> Result<PackageReference> {
    let reference = pinned_reference(runtime, config, raw)?;
    if reference.has_version() || !is_short_name(&reference.repository) {
        return Ok(reference);
    }

    let found = PackageStore::new(runtime, config).resolve_by_name(&reference.repository)?;
    debug!("{} is installed as {}", reference.repository, found.repository);
    Ok(PackageReference {
        subpath: reference.subpath,
        ..found
    })
}

fn is_short_name(repository: &str) -> bool {
    !repository.contains(['/', ':'])
}

/// The highest cached version, preferring semantic versions.
pub(crate) fn newest_version(versions: &[String]) -> Option<&str> {
    VersionResolver::latest_tag(versions).or(versions.last().map(String::as_str))
}

/// `requested`, or the executable named like the package, or the only one.
pub(crate) fn select_executable(
    reference: &PackageReference,
    executables: &[String],
    requested: Option<&str>,
) -> Result<String> {
    let not_found = |name: &str| KilnError::ExecutableNotFound {
        package: reference.repository.clone(),
        name: name.to_string(),
        available: executables.to_vec(),
    };

    if let Some(name) = requested {
        return match executables.iter().find(|e| *e == name) {
            Some(found) => Ok(found.clone()),
            None => Err(not_found(name).into()),
        };
    }

    let name = reference.name();
    if let Some(found) = executables.iter().find(|e| e.eq_ignore_ascii_case(&name)) {
        return Ok(found.clone());
    }
    match executables {
        [only] => Ok(only.clone()),
        _ => Err(not_found(&name).into()),
    }
}
