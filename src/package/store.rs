//! On-disk package store.
//!
//! Layout:
//!
//! ```text
//! <store>/metadata.json
//! <store>/packages/<sanitized>/build/<version>/<executable>
//! <store>/packages/<sanitized>/build/.staging-<version>/   (during a build)
//! ```

use anyhow::Result;
use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::KilnError;
use crate::runtime::Runtime;

use super::{LinkManager, Metadata, PackageReference};

const BUILD_DIR: &str = "build";
const STAGING_PREFIX: &str = ".staging-";

/// One cached version of a package.
#[derive(Debug, Clone, PartialEq)]
pub struct InstalledVersion {
    pub version: String,
    pub executables: Vec<String>,
    /// Executables currently linked from the link directory to this version
    pub linked: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstalledPackage {
    pub name: String,
    pub repository: String,
    pub directory: String,
    pub versions: Vec<InstalledVersion>,
}

/// What [`PackageStore::uninstall`] removed. Empty when nothing matched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UninstallReport {
    pub repository: Option<String>,
    pub versions: Vec<String>,
    pub links: Vec<String>,
}

impl UninstallReport {
    pub fn is_empty(&self) -> bool {
        self.repository.is_none()
    }
}

pub struct PackageStore<'a, R: Runtime> {
    runtime: &'a R,
    config: &'a Config,
}

impl<'a, R: Runtime> PackageStore<'a, R> {
    pub fn new(runtime: &'a R, config: &'a Config) -> Self {
        Self { runtime, config }
    }

    /// `<store>/packages/<sanitized>`
    pub fn package_dir(&self, reference: &PackageReference) -> PathBuf {
        self.config
            .packages_dir()
            .join(reference.sanitized_directory_name())
    }

    /// `<store>/packages/<sanitized>/build/<version>`
    pub fn install_path(&self, reference: &PackageReference) -> PathBuf {
        self.package_dir(reference)
            .join(BUILD_DIR)
            .join(version_dir_name(&reference.version))
    }

    /// Hidden sibling of the install path that a build writes into.
    pub fn staging_path(&self, reference: &PackageReference) -> PathBuf {
        self.package_dir(reference).join(BUILD_DIR).join(format!(
            "{}{}",
            STAGING_PREFIX,
            version_dir_name(&reference.version)
        ))
    }

    pub fn is_installed(&self, reference: &PackageReference) -> bool {
        !self.executables(reference).is_empty()
    }

    /// Sorted executable names directly under the install path.
    pub fn executables(&self, reference: &PackageReference) -> Vec<String> {
        self.executables_in(&self.install_path(reference))
    }

    /// Cached versions of the reference's repository (directory names), sorted.
    pub fn installed_versions(&self, reference: &PackageReference) -> Result<Vec<String>> {
        let mut versions: Vec<String> = self
            .visible_dirs(&self.package_dir(reference).join(BUILD_DIR))?
            .iter()
            .filter(|dir| !self.executables_in(dir).is_empty())
            .filter_map(|dir| file_name(dir))
            .collect();
        versions.sort();
        Ok(versions)
    }

    /// Create an empty staging directory, replacing a stale one.
    #[tracing::instrument(skip(self))]
    pub fn prepare_staging(&self, reference: &PackageReference) -> Result<PathBuf> {
        let staging = self.staging_path(reference);
        self.discard_staging(reference)?;
        self.runtime.create_dir_all(&staging)?;
        Ok(staging)
    }

    #[tracing::instrument(skip(self))]
    pub fn discard_staging(&self, reference: &PackageReference) -> Result<()> {
        let staging = self.staging_path(reference);
        if self.runtime.exists(&staging) {
            debug!("Removing staging directory {:?}", staging);
            self.runtime.remove_dir_all(&staging)?;
        }
        Ok(())
    }

    /// Move the staging directory to the install path.
    #[tracing::instrument(skip(self))]
    pub fn commit_staging(&self, reference: &PackageReference) -> Result<PathBuf> {
        let install_path = self.install_path(reference);
        self.remove_version(reference)?;
        self.runtime
            .rename(&self.staging_path(reference), &install_path)?;
        Ok(install_path)
    }

    /// Delete one cached version. Returns false if it was not there.
    #[tracing::instrument(skip(self))]
    pub fn remove_version(&self, reference: &PackageReference) -> Result<bool> {
        let install_path = self.install_path(reference);
        if !self.runtime.exists(&install_path) {
            return Ok(false);
        }
        self.runtime.remove_dir_all(&install_path)?;
        Ok(true)
    }

    pub fn load_metadata(&self) -> Result<Metadata> {
        Metadata::load(self.runtime, &self.config.metadata_path())
    }

    /// Map the reference's repository to its directory and persist the map.
    ///
    /// If another spelling of the same remote already owns the directory, the
    /// existing entry is kept so the directory keeps a single repository.
    #[tracing::instrument(skip(self))]
    pub fn record_install(&self, reference: &PackageReference) -> Result<()> {
        let directory = reference.sanitized_directory_name();
        let mut metadata = self.load_metadata()?;

        let existing = metadata.repositories_for(&directory);
        if existing.is_empty() || existing.contains(&reference.repository.as_str()) {
            metadata.upsert(&reference.repository, &directory);
        } else {
            debug!(
                "{} already recorded as {}",
                directory,
                existing.join(", ")
            );
        }

        metadata.save(self.runtime, &self.config.metadata_path())
    }

    /// First recorded repository containing `short_name`, case-insensitively.
    /// Which one wins among several matches depends on install order.
    pub fn resolve_by_name(&self, short_name: &str) -> Result<PackageReference> {
        let metadata = self.load_metadata()?;
        let Some((_, directory)) = metadata.find_by_name(short_name) else {
            return Err(KilnError::PackageNotInstalled(short_name.to_string()).into());
        };
        let repository = metadata.repository_for(directory)?;
        Ok(PackageReference::new(repository, ""))
    }

    pub fn repository_for_directory(&self, directory: &str) -> Result<String> {
        let metadata = self.load_metadata()?;
        Ok(metadata.repository_for(directory)?.to_string())
    }

    /// Every package with at least one cached version, ordered by name.
    #[tracing::instrument(skip(self))]
    pub fn list_installed(&self) -> Result<Vec<InstalledPackage>> {
        let packages_dir = self.config.packages_dir();
        if !self.runtime.is_dir(&packages_dir) {
            return Ok(vec![]);
        }

        let metadata = self.load_metadata()?;
        let links = LinkManager::new(self.runtime, self.config);
        let mut packages = Vec::new();

        for package_dir in self.visible_dirs(&packages_dir)? {
            let Some(directory) = file_name(&package_dir) else {
                continue;
            };

            let mut versions = Vec::new();
            for version_dir in self.visible_dirs(&package_dir.join(BUILD_DIR))? {
                let Some(version) = file_name(&version_dir) else {
                    continue;
                };
                let executables = self.executables_in(&version_dir);
                let linked = executables
                    .iter()
                    .filter(|exe| {
                        links.linked_executable(exe) == Some(version_dir.join(exe))
                    })
                    .cloned()
                    .collect();
                versions.push(InstalledVersion {
                    version,
                    executables,
                    linked,
                });
            }

            if versions.is_empty() {
                debug!("Skipping {:?}: no cached versions", package_dir);
                continue;
            }
            versions.sort_by(|a, b| a.version.cmp(&b.version));

            let repository = metadata.repository_for(&directory)?.to_string();
            packages.push(InstalledPackage {
                name: PackageReference::new(repository.as_str(), "").name(),
                repository,
                directory,
                versions,
            });
        }

        packages.sort_by_key(|p| p.name.to_lowercase());
        Ok(packages)
    }

    /// Remove every cached version of the first package matching `name`, the
    /// links into it, and its metadata entry.
    #[tracing::instrument(skip(self))]
    pub fn uninstall(&self, name: &str) -> Result<UninstallReport> {
        let mut metadata = self.load_metadata()?;
        let Some((repository, directory)) = metadata
            .find_by_name(name)
            .map(|(r, d)| (r.to_string(), d.to_string()))
        else {
            debug!("Nothing installed matches {}", name);
            return Ok(UninstallReport::default());
        };
        metadata.repository_for(&directory)?;

        let package_dir = self.config.packages_dir().join(&directory);
        let links = LinkManager::new(self.runtime, self.config).remove_links_into(&package_dir)?;

        let mut versions: Vec<String> = self
            .visible_dirs(&package_dir.join(BUILD_DIR))?
            .iter()
            .filter_map(|dir| file_name(dir))
            .collect();
        versions.sort();

        if self.runtime.exists(&package_dir) {
            self.runtime.remove_dir_all(&package_dir)?;
        }

        metadata.remove_directory(&directory);
        metadata.save(self.runtime, &self.config.metadata_path())?;

        info!("Uninstalled {} ({} version(s))", repository, versions.len());
        Ok(UninstallReport {
            repository: Some(repository),
            versions,
            links,
        })
    }

    /// Regular, non-hidden files without an extension.
    fn executables_in(&self, dir: &Path) -> Vec<String> {
        let entries = match self.runtime.read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => return vec![],
        };

        let mut names: Vec<String> = entries
            .iter()
            .filter(|path| path.extension().is_none() && self.runtime.is_file(path))
            .filter_map(|path| file_name(path))
            .filter(|name| !name.starts_with('.'))
            .collect();
        names.sort();
        names
    }

    /// Non-hidden subdirectories of `dir`; empty if `dir` does not exist.
    fn visible_dirs(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        if !self.runtime.is_dir(dir) {
            return Ok(vec![]);
        }
        Ok(self
            .runtime
            .read_dir(dir)?
            .into_iter()
            .filter(|path| file_name(path).is_some_and(|name| !name.starts_with('.')))
            .filter(|path| self.runtime.is_dir(path))
            .collect())
    }
}

/// A version as a single path component.
pub fn version_dir_name(version: &str) -> String {
    version.replace(['/', '\\'], "_")
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(String::from)
}
