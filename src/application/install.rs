//! Install use case - clone, build, cache and link one package.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::Path;

use crate::config::Config;
use crate::error::KilnError;
use crate::git::GitClient;
use crate::package::{
    LinkManager, LinkOutcome, Overwrite, PackageReference, PackageStore, VersionResolver,
};
use crate::process::ProcessRunner;
use crate::runtime::Runtime;
use crate::toolchain::Cargo;

const EXECUTABLE_MODE: u32 = 0o755;

#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Rebuild even if the version is cached
    pub force: bool,
    /// Link executables into the link directory
    pub link: bool,
    /// What to do with link targets kiln does not own
    pub overwrite: Overwrite,
    /// Link only this executable
    pub executable: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStatus {
    Installed,
    Reinstalled,
    AlreadyInstalled,
}

#[derive(Debug)]
pub struct LinkedExecutable {
    pub name: String,
    pub outcome: LinkOutcome,
}

#[derive(Debug)]
pub struct InstallReport {
    /// The reference with its version resolved
    pub reference: PackageReference,
    pub status: InstallStatus,
    pub executables: Vec<String>,
    pub links: Vec<LinkedExecutable>,
}

pub struct Installer<'a, R: Runtime, P: ProcessRunner> {
    runtime: &'a R,
    runner: &'a P,
    store: PackageStore<'a, R>,
    links: LinkManager<'a, R>,
}

impl<'a, R: Runtime, P: ProcessRunner> Installer<'a, R, P> {
    pub fn new(runtime: &'a R, runner: &'a P, config: &'a Config) -> Self {
        Self {
            runtime,
            runner,
            store: PackageStore::new(runtime, config),
            links: LinkManager::new(runtime, config),
        }
    }

    pub fn store(&self) -> &PackageStore<'a, R> {
        &self.store
    }

    /// Fill in the latest version when `reference` is unpinned.
    pub fn resolve(&self, reference: &PackageReference) -> Result<PackageReference> {
        if reference.has_version() {
            return Ok(reference.clone());
        }
        let version = VersionResolver::resolve(&GitClient::new(self.runner), reference)?;
        info!("Resolved {} to {}", reference.repository, version);
        Ok(reference.with_version(version))
    }

    #[tracing::instrument(skip(self))]
    pub fn install(
        &self,
        reference: &PackageReference,
        options: &InstallOptions,
    ) -> Result<InstallReport> {
        let reference = self.resolve(reference)?;
        let was_installed = self.store.is_installed(&reference);

        let status = if was_installed && !options.force {
            debug!("{} is already installed", reference);
            InstallStatus::AlreadyInstalled
        } else {
            if options.force && self.store.remove_version(&reference)? {
                info!("Removed cached {} for reinstall", reference);
            }
            // The metadata entry is written before the build becomes visible.
            let staged = self
                .build_into_staging(&reference)
                .and_then(|()| self.store.record_install(&reference))
                .and_then(|()| self.store.commit_staging(&reference));
            if let Err(e) = staged {
                if let Err(cleanup) = self.store.discard_staging(&reference) {
                    warn!("Failed to clean up staging for {}: {}", reference, cleanup);
                }
                return Err(e);
            }
            info!("Installed {}", reference);

            if was_installed {
                InstallStatus::Reinstalled
            } else {
                InstallStatus::Installed
            }
        };

        let executables = self.store.executables(&reference);
        let links = if options.link {
            self.link(&reference, &executables, options)?
        } else {
            vec![]
        };

        Ok(InstallReport {
            reference,
            status,
            executables,
            links,
        })
    }

    fn link(
        &self,
        reference: &PackageReference,
        executables: &[String],
        options: &InstallOptions,
    ) -> Result<Vec<LinkedExecutable>> {
        let selected: Vec<&String> = match &options.executable {
            Some(name) => {
                let found = executables.iter().find(|e| *e == name).ok_or_else(|| {
                    KilnError::ExecutableNotFound {
                        package: reference.repository.clone(),
                        name: name.clone(),
                        available: executables.to_vec(),
                    }
                })?;
                vec![found]
            }
            None => executables.iter().collect(),
        };

        let install_path = self.store.install_path(reference);
        selected
            .into_iter()
            .map(|name| {
                let outcome = self
                    .links
                    .link(&install_path.join(name), name, options.overwrite)?;
                Ok(LinkedExecutable {
                    name: name.clone(),
                    outcome,
                })
            })
            .collect()
    }

    /// Clone into a temporary checkout, build, and copy the artifacts into the
    /// staging directory. The checkout is removed when this returns.
    fn build_into_staging(&self, reference: &PackageReference) -> Result<()> {
        let checkout = tempfile::Builder::new()
            .prefix("kiln-checkout-")
            .tempdir()
            .context("Failed to create a temporary checkout directory")?;
        let repo_dir = checkout.path().join(reference.name());

        info!("Cloning {} at {}", reference.fetch_url(), reference.version);
        GitClient::new(self.runner).clone(&reference.fetch_url(), &reference.version, &repo_dir)?;

        let package_dir = if reference.subpath.is_empty() {
            repo_dir
        } else {
            repo_dir.join(&reference.subpath)
        };

        let cargo = Cargo::new(self.runner);
        let description = cargo.describe(&reference.repository, &package_dir)?;
        info!("Building {}", reference);
        cargo.build(&reference.repository, &package_dir, &description.executables)?;

        let staging = self.store.prepare_staging(reference)?;
        for executable in &description.executables {
            let artifact = description.artifact_path(executable);
            if !self.runtime.is_file(&artifact) {
                return Err(KilnError::MissingExecutableArtifact {
                    package: reference.repository.clone(),
                    name: executable.clone(),
                }
                .into());
            }
            let dest = staging.join(executable);
            self.runtime.copy(&artifact, &dest)?;
            self.runtime.set_permissions(&dest, EXECUTABLE_MODE)?;
        }

        for resource in &description.resources {
            let Some(name) = resource.file_name() else {
                continue;
            };
            if !self.runtime.exists(resource) {
                warn!("Resource {:?} of {} does not exist", resource, reference);
                continue;
            }
            self.copy_recursive(resource, &staging.join(name))?;
        }

        Ok(())
    }

    fn copy_recursive(&self, from: &Path, to: &Path) -> Result<()> {
        if self.runtime.is_dir(from) {
            self.runtime.create_dir_all(to)?;
            for entry in self.runtime.read_dir(from)? {
                if let Some(name) = entry.file_name() {
                    self.copy_recursive(&entry, &to.join(name))?;
                }
            }
        } else {
            self.runtime.copy(from, to)?;
        }
        Ok(())
    }
}
