//! The shared link directory.
//!
//! Every entry is classified before it is touched. Only links that already
//! resolve into the store's packages directory (or empty slots) are replaced
//! without asking; anything else belongs to someone else.

use anyhow::Result;
use log::{debug, info};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use crate::config::Config;
use crate::error::KilnError;
use crate::runtime::{Runtime, is_path_under, relative_symlink_path};

/// What currently occupies `<link_dir>/<name>`.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkTarget {
    /// Symlink resolving into the packages directory
    Owned { version: String },
    /// Regular file or directory kiln did not create
    ForeignFile,
    /// Symlink pointing outside the packages directory
    ForeignSymlink { destination: PathBuf },
    Missing,
}

impl LinkTarget {
    pub fn description(&self) -> String {
        match self {
            LinkTarget::Owned { version } => format!("kiln link to version {}", version),
            LinkTarget::ForeignFile => "not managed by kiln".to_string(),
            LinkTarget::ForeignSymlink { destination } => {
                format!("symlink to {:?}, not managed by kiln", destination)
            }
            LinkTarget::Missing => "missing".to_string(),
        }
    }

    /// Owned and missing targets can be replaced without asking.
    pub fn is_replaceable(&self) -> bool {
        matches!(self, LinkTarget::Owned { .. } | LinkTarget::Missing)
    }
}

/// Policy for foreign link targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Overwrite {
    /// Ask through [`Runtime::confirm`]
    #[default]
    Prompt,
    Always,
    Never,
}

impl Overwrite {
    /// `force` replaces foreign targets, otherwise the user is asked.
    pub fn from_force(force: bool) -> Self {
        if force {
            Overwrite::Always
        } else {
            Overwrite::Prompt
        }
    }
}

impl FromStr for Overwrite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "y" | "yes" | "true" => Ok(Overwrite::Always),
            "n" | "no" | "false" => Ok(Overwrite::Never),
            "prompt" | "ask" => Ok(Overwrite::Prompt),
            other => Err(format!("expected y or n, got '{}'", other)),
        }
    }
}

#[derive(Debug)]
pub enum LinkOutcome {
    Linked,
    /// An existing entry was replaced
    Replaced(LinkTarget),
    /// The target was left untouched
    Declined(KilnError),
}

impl LinkOutcome {
    pub fn is_linked(&self) -> bool {
        !matches!(self, LinkOutcome::Declined(_))
    }
}

pub struct LinkManager<'a, R: Runtime> {
    runtime: &'a R,
    config: &'a Config,
}

impl<'a, R: Runtime> LinkManager<'a, R> {
    pub fn new(runtime: &'a R, config: &'a Config) -> Self {
        Self { runtime, config }
    }

    /// Classify the entry at `<link_dir>/<name>` without modifying it.
    pub fn classify(&self, name: &str) -> LinkTarget {
        let dest = self.config.link_path(name);

        if self.runtime.is_symlink(&dest) {
            let packages_dir = self.config.packages_dir();
            match self.runtime.resolve_link(&dest) {
                Ok(resolved) if is_path_under(&resolved, &packages_dir) => LinkTarget::Owned {
                    version: version_component(&resolved, &packages_dir).unwrap_or_default(),
                },
                Ok(resolved) => LinkTarget::ForeignSymlink {
                    destination: resolved,
                },
                Err(e) => {
                    debug!("Cannot resolve {:?}: {}", dest, e);
                    LinkTarget::ForeignSymlink {
                        destination: PathBuf::new(),
                    }
                }
            }
        } else if self.runtime.exists(&dest) {
            LinkTarget::ForeignFile
        } else {
            LinkTarget::Missing
        }
    }

    /// Point `<link_dir>/<target_name>` at `executable`.
    #[tracing::instrument(skip(self))]
    pub fn link(
        &self,
        executable: &Path,
        target_name: &str,
        overwrite: Overwrite,
    ) -> Result<LinkOutcome> {
        let dest = self.config.link_path(target_name);
        let existing = self.classify(target_name);

        if !existing.is_replaceable() {
            let accepted = match overwrite {
                Overwrite::Always => true,
                Overwrite::Never => false,
                Overwrite::Prompt => self.runtime.confirm(&format!(
                    "{:?} already exists ({}). Overwrite?",
                    dest,
                    existing.description()
                ))?,
            };
            if !accepted {
                info!("Leaving {:?} untouched", dest);
                return Ok(LinkOutcome::Declined(KilnError::LinkConflict {
                    path: dest,
                    description: existing.description(),
                }));
            }
        }

        match &existing {
            LinkTarget::Missing => {}
            LinkTarget::ForeignFile if self.runtime.is_dir(&dest) => {
                return Err(KilnError::LinkConflict {
                    path: dest,
                    description: "a directory".to_string(),
                }
                .into());
            }
            LinkTarget::ForeignFile => self.runtime.remove_file(&dest)?,
            LinkTarget::Owned { .. } | LinkTarget::ForeignSymlink { .. } => {
                self.runtime.remove_symlink(&dest)?
            }
        }

        self.create_link(executable, &dest)?;
        debug!("Linked {:?} -> {:?}", dest, executable);

        Ok(match existing {
            LinkTarget::Missing => LinkOutcome::Linked,
            replaced => LinkOutcome::Replaced(replaced),
        })
    }

    /// Remove `<link_dir>/<name>` if kiln owns it.
    #[tracing::instrument(skip(self))]
    pub fn unlink(&self, name: &str) -> Result<bool> {
        match self.classify(name) {
            LinkTarget::Owned { .. } => {
                self.runtime.remove_symlink(&self.config.link_path(name))?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// The store path an owned link resolves to.
    pub fn linked_executable(&self, name: &str) -> Option<PathBuf> {
        let dest = self.config.link_path(name);
        if !self.runtime.is_symlink(&dest) {
            return None;
        }
        self.runtime
            .resolve_link(&dest)
            .ok()
            .filter(|resolved| is_path_under(resolved, &self.config.packages_dir()))
    }

    /// Remove every link resolving under `dir`. Returns the removed names, sorted.
    #[tracing::instrument(skip(self))]
    pub fn remove_links_into(&self, dir: &Path) -> Result<Vec<String>> {
        let link_dir = &self.config.link_dir;
        if !self.runtime.is_dir(link_dir) {
            return Ok(vec![]);
        }

        let mut removed = Vec::new();
        for entry in self.runtime.read_dir(link_dir)? {
            let Some(name) = entry.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(resolved) = self.linked_executable(name)
                && is_path_under(&resolved, dir)
            {
                self.runtime.remove_symlink(&entry)?;
                removed.push(name.to_string());
            }
        }
        removed.sort();
        Ok(removed)
    }

    fn create_link(&self, target: &Path, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent()
            && !self.runtime.exists(parent)
        {
            self.runtime.create_dir_all(parent)?;
        }

        match relative_symlink_path(dest, target) {
            Some(relative) => self.runtime.symlink(&relative, dest),
            None => self.runtime.symlink(target, dest),
        }
    }
}

/// `<packages>/<sanitized>/build/<version>/<exe>` -> `<version>`
fn version_component(resolved: &Path, packages_dir: &Path) -> Option<String> {
    let relative = resolved.strip_prefix(packages_dir).ok()?;
    let parts: Vec<Component> = relative.components().collect();
    match parts.as_slice() {
        [_, Component::Normal(build), Component::Normal(version), ..] if *build == "build" => {
            version.to_str().map(String::from)
        }
        _ => None,
    }
}
