//! Process-wide configuration, resolved once at startup.

use anyhow::{Context, Result};
use log::debug;
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

/// Environment variable overriding the store root.
pub const STORE_ENV: &str = "KILN_PATH";
/// Environment variable overriding the link directory.
pub const LINK_ENV: &str = "KILN_LINK_PATH";
/// Default manifest file name, looked up in the current directory.
pub const DEFAULT_MANIFEST: &str = "Kilnfile";

const STORE_DIR_NAME: &str = ".kiln";
const LINK_DIR_NAME: &str = "bin";

/// Locations kiln reads and writes. Built once and passed by reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Root of the package store (`metadata.json` and `packages/` live here)
    pub store_root: PathBuf,
    /// Shared directory of symlinks to installed executables
    pub link_dir: PathBuf,
    /// Manifest consulted for pinned versions and by `bootstrap`
    pub manifest_path: PathBuf,
}

impl Config {
    pub fn new(
        store_root: impl Into<PathBuf>,
        link_dir: impl Into<PathBuf>,
        manifest_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store_root: store_root.into(),
            link_dir: link_dir.into(),
            manifest_path: manifest_path.into(),
        }
    }

    /// Resolve the configuration from explicit values, then the environment,
    /// then the defaults under the home directory. Empty values count as unset.
    #[tracing::instrument(skip(runtime))]
    pub fn resolve<R: Runtime>(
        runtime: &R,
        store_root: Option<PathBuf>,
        link_dir: Option<PathBuf>,
        manifest_path: Option<PathBuf>,
    ) -> Result<Self> {
        let store_root = match non_empty(store_root).or_else(|| env_path(runtime, STORE_ENV)) {
            Some(path) => path,
            None => default_store_root(runtime)?,
        };
        let link_dir = match non_empty(link_dir).or_else(|| env_path(runtime, LINK_ENV)) {
            Some(path) => path,
            None => default_link_dir(runtime)?,
        };
        let manifest_path =
            non_empty(manifest_path).unwrap_or_else(|| PathBuf::from(DEFAULT_MANIFEST));

        debug!(
            "Using store {:?}, link directory {:?}, manifest {:?}",
            store_root, link_dir, manifest_path
        );

        Ok(Self {
            store_root,
            link_dir,
            manifest_path,
        })
    }

    /// `<store>/packages`
    pub fn packages_dir(&self) -> PathBuf {
        self.store_root.join("packages")
    }

    /// `<store>/metadata.json`
    pub fn metadata_path(&self) -> PathBuf {
        self.store_root.join("metadata.json")
    }

    pub fn link_path(&self, executable: &str) -> PathBuf {
        self.link_dir.join(executable)
    }

    pub fn store_root(&self) -> &Path {
        &self.store_root
    }
}

fn non_empty(path: Option<PathBuf>) -> Option<PathBuf> {
    path.filter(|p| !p.as_os_str().is_empty())
}

fn env_path<R: Runtime>(runtime: &R, key: &str) -> Option<PathBuf> {
    runtime
        .env_var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

/// `~/.kiln`
pub fn default_store_root<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    let home_dir = runtime
        .home_dir()
        .context("Could not find home directory")?;
    Ok(home_dir.join(STORE_DIR_NAME))
}

/// `~/.kiln/bin`
pub fn default_link_dir<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    Ok(default_store_root(runtime)?.join(LINK_DIR_NAME))
}
