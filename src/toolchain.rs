//! Cargo as the package toolchain.
//!
//! A package is a Cargo package (or workspace). Its executables are the `bin`
//! targets reported by `cargo metadata`; auxiliary files to ship next to them
//! are declared as
//!
//! ```toml
//! [package.metadata.kiln]
//! resources = ["templates", "config/defaults.toml"]
//! ```

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::KilnError;
use crate::process::{ProcessOutput, ProcessRunner, args};
use crate::runtime::is_path_under;

const CARGO: &str = "cargo";

/// What a checked-out package declares.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageDescription {
    /// Binary target names, sorted and deduplicated
    pub executables: Vec<String>,
    /// Absolute paths of resources to copy next to the executables
    pub resources: Vec<PathBuf>,
    /// Cargo's target directory for this checkout
    pub target_dir: PathBuf,
}

impl PackageDescription {
    /// Where `cargo build --release` leaves `executable`.
    pub fn artifact_path(&self, executable: &str) -> PathBuf {
        self.target_dir
            .join("release")
            .join(format!("{}{}", executable, std::env::consts::EXE_SUFFIX))
    }
}

#[derive(Deserialize)]
struct CargoMetadata {
    packages: Vec<CargoPackage>,
    target_directory: PathBuf,
    #[serde(default)]
    workspace_root: Option<PathBuf>,
}

#[derive(Deserialize)]
struct CargoPackage {
    manifest_path: PathBuf,
    targets: Vec<CargoTarget>,
    #[serde(default)]
    metadata: Option<PackageMetadata>,
}

#[derive(Deserialize)]
struct CargoTarget {
    name: String,
    kind: Vec<String>,
}

#[derive(Deserialize, Default)]
struct PackageMetadata {
    #[serde(default)]
    kiln: Option<KilnMetadata>,
}

#[derive(Deserialize, Default)]
struct KilnMetadata {
    #[serde(default)]
    resources: Vec<String>,
}

pub struct Cargo<'a, P: ProcessRunner> {
    runner: &'a P,
}

impl<'a, P: ProcessRunner> Cargo<'a, P> {
    pub fn new(runner: &'a P) -> Self {
        Self { runner }
    }

    /// Read binary targets and resources of the package rooted at `package_dir`.
    #[tracing::instrument(skip(self))]
    pub fn describe(&self, package: &str, package_dir: &Path) -> Result<PackageDescription> {
        let output = self.runner.run(
            CARGO,
            &args(["metadata", "--no-deps", "--format-version", "1"]),
            package_dir,
        )?;
        if !output.is_success() {
            return Err(build_failed(package, &output));
        }

        let description = parse_metadata(&output.stdout)
            .with_context(|| format!("Failed to read cargo metadata of {}", package))?;
        if description.executables.is_empty() {
            return Err(KilnError::NoExecutableProducts(package.to_string()).into());
        }
        debug!("{} declares {:?}", package, description.executables);
        Ok(description)
    }

    /// `cargo build --release` for the given binaries.
    #[tracing::instrument(skip(self))]
    pub fn build(&self, package: &str, package_dir: &Path, executables: &[String]) -> Result<()> {
        let mut build_args = args(["build", "--release"]);
        for executable in executables {
            build_args.push("--bin".to_string());
            build_args.push(executable.clone());
        }

        let output = self.runner.run(CARGO, &build_args, package_dir)?;
        if !output.is_success() {
            return Err(build_failed(package, &output));
        }
        Ok(())
    }
}

fn build_failed(package: &str, output: &ProcessOutput) -> anyhow::Error {
    let diagnostics = output.diagnostics();
    warn!("cargo failed for {}:\n{}", package, diagnostics);
    KilnError::BuildFailed {
        package: package.to_string(),
        output: diagnostics,
    }
    .into()
}

fn parse_metadata(json: &str) -> Result<PackageDescription> {
    let metadata: CargoMetadata = serde_json::from_str(json)?;

    let mut executables = Vec::new();
    let mut resources = Vec::new();
    for package in metadata.packages {
        executables.extend(
            package
                .targets
                .into_iter()
                .filter(|t| t.kind.iter().any(|k| k == "bin"))
                .map(|t| t.name),
        );

        let declared = package
            .metadata
            .and_then(|m| m.kiln)
            .map(|k| k.resources)
            .unwrap_or_default();
        let Some(root) = package.manifest_path.parent() else {
            continue;
        };
        // Resources must stay inside the workspace.
        let boundary = metadata.workspace_root.as_deref().unwrap_or(root);
        for resource in declared {
            let path = root.join(&resource);
            if is_path_under(&path, boundary) {
                resources.push(path);
            } else {
                warn!("Ignoring resource {:?} outside {:?}", resource, boundary);
            }
        }
    }
    executables.sort();
    executables.dedup();

    Ok(PackageDescription {
        executables,
        resources,
        target_dir: metadata.target_directory,
    })
}
