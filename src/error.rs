//! Error categories raised by kiln.
//!
//! Library functions return [`anyhow::Result`]; the variants below are raised
//! through it so callers (and tests) can `downcast_ref::<KilnError>()` to tell
//! the failure kinds apart.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KilnError {
    /// The remote is unreachable or the requested ref does not exist.
    #[error("Repository not found: {url}{}", ref_suffix(.reference))]
    RepositoryNotFound {
        url: String,
        reference: Option<String>,
    },

    #[error("Invalid repository reference: {0:?}")]
    InvalidRepositoryReference(String),

    /// The toolchain exited unsuccessfully. `output` keeps the full
    /// diagnostics; only their last line is displayed.
    #[error("Build failed for {package}{}", last_line_suffix(.output))]
    BuildFailed { package: String, output: String },

    #[error("Build of {package} did not produce executable '{name}'")]
    MissingExecutableArtifact { package: String, name: String },

    #[error("Package {0} does not declare any executables")]
    NoExecutableProducts(String),

    #[error("Package {0} is not installed")]
    PackageNotInstalled(String),

    #[error("Executable '{name}' not found in {package}. Available: {}", .available.join(", "))]
    ExecutableNotFound {
        package: String,
        name: String,
        available: Vec<String>,
    },

    /// The metadata map does not have exactly one repository for a package directory.
    #[error("Inconsistent cache: directory '{directory}' maps to {} repositories{}", .repositories.len(), list_suffix(.repositories))]
    InconsistentCache {
        directory: String,
        repositories: Vec<String>,
    },

    #[error("{path:?} already exists ({description}), not overwriting")]
    LinkConflict { path: PathBuf, description: String },

    #[error("Failed to persist {path:?}: {reason}")]
    Persistence { path: PathBuf, reason: String },

    #[error("Command `{command}` failed with status {status}: {stderr}")]
    ProcessFailed {
        command: String,
        status: i32,
        stderr: String,
    },
}

fn ref_suffix(reference: &Option<String>) -> String {
    match reference {
        Some(r) => format!(" (ref '{}')", r),
        None => String::new(),
    }
}

fn last_line_suffix(output: &str) -> String {
    match output.lines().rev().map(str::trim).find(|l| !l.is_empty()) {
        Some(line) => format!(": {}", line),
        None => String::new(),
    }
}

fn list_suffix(repositories: &[String]) -> String {
    if repositories.is_empty() {
        String::new()
    } else {
        format!(": {}", repositories.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_not_found_message() {
        let err = KilnError::RepositoryNotFound {
            url: "https://github.com/o/r.git".into(),
            reference: Some("1.0".into()),
        };
        assert_eq!(
            err.to_string(),
            "Repository not found: https://github.com/o/r.git (ref '1.0')"
        );

        let err = KilnError::RepositoryNotFound {
            url: "https://github.com/o/r.git".into(),
            reference: None,
        };
        assert_eq!(err.to_string(), "Repository not found: https://github.com/o/r.git");
    }

    #[test]
    fn test_inconsistent_cache_message() {
        let err = KilnError::InconsistentCache {
            directory: "github.com_o_r".into(),
            repositories: vec!["o/r".into(), "https://github.com/o/r.git".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("maps to 2 repositories"));
        assert!(msg.contains("o/r, https://github.com/o/r.git"));

        let err = KilnError::InconsistentCache {
            directory: "github.com_o_r".into(),
            repositories: vec![],
        };
        assert!(err.to_string().ends_with("maps to 0 repositories"));
    }

    #[test]
    fn test_build_failed_message_is_one_line() {
        let err = KilnError::BuildFailed {
            package: "o/tool".into(),
            output: "   Compiling tool v1.0.0\nerror[E0425]: cannot find value `x`\nerror: could not compile `tool`\n\n"
                .into(),
        };
        assert_eq!(
            err.to_string(),
            "Build failed for o/tool: error: could not compile `tool`"
        );

        let err = KilnError::BuildFailed {
            package: "o/tool".into(),
            output: String::new(),
        };
        assert_eq!(err.to_string(), "Build failed for o/tool");
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = KilnError::PackageNotInstalled("mint".into()).into();
        assert!(matches!(
            err.downcast_ref::<KilnError>(),
            Some(KilnError::PackageNotInstalled(name)) if name == "mint"
        ));
    }
}
