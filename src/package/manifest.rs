//! The `Kilnfile`: one package reference per line.
//!
//! ```text
//! # Formatting
//! yonaskolb/mint@0.17.0
//! realm/SwiftLint@0.50.3   # linter
//! ```

use anyhow::{Context, Result};
use indexmap::IndexMap;
use std::fmt;
use std::path::Path;

use crate::runtime::Runtime;

use super::PackageReference;

#[derive(Debug, Clone, PartialEq)]
pub enum ManifestDiagnostic {
    /// The same repository is listed more than once; the first entry wins.
    Duplicate {
        repository: String,
        versions: Vec<String>,
    },
    Unpinned { repository: String },
}

impl fmt::Display for ManifestDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestDiagnostic::Duplicate {
                repository,
                versions,
            } => write!(
                f,
                "{} is listed {} times ({}), using the first",
                repository,
                versions.len(),
                versions
                    .iter()
                    .map(|v| if v.is_empty() { "unpinned" } else { v.as_str() })
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            ManifestDiagnostic::Unpinned { repository } => {
                write!(f, "{} is not pinned to a version", repository)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    pub entries: Vec<PackageReference>,
}

impl Manifest {
    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .map(|line| match line.split_once('#') {
                Some((before, _)) => before.trim(),
                None => line.trim(),
            })
            .filter(|line| !line.is_empty())
            .map(|line| PackageReference::parse(line, ""))
            .collect();
        Self { entries }
    }

    /// Read and parse the manifest at `path`. A missing file is an error.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        if !runtime.exists(path) {
            anyhow::bail!("No Kilnfile found at {:?}", path);
        }
        let text = runtime
            .read_to_string(path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        Ok(Self::parse(&text))
    }

    /// Like [`Manifest::load`], but `None` when the file does not exist.
    pub fn load_optional<R: Runtime>(runtime: &R, path: &Path) -> Result<Option<Self>> {
        if !runtime.exists(path) {
            return Ok(None);
        }
        Self::load(runtime, path).map(Some)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Duplicated repositories (compared by store directory, case-insensitively)
    /// followed by unpinned entries, in file order.
    pub fn diagnostics(&self) -> Vec<ManifestDiagnostic> {
        let mut groups: IndexMap<String, Vec<&PackageReference>> = IndexMap::new();
        for entry in &self.entries {
            groups
                .entry(entry.sanitized_directory_name().to_lowercase())
                .or_default()
                .push(entry);
        }

        let duplicates = groups
            .values()
            .filter(|group| group.len() > 1)
            .map(|group| ManifestDiagnostic::Duplicate {
                repository: group[0].repository.clone(),
                versions: group.iter().map(|e| e.version.clone()).collect(),
            });

        let unpinned = self
            .entries
            .iter()
            .filter(|e| !e.has_version())
            .map(|e| ManifestDiagnostic::Unpinned {
                repository: e.repository.clone(),
            });

        duplicates.chain(unpinned).collect()
    }

    /// First entry whose repository contains `name`, case-insensitively.
    pub fn package_for(&self, name: &str) -> Option<&PackageReference> {
        let needle = name.to_lowercase();
        self.entries
            .iter()
            .find(|e| e.repository.to_lowercase().contains(&needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;
    use mockall::predicate::eq;
    use std::path::PathBuf;

    const KILNFILE: &str = "\
# Tools for this project
yonaskolb/mint@0.17.0

realm/SwiftLint@0.50.3   # linter
  yonaskolb/XcodeGen
";

    #[test]
    fn test_parse_skips_comments_and_blank_lines() {
        let manifest = Manifest::parse(KILNFILE);
        let repos: Vec<String> = manifest.entries.iter().map(|e| e.to_string()).collect();
        assert_eq!(
            repos,
            vec![
                "yonaskolb/mint@0.17.0",
                "realm/SwiftLint@0.50.3",
                "yonaskolb/XcodeGen"
            ]
        );
    }

    #[test]
    fn test_parse_empty() {
        assert!(Manifest::parse("").is_empty());
        assert!(Manifest::parse("# only a comment\n\n   \n").is_empty());
    }

    #[test]
    fn test_duplicates_first_listed_wins() {
        let manifest = Manifest::parse(
            "yonaskolb/mint@0.16.0\nhttps://github.com/YonasKolb/Mint.git@0.17.0\nrealm/SwiftLint@1.0\n",
        );

        assert_eq!(
            manifest.diagnostics(),
            vec![ManifestDiagnostic::Duplicate {
                repository: "yonaskolb/mint".into(),
                versions: vec!["0.16.0".into(), "0.17.0".into()],
            }]
        );
        assert_eq!(manifest.package_for("mint").unwrap().version, "0.16.0");
    }

    #[test]
    fn test_unpinned_diagnostic() {
        let manifest = Manifest::parse(KILNFILE);
        let diagnostics = manifest.diagnostics();
        assert_eq!(
            diagnostics,
            vec![ManifestDiagnostic::Unpinned {
                repository: "yonaskolb/XcodeGen".into()
            }]
        );
        assert_eq!(
            diagnostics[0].to_string(),
            "yonaskolb/XcodeGen is not pinned to a version"
        );
    }

    #[test]
    fn test_duplicate_message() {
        let diagnostic = ManifestDiagnostic::Duplicate {
            repository: "o/r".into(),
            versions: vec!["1.0".into(), String::new()],
        };
        assert_eq!(
            diagnostic.to_string(),
            "o/r is listed 2 times (1.0, unpinned), using the first"
        );
    }

    #[test]
    fn test_package_for_is_case_insensitive() {
        let manifest = Manifest::parse(KILNFILE);
        assert_eq!(
            manifest.package_for("swiftlint").unwrap().repository,
            "realm/SwiftLint"
        );
        assert_eq!(
            manifest.package_for("realm/SwiftLint").unwrap().version,
            "0.50.3"
        );
        assert!(manifest.package_for("carthage").is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let mut runtime = MockRuntime::new();
        let path = PathBuf::from("/project/Kilnfile");
        runtime
            .expect_exists()
            .with(eq(path.clone()))
            .returning(|_| false);

        let err = Manifest::load(&runtime, &path).unwrap_err();
        assert!(err.to_string().contains("No Kilnfile found"));
        assert_eq!(Manifest::load_optional(&runtime, &path).unwrap(), None);
    }

    #[test]
    fn test_load_reads_through_runtime() {
        let mut runtime = MockRuntime::new();
        let path = PathBuf::from("/project/Kilnfile");
        runtime.expect_exists().returning(|_| true);
        runtime
            .expect_read_to_string()
            .with(eq(path.clone()))
            .returning(|_| Ok("o/r@1.0\n".to_string()));

        let manifest = Manifest::load(&runtime, &path).unwrap();
        assert_eq!(manifest.entries, vec![PackageReference::new("o/r", "1.0")]);
    }
}
