//! Package references: the identity of a requested package.
//!
//! Accepted forms (each optionally followed by `::<subpath>`):
//! - `org/repo`, `org/repo@1.2.0`
//! - `host.tld/org/repo`, `https://host.tld/org/repo.git@main`
//! - `git@host:org/repo.git`, `git@host:org/repo.git@1.0`
//! - `ssh://git@host/org/repo.git`

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::KilnError;

/// Separates the in-repo package directory from the rest of a reference.
pub const SUBPATH_SEPARATOR: &str = "::";

const GITHUB_HOST: &str = "github.com";

/// A repository locator plus optional version and in-repo subpath.
///
/// Two references are equal when repository and version are equal; the
/// subpath only matters at build time.
#[derive(Debug, Clone, Default)]
pub struct PackageReference {
    pub repository: String,
    /// Empty means "resolve the latest version".
    pub version: String,
    /// Package root inside the repository; empty for the repository root.
    pub subpath: String,
}

impl PackageReference {
    pub fn new(repository: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            version: version.into(),
            subpath: String::new(),
        }
    }

    /// Parse a raw reference. Never fails: anything unrecognised becomes the
    /// repository with no version.
    pub fn parse(raw: &str, default_subpath: &str) -> Self {
        let raw = raw.trim();

        let (remainder, subpath) = match raw.split_once(SUBPATH_SEPARATOR) {
            Some((rest, sub)) => (rest, sub.trim().trim_matches('/')),
            None => (raw, default_subpath),
        };

        let parts: Vec<&str> = remainder.split('@').map(str::trim).collect();
        let (repository, version) = match parts.as_slice() {
            [user, locator, version] => (format!("{}@{}", user, locator), version.to_string()),
            [first, second] if second.contains(':') || first.contains("ssh://") => {
                (format!("{}@{}", first, second), String::new())
            }
            [repository, version] => (repository.to_string(), version.to_string()),
            _ => (remainder.to_string(), String::new()),
        };

        Self {
            repository,
            version,
            subpath: subpath.to_string(),
        }
    }

    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..self.clone()
        }
    }

    pub fn has_version(&self) -> bool {
        !self.version.is_empty()
    }

    /// Short name: the last path segment with any `.git` suffix removed.
    pub fn name(&self) -> String {
        let trimmed = self.repository.trim_end_matches('/');
        let last = trimmed
            .rsplit(|c: char| c == '/' || c == ':')
            .next()
            .unwrap_or(trimmed);
        last.strip_suffix(".git").unwrap_or(last).to_string()
    }

    /// Fully qualified clone URL.
    pub fn fetch_url(&self) -> String {
        let repo = self.repository.as_str();

        if has_scheme(repo) || repo.contains('@') {
            return repo.to_string();
        }

        let host = repo.split('/').next().unwrap_or_default();
        if host.contains('.') {
            if host.eq_ignore_ascii_case(GITHUB_HOST) && !repo.ends_with(".git") {
                format!("https://{}.git", repo)
            } else {
                format!("https://{}", repo)
            }
        } else {
            let repo = repo.strip_suffix(".git").unwrap_or(repo);
            format!("https://{}/{}.git", GITHUB_HOST, repo)
        }
    }

    /// Filesystem-safe token identifying the repository inside the store.
    pub fn sanitized_directory_name(&self) -> String {
        let url = self.fetch_url();
        let without_scheme = match url.split_once("://") {
            Some((_, rest)) => rest,
            None => url.as_str(),
        };
        let trimmed = without_scheme.trim_end_matches('/');
        let without_suffix = trimmed.strip_suffix(".git").unwrap_or(trimmed);
        without_suffix.replace(['/', ':', '@'], "_")
    }
}

/// Whether a version looks like a commit hash rather than a tag or branch.
pub fn looks_like_commit(version: &str) -> bool {
    (7..=40).contains(&version.len())
        && version
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

fn has_scheme(repo: &str) -> bool {
    match repo.split_once("://") {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

impl PartialEq for PackageReference {
    fn eq(&self, other: &Self) -> bool {
        self.repository == other.repository && self.version == other.version
    }
}

impl Eq for PackageReference {}

impl Hash for PackageReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.repository.hash(state);
        self.version.hash(state);
    }
}

impl fmt::Display for PackageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repository)?;
        if !self.version.is_empty() {
            write!(f, "@{}", self.version)?;
        }
        if !self.subpath.is_empty() {
            write!(f, "{}{}", SUBPATH_SEPARATOR, self.subpath)?;
        }
        Ok(())
    }
}

impl FromStr for PackageReference {
    type Err = KilnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let reference = Self::parse(s, "");
        if reference.repository.is_empty() || reference.repository.starts_with('-') {
            return Err(KilnError::InvalidRepositoryReference(s.to_string()));
        }
        Ok(reference)
    }
}
