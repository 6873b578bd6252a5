//! Version resolution for unpinned references.
//!
//! Remote tags are read through [`RemoteRefs`]; the highest tag that parses as
//! a semantic version wins, otherwise the default branch is used.

use anyhow::Result;
use log::{debug, warn};
use semver::Version;

use super::PackageReference;

/// Branch used when the remote does not advertise its `HEAD`.
pub const DEFAULT_BRANCH: &str = "master";

/// Read-only view of a remote repository's refs.
#[cfg_attr(test, mockall::automock)]
pub trait RemoteRefs {
    /// Tag names of the remote. Fails with `RepositoryNotFound` when the remote
    /// cannot be reached.
    fn list_tags(&self, url: &str) -> Result<Vec<String>>;

    /// Branch the remote `HEAD` points to, if it says.
    fn default_branch(&self, url: &str) -> Result<Option<String>>;
}

/// Version resolver - stateless, nothing is cached between calls.
pub struct VersionResolver;

impl VersionResolver {
    /// Pick the version to install for `reference`, whose version is empty.
    #[tracing::instrument(skip(remote))]
    pub fn resolve<G: RemoteRefs + ?Sized>(
        remote: &G,
        reference: &PackageReference,
    ) -> Result<String> {
        let url = reference.fetch_url();
        let tags = remote.list_tags(&url)?;
        debug!("{} has {} tag(s)", url, tags.len());

        if let Some(tag) = Self::latest_tag(&tags) {
            return Ok(tag.to_string());
        }

        let branch = match remote.default_branch(&url) {
            Ok(Some(branch)) => branch,
            Ok(None) => DEFAULT_BRANCH.to_string(),
            Err(e) => {
                warn!("Could not query default branch of {}: {}", url, e);
                DEFAULT_BRANCH.to_string()
            }
        };
        debug!("No semantic version tags for {}, using branch {}", url, branch);
        Ok(branch)
    }

    /// The original tag string of the highest semantic version among `tags`.
    /// On equal versions (`v1.0.0` and `1.0.0`) the first listed wins.
    pub fn latest_tag(tags: &[String]) -> Option<&str> {
        let mut best: Option<(Version, &str)> = None;
        for tag in tags {
            let Some(version) = parse_tolerant(tag) else {
                continue;
            };
            let is_better = match &best {
                Some((current, _)) => version > *current,
                None => true,
            };
            if is_better {
                best = Some((version, tag.as_str()));
            }
        }
        best.map(|(_, tag)| tag)
    }
}

/// Parse a tag as a semantic version, accepting a `v` prefix and missing
/// minor/patch components (`v2` is `2.0.0`, `1.4-beta` is `1.4.0-beta`).
pub fn parse_tolerant(tag: &str) -> Option<Version> {
    let trimmed = tag.trim();
    let stripped = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);
    let split = stripped.find(['-', '+']).unwrap_or(stripped.len());
    let (core, rest) = stripped.split_at(split);

    let padded = match core.split('.').count() {
        1 => format!("{}.0.0{}", core, rest),
        2 => format!("{}.0{}", core, rest),
        _ => stripped.to_string(),
    };
    Version::parse(&padded).ok()
}
