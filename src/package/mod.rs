//! Package identity, the on-disk store, the link directory and the manifest.

mod link;
mod manifest;
mod metadata;
mod reference;
mod store;
mod version;

pub use link::{LinkManager, LinkOutcome, LinkTarget, Overwrite};
pub use manifest::{Manifest, ManifestDiagnostic};
pub use metadata::Metadata;
pub use reference::{PackageReference, SUBPATH_SEPARATOR, looks_like_commit};
pub use store::{InstalledPackage, InstalledVersion, PackageStore, UninstallReport, version_dir_name};
pub use version::{DEFAULT_BRANCH, RemoteRefs, VersionResolver, parse_tolerant};

#[cfg(test)]
pub use version::MockRemoteRefs;
