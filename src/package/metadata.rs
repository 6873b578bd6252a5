use anyhow::Result;
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::KilnError;
use crate::runtime::Runtime;

/// Reverse lookup from repository to its directory in the store, persisted as
/// `metadata.json`. Entries keep insertion order, which decides short-name
/// lookups.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    #[serde(default)]
    pub packages: IndexMap<String, String>,
}

impl Metadata {
    /// Load the map, or an empty one if the file does not exist yet.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        if !runtime.exists(path) {
            debug!("No metadata at {:?}", path);
            return Ok(Self::default());
        }
        let content = runtime.read_to_string(path)?;
        let metadata: Metadata = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse {:?}: {}", path, e))?;
        Ok(metadata)
    }

    /// Write the map, creating the store directory if needed.
    #[tracing::instrument(skip(self, runtime))]
    pub fn save<R: Runtime>(&self, runtime: &R, path: &Path) -> Result<()> {
        let persistence = |e: anyhow::Error| KilnError::Persistence {
            path: path.to_path_buf(),
            reason: format!("{:#}", e),
        };

        if let Some(parent) = path.parent()
            && !runtime.exists(parent)
        {
            runtime.create_dir_all(parent).map_err(persistence)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        runtime
            .write(path, content.as_bytes())
            .map_err(persistence)?;
        Ok(())
    }

    /// Map `repository` to `directory`. Returns true if the map changed.
    pub fn upsert(&mut self, repository: &str, directory: &str) -> bool {
        match self.packages.get(repository) {
            Some(existing) if existing == directory => false,
            _ => {
                self.packages
                    .insert(repository.to_string(), directory.to_string());
                true
            }
        }
    }

    /// Every repository mapped to `directory`, in insertion order.
    pub fn repositories_for(&self, directory: &str) -> Vec<&str> {
        self.packages
            .iter()
            .filter(|(_, dir)| dir.as_str() == directory)
            .map(|(repo, _)| repo.as_str())
            .collect()
    }

    /// The single repository mapped to `directory`.
    pub fn repository_for(&self, directory: &str) -> Result<&str, KilnError> {
        match self.repositories_for(directory).as_slice() {
            [repository] => Ok(*repository),
            repositories => Err(KilnError::InconsistentCache {
                directory: directory.to_string(),
                repositories: repositories.iter().map(|r| r.to_string()).collect(),
            }),
        }
    }

    /// First repository whose lowercase form contains `name` (case-insensitive).
    pub fn find_by_name(&self, name: &str) -> Option<(&str, &str)> {
        let needle = name.to_lowercase();
        self.packages
            .iter()
            .find(|(repo, _)| repo.to_lowercase().contains(&needle))
            .map(|(repo, dir)| (repo.as_str(), dir.as_str()))
    }

    /// Drop every entry pointing at `directory`. Returns the removed repositories.
    pub fn remove_directory(&mut self, directory: &str) -> Vec<String> {
        let removed: Vec<String> = self
            .repositories_for(directory)
            .into_iter()
            .map(String::from)
            .collect();
        self.packages.retain(|_, dir| dir != directory);
        removed
    }
}
