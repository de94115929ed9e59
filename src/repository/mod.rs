//! Repository collaborator interface.
//!
//! Fetching real module descriptors and artifacts is delegated to
//! repositories; this core consumes them through the `Repository` trait
//! and treats each call as a suspension point that yields either
//! metadata or a per-node failure. The wire protocol behind a
//! repository is not this crate's concern.

pub mod memory;

use std::fmt;

use semver::Version;
use thiserror::Error;
use url::Url;

use crate::core::{ArtifactMetadata, ComponentId, ModuleId, RealMetadata};
use crate::util::InternedString;

pub use memory::InMemoryRepository;

/// Identity of a configured repository. Part of every artifacts cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryId {
    name: InternedString,
    url: Url,
}

impl RepositoryId {
    /// Create a repository identity.
    pub fn new(name: impl Into<InternedString>, url: Url) -> Self {
        RepositoryId {
            name: name.into(),
            url,
        }
    }

    /// Get the repository name.
    pub fn name(&self) -> InternedString {
        self.name
    }

    /// Get the repository URL.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.url)
    }
}

/// Error raised by a repository while fetching.
#[derive(Debug, Error)]
#[error("repository `{repository}`: {message}")]
pub struct RepositoryError {
    pub repository: String,
    pub message: String,
}

impl RepositoryError {
    /// Create a repository error.
    pub fn new(repository: &RepositoryId, message: impl Into<String>) -> Self {
        RepositoryError {
            repository: repository.name().to_string(),
            message: message.into(),
        }
    }
}

/// Outcome of a metadata fetch.
#[derive(Debug, Clone)]
pub enum MetadataLookup {
    /// The repository knows the component
    Found(RealMetadata),
    /// The repository does not have the component; not an error
    NotFound,
}

/// A source of module metadata and artifacts.
///
/// Implementations may block or suspend internally; the graph builder
/// never holds a lock across these calls.
pub trait Repository: Send + Sync {
    /// This repository's identity.
    fn id(&self) -> &RepositoryId;

    /// Versions of a module this repository can supply, unordered.
    fn list_versions(&self, module: ModuleId) -> Result<Vec<Version>, RepositoryError>;

    /// Resolve the descriptor for one component.
    fn resolve_metadata(&self, component: ComponentId) -> Result<MetadataLookup, RepositoryError>;

    /// Resolve the artifact set for one component in a resolution context.
    fn resolve_artifacts(
        &self,
        component: ComponentId,
        context: &str,
    ) -> Result<Vec<ArtifactMetadata>, RepositoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_id_equality() {
        let url = Url::parse("https://repo.example/central").unwrap();
        let a = RepositoryId::new("central", url.clone());
        let b = RepositoryId::new("central", url);
        let c = RepositoryId::new("central", Url::parse("https://other.example").unwrap());

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_repository_id_display() {
        let id = RepositoryId::new("central", Url::parse("https://repo.example/c").unwrap());
        assert_eq!(id.to_string(), "central (https://repo.example/c)");
    }
}
