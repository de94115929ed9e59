//! In-memory repository.
//!
//! Holds pre-built metadata keyed by module and version. Used as the
//! backing store for local/declared modules and as the repository
//! double in tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use semver::Version;
use url::Url;

use crate::core::{ArtifactMetadata, ComponentId, ModuleId, RealMetadata};

use super::{MetadataLookup, Repository, RepositoryError, RepositoryId};

/// A repository serving metadata from process memory.
pub struct InMemoryRepository {
    id: RepositoryId,
    modules: RwLock<HashMap<ModuleId, BTreeMap<Version, RealMetadata>>>,
}

impl InMemoryRepository {
    /// Create an empty repository with the given name.
    pub fn new(name: &str) -> Self {
        let url = Url::parse(&format!("memory://{}", name))
            .unwrap_or_else(|_| Url::parse("memory://repository").unwrap());
        InMemoryRepository {
            id: RepositoryId::new(name, url),
            modules: RwLock::new(HashMap::new()),
        }
    }

    /// Add module metadata. Replaces any previous metadata for the same
    /// module version.
    pub fn add(&self, metadata: RealMetadata) {
        let mvid = metadata.module_version_id().clone();
        self.modules
            .write()
            .unwrap()
            .entry(mvid.module())
            .or_default()
            .insert(mvid.version().clone(), metadata);
    }

    fn lookup(&self, component: ComponentId) -> Option<RealMetadata> {
        let module = component.module_id()?;
        let version = component.version()?;
        self.modules
            .read()
            .unwrap()
            .get(&module)
            .and_then(|versions| versions.get(version))
            .cloned()
    }
}

impl Repository for InMemoryRepository {
    fn id(&self) -> &RepositoryId {
        &self.id
    }

    fn list_versions(&self, module: ModuleId) -> Result<Vec<Version>, RepositoryError> {
        Ok(self
            .modules
            .read()
            .unwrap()
            .get(&module)
            .map(|versions| versions.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn resolve_metadata(&self, component: ComponentId) -> Result<MetadataLookup, RepositoryError> {
        match self.lookup(component) {
            Some(metadata) => {
                let mut mutable = metadata.as_mutable();
                mutable.set_source(self.id.clone());
                Ok(MetadataLookup::Found(mutable.freeze()))
            }
            None => Ok(MetadataLookup::NotFound),
        }
    }

    fn resolve_artifacts(
        &self,
        component: ComponentId,
        _context: &str,
    ) -> Result<Vec<ArtifactMetadata>, RepositoryError> {
        match self.lookup(component) {
            Some(metadata) => Ok(metadata.artifacts().iter().cloned().collect()),
            None => Err(RepositoryError::new(
                &self.id,
                format!("no artifacts for unknown component {}", component),
            )),
        }
    }
}
