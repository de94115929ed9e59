//! Resolved module metadata.
//!
//! Metadata attached to a graph node is either **real** (backed by a
//! fetched descriptor) or **virtual** (synthesized for a platform that
//! was never resolved to a real descriptor). Both variants share one
//! read-only accessor surface; mutation and artifact lookup are partial
//! operations that only the real variant supports. Callers branch on
//! `is_virtual()` instead of relying on failures for control flow.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use semver::Version;
use thiserror::Error;

use crate::core::artifact::ArtifactMetadata;
use crate::core::component_id::{ComponentId, ModuleId, ModuleVersionId};
use crate::core::constraint::DependencyRequest;
use crate::repository::RepositoryId;
use crate::resolver::lenient::VirtualPlatformState;
use crate::util::hash::{DescriptorHash, Fingerprint};
use crate::util::InternedString;

/// Contract violation against a metadata node.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// A mutation or artifact lookup was invoked against a virtual node.
    /// This is a programming error in the caller, never retried.
    #[error("operation `{operation}` is not supported on virtual module `{id}`")]
    UnsupportedOperation {
        operation: &'static str,
        id: String,
    },
}

/// A named configuration of a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    name: InternedString,
    extends: Vec<InternedString>,
}

impl Configuration {
    /// Create a configuration.
    pub fn new(name: impl Into<InternedString>) -> Self {
        Configuration {
            name: name.into(),
            extends: Vec::new(),
        }
    }

    /// Set parent configurations.
    pub fn extends(mut self, parents: Vec<InternedString>) -> Self {
        self.extends = parents;
        self
    }

    /// Get the configuration name.
    pub fn name(&self) -> InternedString {
        self.name
    }

    /// Get the parent configurations.
    pub fn parents(&self) -> &[InternedString] {
        &self.extends
    }
}

/// A consumable variant of a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    name: InternedString,
    attributes: BTreeMap<InternedString, String>,
    artifacts: Vec<ArtifactMetadata>,
}

impl Variant {
    /// Create a variant.
    pub fn new(name: impl Into<InternedString>) -> Self {
        Variant {
            name: name.into(),
            attributes: BTreeMap::new(),
            artifacts: Vec::new(),
        }
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, key: impl Into<InternedString>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Add an artifact.
    pub fn with_artifact(mut self, artifact: ArtifactMetadata) -> Self {
        self.artifacts.push(artifact);
        self
    }

    /// Get the variant name.
    pub fn name(&self) -> InternedString {
        self.name
    }

    /// Get the variant attributes.
    pub fn attributes(&self) -> &BTreeMap<InternedString, String> {
        &self.attributes
    }

    /// Get the variant artifacts.
    pub fn artifacts(&self) -> &[ArtifactMetadata] {
        &self.artifacts
    }
}

/// Real metadata backed by a fetched module descriptor.
///
/// Arc-backed so clones are cheap; the resolution session passes these
/// around freely.
#[derive(Clone)]
pub struct RealMetadata {
    inner: Arc<RealMetadataInner>,
}

#[derive(Clone)]
struct RealMetadataInner {
    component_id: ComponentId,
    module_version: ModuleVersionId,
    source: Option<RepositoryId>,
    content_hash: DescriptorHash,
    missing: bool,
    changing: bool,
    status: Option<String>,
    status_scheme: Vec<String>,
    attributes: BTreeMap<InternedString, String>,
    configurations: Vec<Configuration>,
    variants: Vec<Variant>,
    artifacts: BTreeSet<ArtifactMetadata>,
    dependencies: Vec<DependencyRequest>,
}

impl RealMetadata {
    /// Create real metadata for a module component.
    ///
    /// The descriptor content hash defaults to a fingerprint of the
    /// identity, dependency and artifact content; repositories that know
    /// the true descriptor hash override it via `MutableModuleMetadata`.
    pub fn new(module: ModuleId, version: Version) -> Self {
        let component_id = ComponentId::module(module, version.clone());
        let module_version = ModuleVersionId::new(module, version);
        let inner = RealMetadataInner {
            component_id,
            module_version,
            source: None,
            content_hash: DescriptorHash::from_hex(""),
            missing: false,
            changing: false,
            status: None,
            status_scheme: Vec::new(),
            attributes: BTreeMap::new(),
            configurations: Vec::new(),
            variants: Vec::new(),
            artifacts: BTreeSet::new(),
            dependencies: Vec::new(),
        };
        let mut metadata = RealMetadata {
            inner: Arc::new(inner),
        };
        metadata.recompute_hash();
        metadata
    }

    fn make_mut(&mut self) -> &mut RealMetadataInner {
        Arc::make_mut(&mut self.inner)
    }

    fn recompute_hash(&mut self) {
        let hash = {
            let inner = &self.inner;
            let mut fp = Fingerprint::new();
            fp.update_str(&inner.module_version.to_string());
            fp.update_bool(inner.missing).update_bool(inner.changing);
            for dep in &inner.dependencies {
                fp.update_str(&dep.to_string());
            }
            for artifact in &inner.artifacts {
                fp.update_str(&artifact.file_name());
            }
            fp.finish_hash()
        };
        self.make_mut().content_hash = hash;
    }

    /// Set the dependency list.
    pub fn with_dependencies(mut self, dependencies: Vec<DependencyRequest>) -> Self {
        self.make_mut().dependencies = dependencies;
        self.recompute_hash();
        self
    }

    /// Set the artifact set.
    pub fn with_artifacts(mut self, artifacts: impl IntoIterator<Item = ArtifactMetadata>) -> Self {
        self.make_mut().artifacts = artifacts.into_iter().collect();
        self.recompute_hash();
        self
    }

    /// Set the configuration list.
    pub fn with_configurations(mut self, configurations: Vec<Configuration>) -> Self {
        self.make_mut().configurations = configurations;
        self
    }

    /// Set the variant list.
    pub fn with_variants(mut self, variants: Vec<Variant>) -> Self {
        self.make_mut().variants = variants;
        self
    }

    /// Set the status and status scheme.
    pub fn with_status(mut self, status: impl Into<String>, scheme: Vec<String>) -> Self {
        let inner = self.make_mut();
        inner.status = Some(status.into());
        inner.status_scheme = scheme;
        self
    }

    /// Mark this metadata as missing from its repository.
    pub fn missing(mut self, missing: bool) -> Self {
        self.make_mut().missing = missing;
        self.recompute_hash();
        self
    }

    /// Get the component id.
    pub fn component_id(&self) -> ComponentId {
        self.inner.component_id
    }

    /// Get the module version id.
    pub fn module_version_id(&self) -> &ModuleVersionId {
        &self.inner.module_version
    }

    /// Get the descriptor content hash.
    pub fn content_hash(&self) -> &DescriptorHash {
        &self.inner.content_hash
    }

    /// Get the declared dependencies.
    pub fn dependencies(&self) -> &[DependencyRequest] {
        &self.inner.dependencies
    }

    /// Get the artifact set.
    pub fn artifacts(&self) -> &BTreeSet<ArtifactMetadata> {
        &self.inner.artifacts
    }

    /// Get a mutable copy of this metadata.
    pub fn as_mutable(&self) -> MutableModuleMetadata {
        MutableModuleMetadata {
            metadata: self.clone(),
        }
    }
}

impl std::fmt::Debug for RealMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealMetadata")
            .field("id", &format_args!("{}", self.inner.module_version))
            .field("dependencies", &self.inner.dependencies.len())
            .field("artifacts", &self.inner.artifacts.len())
            .field("missing", &self.inner.missing)
            .finish()
    }
}

/// An explicit mutation capability over real metadata.
///
/// Obtained from `RealMetadata::as_mutable` (or the checked
/// `ModuleMetadata::as_mutable`); mutate, then `freeze` back into an
/// immutable value.
#[derive(Debug, Clone)]
pub struct MutableModuleMetadata {
    metadata: RealMetadata,
}

impl MutableModuleMetadata {
    /// Mark the module as changing (snapshot-like).
    pub fn set_changing(&mut self, changing: bool) {
        self.metadata.make_mut().changing = changing;
    }

    /// Record the repository this metadata was resolved from.
    pub fn set_source(&mut self, source: RepositoryId) {
        self.metadata.make_mut().source = Some(source);
    }

    /// Override the descriptor content hash with the true value from the
    /// fetched descriptor.
    pub fn set_content_hash(&mut self, hash: DescriptorHash) {
        self.metadata.make_mut().content_hash = hash;
    }

    /// Add an attribute.
    pub fn set_attribute(&mut self, key: impl Into<InternedString>, value: impl Into<String>) {
        self.metadata
            .make_mut()
            .attributes
            .insert(key.into(), value.into());
    }

    /// Freeze back into immutable metadata.
    pub fn freeze(self) -> RealMetadata {
        self.metadata
    }
}

/// Virtual metadata standing in for an unresolved platform.
///
/// Terminal and read-only: it reports empty content everywhere and
/// rejects mutation.
#[derive(Debug, Clone)]
pub struct VirtualMetadata {
    component_id: ComponentId,
    module_version: ModuleVersionId,
    platform_state: Arc<VirtualPlatformState>,
}

impl VirtualMetadata {
    pub(crate) fn new(
        component_id: ComponentId,
        module_version: ModuleVersionId,
        platform_state: Arc<VirtualPlatformState>,
    ) -> Self {
        VirtualMetadata {
            component_id,
            module_version,
            platform_state,
        }
    }

    /// The shared per-platform state this node is bound to.
    pub fn platform_state(&self) -> &Arc<VirtualPlatformState> {
        &self.platform_state
    }
}

/// Metadata attached to a resolved graph node.
#[derive(Debug, Clone)]
pub enum ModuleMetadata {
    /// Backed by a fetched descriptor
    Real(RealMetadata),
    /// Synthesized placeholder for a platform constraint
    Virtual(VirtualMetadata),
}

impl ModuleMetadata {
    /// Get the component id.
    pub fn component_id(&self) -> ComponentId {
        match self {
            ModuleMetadata::Real(m) => m.component_id(),
            ModuleMetadata::Virtual(m) => m.component_id,
        }
    }

    /// Get the module version id.
    pub fn module_version_id(&self) -> &ModuleVersionId {
        match self {
            ModuleMetadata::Real(m) => m.module_version_id(),
            ModuleMetadata::Virtual(m) => &m.module_version,
        }
    }

    /// Check if this is a virtual placeholder.
    pub fn is_virtual(&self) -> bool {
        matches!(self, ModuleMetadata::Virtual(_))
    }

    /// Check if the module was reported missing by its repository.
    /// Virtual nodes are never missing.
    pub fn is_missing(&self) -> bool {
        match self {
            ModuleMetadata::Real(m) => m.inner.missing,
            ModuleMetadata::Virtual(_) => false,
        }
    }

    /// Check if the module is changing (snapshot-like).
    pub fn is_changing(&self) -> bool {
        match self {
            ModuleMetadata::Real(m) => m.inner.changing,
            ModuleMetadata::Virtual(_) => false,
        }
    }

    /// Names of the declared configurations.
    pub fn configuration_names(&self) -> Vec<InternedString> {
        match self {
            ModuleMetadata::Real(m) => m.inner.configurations.iter().map(|c| c.name()).collect(),
            ModuleMetadata::Virtual(_) => Vec::new(),
        }
    }

    /// Look up a configuration by name.
    pub fn configuration(&self, name: &str) -> Option<&Configuration> {
        match self {
            ModuleMetadata::Real(m) => m
                .inner
                .configurations
                .iter()
                .find(|c| c.name().as_str() == name),
            ModuleMetadata::Virtual(_) => None,
        }
    }

    /// The component's variants.
    pub fn variants(&self) -> &[Variant] {
        match self {
            ModuleMetadata::Real(m) => &m.inner.variants,
            ModuleMetadata::Virtual(_) => &[],
        }
    }

    /// The component's attributes.
    pub fn attributes(&self) -> Option<&BTreeMap<InternedString, String>> {
        match self {
            ModuleMetadata::Real(m) => Some(&m.inner.attributes),
            ModuleMetadata::Virtual(_) => None,
        }
    }

    /// The module status, e.g. "release".
    pub fn status(&self) -> Option<&str> {
        match self {
            ModuleMetadata::Real(m) => m.inner.status.as_deref(),
            ModuleMetadata::Virtual(_) => None,
        }
    }

    /// The status scheme the status belongs to.
    pub fn status_scheme(&self) -> &[String] {
        match self {
            ModuleMetadata::Real(m) => &m.inner.status_scheme,
            ModuleMetadata::Virtual(_) => &[],
        }
    }

    /// The repository this metadata was resolved from.
    pub fn source(&self) -> Option<&RepositoryId> {
        match self {
            ModuleMetadata::Real(m) => m.inner.source.as_ref(),
            ModuleMetadata::Virtual(_) => None,
        }
    }

    /// The descriptor content hash, if real.
    pub fn content_hash(&self) -> Option<&DescriptorHash> {
        match self {
            ModuleMetadata::Real(m) => Some(m.content_hash()),
            ModuleMetadata::Virtual(_) => None,
        }
    }

    /// Declared dependencies of the component.
    pub fn dependencies(&self) -> &[DependencyRequest] {
        match self {
            ModuleMetadata::Real(m) => m.dependencies(),
            ModuleMetadata::Virtual(_) => &[],
        }
    }

    /// Get a mutable copy. Fails on virtual nodes.
    pub fn as_mutable(&self) -> Result<MutableModuleMetadata, MetadataError> {
        match self {
            ModuleMetadata::Real(m) => Ok(m.as_mutable()),
            ModuleMetadata::Virtual(m) => Err(MetadataError::UnsupportedOperation {
                operation: "as_mutable",
                id: m.module_version.to_string(),
            }),
        }
    }

    /// Construct artifact metadata for this component. Fails on virtual
    /// nodes, which publish nothing.
    pub fn artifact(
        &self,
        kind: &str,
        extension: Option<&str>,
        classifier: Option<&str>,
    ) -> Result<ArtifactMetadata, MetadataError> {
        match self {
            ModuleMetadata::Real(m) => {
                let mut artifact =
                    ArtifactMetadata::new(m.module_version_id().module().name(), kind);
                if let Some(extension) = extension {
                    artifact = artifact.with_extension(extension);
                }
                if let Some(classifier) = classifier {
                    artifact = artifact.with_classifier(classifier);
                }
                Ok(artifact)
            }
            ModuleMetadata::Virtual(m) => Err(MetadataError::UnsupportedOperation {
                operation: "artifact",
                id: m.module_version.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::lenient::LenientPlatformProvider;

    fn module(name: &str) -> ModuleId {
        ModuleId::new("org.example", name)
    }

    #[test]
    fn test_real_metadata_hash_tracks_content() {
        let a = RealMetadata::new(module("lib"), Version::new(1, 0, 0));
        let b = RealMetadata::new(module("lib"), Version::new(1, 0, 0));
        assert_eq!(a.content_hash(), b.content_hash());

        let c = b
            .clone()
            .with_artifacts([ArtifactMetadata::new("lib", "lib").with_extension("a")]);
        assert_ne!(b.content_hash(), c.content_hash());
    }

    #[test]
    fn test_mutable_roundtrip() {
        let metadata = RealMetadata::new(module("lib"), Version::new(1, 0, 0));
        let mut mutable = metadata.as_mutable();
        mutable.set_changing(true);
        mutable.set_attribute("org.usage", "runtime");
        let frozen = mutable.freeze();

        let wrapped = ModuleMetadata::Real(frozen);
        assert!(wrapped.is_changing());
        assert_eq!(
            wrapped.attributes().unwrap().get(&InternedString::new("org.usage")),
            Some(&"runtime".to_string())
        );
        // Original unchanged
        assert!(!ModuleMetadata::Real(metadata).is_changing());
    }

    #[test]
    fn test_virtual_metadata_contract() {
        let provider = LenientPlatformProvider::default();
        let platform = module("platform");
        let metadata = provider.virtual_metadata(platform, &Version::new(1, 0, 0));

        assert!(metadata.is_virtual());
        assert!(!metadata.is_missing());
        assert!(!metadata.is_changing());
        assert!(metadata.configuration_names().is_empty());
        assert!(metadata.configuration("default").is_none());
        assert!(metadata.variants().is_empty());
        assert!(metadata.attributes().is_none());
        assert!(metadata.status().is_none());
        assert!(metadata.status_scheme().is_empty());
        assert!(metadata.source().is_none());
        assert!(metadata.content_hash().is_none());
        assert!(metadata.dependencies().is_empty());

        assert!(matches!(
            metadata.as_mutable(),
            Err(MetadataError::UnsupportedOperation { operation: "as_mutable", .. })
        ));
        assert!(matches!(
            metadata.artifact("lib", Some("a"), None),
            Err(MetadataError::UnsupportedOperation { operation: "artifact", .. })
        ));
    }

    #[test]
    fn test_configuration_lookup() {
        let metadata = RealMetadata::new(module("lib"), Version::new(1, 0, 0)).with_configurations(
            vec![
                Configuration::new("api"),
                Configuration::new("runtime").extends(vec![InternedString::new("api")]),
            ],
        );
        let wrapped = ModuleMetadata::Real(metadata);

        assert_eq!(wrapped.configuration_names().len(), 2);
        let runtime = wrapped.configuration("runtime").unwrap();
        assert_eq!(runtime.parents(), &[InternedString::new("api")]);
    }
}
