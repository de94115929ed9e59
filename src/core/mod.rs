//! Core data model: identities, constraints and module metadata.

pub mod artifact;
pub mod component_id;
pub mod constraint;
pub mod metadata;

pub use artifact::ArtifactMetadata;
pub use component_id::{ComponentId, ModuleId, ModuleVersionId};
pub use constraint::{DependencyRequest, RequestKind, SubstitutionRule, VersionConstraint};
pub use metadata::{
    Configuration, MetadataError, ModuleMetadata, MutableModuleMetadata, RealMetadata, Variant,
    VirtualMetadata,
};
