//! Ballast is a dependency graph resolution engine.
//!
//! Given a set of root dependency requests and a list of repositories,
//! a [`ResolveSession`] builds a graph with exactly one selected version
//! per module. Version conflicts resolve highest-wins unless pinned by a
//! strict constraint; platform constraints that never resolve to a real
//! descriptor are satisfied leniently with virtual nodes; artifact sets
//! are served from an in-memory [`cache`] keyed by repository, component
//! and resolution context; and artifact transforms declared on edges are
//! registered with unique identities for an external execution
//! scheduler.
//!
//! Failures affecting a single node (a missing module, a repository
//! error) are tolerated and reported on the [`ResolutionResult`];
//! failures poisoning the whole session (disagreeing strict constraints,
//! self-referential dependencies) fail the resolve call.

pub mod cache;
pub mod core;
pub mod repository;
pub mod resolver;
pub mod transform;
pub mod util;

pub use cache::{CachedArtifacts, ModuleArtifactsCache};
pub use crate::core::{
    ArtifactMetadata, ComponentId, DependencyRequest, ModuleId, ModuleMetadata, ModuleVersionId,
    RealMetadata, RequestKind, SubstitutionRule, VersionConstraint,
};
pub use repository::{InMemoryRepository, Repository, RepositoryId};
pub use resolver::{
    CancellationToken, NodeFailure, ResolutionResult, ResolveError, ResolveSession, ResolvedGraph,
};
pub use transform::{TransformRegistration, Transformation, TransformationId};
pub use util::ResolveConfig;
