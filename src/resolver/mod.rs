//! Dependency graph resolution.
//!
//! A `ResolveSession` owns the collaborators one resolution needs:
//! repositories, the artifacts cache, conflict settings, the lenient
//! platform provider and transform bookkeeping. `resolve` expands the
//! declared root requests into a `ResolvedGraph` with exactly one
//! version selected per module, tolerating per-node failures and
//! aggregating session failures.

mod builder;
pub mod conflicts;
pub mod errors;
pub mod graph;
pub mod lenient;

pub use conflicts::{select_version, CandidateRequest, VersionOrdering};
pub use errors::ResolveError;
pub use graph::{ExcludedNode, ExclusionReason, ResolvedGraph};
pub use lenient::{LenientPlatformProvider, VirtualPlatformState};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cache::ModuleArtifactsCache;
use crate::core::component_id::ModuleId;
use crate::core::constraint::{DependencyRequest, SubstitutionRule};
use crate::repository::Repository;
use crate::transform::{
    ClosureResolverFactory, ExtraDependenciesResolverFactory, TransformRegistration,
    TransformationIdSequence,
};
use crate::util::config::ResolveConfig;
use crate::util::diagnostic::Diagnostic;
use crate::util::time::{Clock, SystemClock};

use builder::GraphBuilder;

/// Cooperative cancellation handle for a resolution session.
///
/// Cancellation is observed at loop boundaries: in-flight repository
/// calls complete, but their results stop being recorded and no cache
/// writes happen afterwards.
#[derive(Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Check whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// A failure recorded against one node without aborting the walk.
#[derive(Debug)]
pub struct NodeFailure {
    /// The module the failure is recorded against
    pub module: ModuleId,
    /// The underlying error, `NotFound` or `Repository`
    pub error: ResolveError,
}

/// The outcome of a completed resolution.
#[derive(Debug)]
pub struct ResolutionResult {
    graph: ResolvedGraph,
    failures: Vec<NodeFailure>,
    transforms: Vec<TransformRegistration>,
}

impl ResolutionResult {
    pub(crate) fn new(
        graph: ResolvedGraph,
        failures: Vec<NodeFailure>,
        transforms: Vec<TransformRegistration>,
    ) -> Self {
        ResolutionResult {
            graph,
            failures,
            transforms,
        }
    }

    /// The resolved graph.
    pub fn graph(&self) -> &ResolvedGraph {
        &self.graph
    }

    /// Per-node failures tolerated during the walk.
    pub fn failures(&self) -> &[NodeFailure] {
        &self.failures
    }

    /// Check if any node failed to resolve.
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Transform invocations registered along graph edges, in
    /// registration order.
    pub fn transforms(&self) -> &[TransformRegistration] {
        &self.transforms
    }

    /// User-facing diagnostics for every tolerated failure.
    pub fn report(&self) -> Vec<Diagnostic> {
        self.failures
            .iter()
            .map(|f| f.error.to_diagnostic())
            .collect()
    }
}

/// One dependency resolution session.
pub struct ResolveSession {
    repositories: Vec<Arc<dyn Repository>>,
    cache: Arc<ModuleArtifactsCache>,
    config: ResolveConfig,
    context: String,
    substitutions: Vec<SubstitutionRule>,
    lenient: LenientPlatformProvider,
    transform_ids: TransformationIdSequence,
    resolver_factory: Arc<dyn ExtraDependenciesResolverFactory>,
    cancellation: CancellationToken,
}

impl ResolveSession {
    /// Create a session with its own cache, backed by the system clock.
    pub fn new(config: ResolveConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a session with an explicit time source.
    pub fn with_clock(config: ResolveConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_cache(config, Arc::new(ModuleArtifactsCache::new(clock)))
    }

    /// Create a session sharing an existing cache. The cache outlives
    /// any one session.
    pub fn with_cache(config: ResolveConfig, cache: Arc<ModuleArtifactsCache>) -> Self {
        ResolveSession {
            repositories: Vec::new(),
            cache,
            config,
            context: "default".to_string(),
            substitutions: Vec::new(),
            lenient: LenientPlatformProvider::default(),
            transform_ids: TransformationIdSequence::new(),
            resolver_factory: Arc::new(ClosureResolverFactory::default()),
            cancellation: CancellationToken::new(),
        }
    }

    /// Add a repository. Repositories are consulted in insertion order.
    pub fn add_repository(&mut self, repository: Arc<dyn Repository>) -> &mut Self {
        self.repositories.push(repository);
        self
    }

    /// Add a dependency substitution rule. The first matching rule wins.
    pub fn add_substitution(&mut self, rule: SubstitutionRule) -> &mut Self {
        self.substitutions.push(rule);
        self
    }

    /// Set the resolution context used in cache keys, e.g. a
    /// configuration name.
    pub fn set_context(&mut self, context: impl Into<String>) -> &mut Self {
        self.context = context.into();
        self
    }

    /// Replace the extra-dependencies resolver factory for transforms.
    pub fn set_resolver_factory(
        &mut self,
        factory: Arc<dyn ExtraDependenciesResolverFactory>,
    ) -> &mut Self {
        self.resolver_factory = factory;
        self
    }

    /// A cancellation handle for this session, safe to hand to another
    /// thread.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// The artifacts cache backing this session.
    pub fn cache(&self) -> &Arc<ModuleArtifactsCache> {
        &self.cache
    }

    /// The lenient platform provider backing this session.
    pub fn lenient_platforms(&self) -> &LenientPlatformProvider {
        &self.lenient
    }

    /// Resolve the given root requests into a dependency graph.
    ///
    /// Per-node failures are collected on the returned result; session
    /// failures (strict conflicts, self-referential dependencies and
    /// cancellation) fail the whole call.
    pub fn resolve(
        &self,
        roots: Vec<DependencyRequest>,
    ) -> Result<ResolutionResult, ResolveError> {
        tracing::info!(roots = roots.len(), context = %self.context, "resolving dependency graph");

        let builder = GraphBuilder::new(
            &self.repositories,
            &self.cache,
            &self.lenient,
            &self.config,
            &self.context,
            &self.substitutions,
            &self.cancellation,
            &self.transform_ids,
            &self.resolver_factory,
        );
        let result = builder.build(roots)?;

        tracing::info!(
            components = result.graph().len(),
            failures = result.failures().len(),
            transforms = result.transforms().len(),
            "resolution finished"
        );
        Ok(result)
    }
}
