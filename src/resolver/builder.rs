//! Dependency graph construction.
//!
//! The builder expands declared requests node by node, consulting the
//! artifacts cache before any repository fetch, synthesizing virtual
//! platform nodes where no real metadata exists, and running version
//! conflict resolution as requests accumulate. A losing candidate's
//! contributions are retracted so the graph converges on one version
//! per module regardless of discovery order. Per-node failures are
//! tolerated; session failures are aggregated over the whole walk.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use rayon::prelude::*;
use semver::Version;

use crate::cache::ModuleArtifactsCache;
use crate::core::component_id::{ComponentId, ModuleId};
use crate::core::constraint::{DependencyRequest, RequestKind, SubstitutionRule};
use crate::core::metadata::ModuleMetadata;
use crate::repository::{MetadataLookup, Repository};
use crate::transform::{
    ExtraDependenciesResolverFactory, TransformRegistration, TransformationIdSequence,
};
use crate::util::config::ResolveConfig;

use super::conflicts::{self, CandidateRequest};
use super::errors::ResolveError;
use super::graph::{ExcludedNode, ExclusionReason, ResolvedGraph};
use super::lenient::LenientPlatformProvider;
use super::{CancellationToken, NodeFailure, ResolutionResult};

/// Lifecycle of a selected graph node within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeState {
    Resolved,
    Finalized,
    Excluded,
}

struct NodeRecord {
    metadata: ModuleMetadata,
    state: NodeState,
    expanded: bool,
}

/// One live dependency request against a module.
struct LiveRequest {
    /// Requesting node; `None` for root requests
    from: Option<ComponentId>,
    /// Display name of the requester, for diagnostics
    requester: String,
    request: DependencyRequest,
    /// The version this request resolved to, if any
    candidate: Option<Version>,
    /// Modules along the path from the root to the requester
    path: Vec<ModuleId>,
    /// Exclusions accumulated along that path
    excludes: Vec<ModuleId>,
}

#[derive(Default)]
struct ModuleState {
    requests: Vec<LiveRequest>,
    selected: Option<Version>,
    /// Selection failed with a strict conflict; leave the module alone
    poisoned: bool,
}

impl ModuleState {
    fn platform_only(&self) -> bool {
        !self.requests.is_empty()
            && self
                .requests
                .iter()
                .all(|r| r.request.kind() == RequestKind::Platform)
    }
}

struct QueuedRequest {
    from: Option<ComponentId>,
    requester: String,
    request: DependencyRequest,
    path: Vec<ModuleId>,
    excludes: Vec<ModuleId>,
}

pub(crate) struct GraphBuilder<'a> {
    repositories: &'a [Arc<dyn Repository>],
    cache: &'a ModuleArtifactsCache,
    lenient: &'a LenientPlatformProvider,
    config: &'a ResolveConfig,
    context: &'a str,
    substitutions: &'a [SubstitutionRule],
    cancellation: &'a CancellationToken,
    transform_ids: &'a TransformationIdSequence,
    resolver_factory: &'a Arc<dyn ExtraDependenciesResolverFactory>,

    queue: VecDeque<QueuedRequest>,
    modules: HashMap<ModuleId, ModuleState>,
    nodes: HashMap<ComponentId, NodeRecord>,
    versions_memo: HashMap<ModuleId, Vec<Version>>,
    metadata_memo: HashMap<ComponentId, Option<ModuleMetadata>>,
    excluded: Vec<ExcludedNode>,
    failures: Vec<NodeFailure>,
    session_errors: Vec<ResolveError>,
}

impl<'a> GraphBuilder<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        repositories: &'a [Arc<dyn Repository>],
        cache: &'a ModuleArtifactsCache,
        lenient: &'a LenientPlatformProvider,
        config: &'a ResolveConfig,
        context: &'a str,
        substitutions: &'a [SubstitutionRule],
        cancellation: &'a CancellationToken,
        transform_ids: &'a TransformationIdSequence,
        resolver_factory: &'a Arc<dyn ExtraDependenciesResolverFactory>,
    ) -> Self {
        GraphBuilder {
            repositories,
            cache,
            lenient,
            config,
            context,
            substitutions,
            cancellation,
            transform_ids,
            resolver_factory,
            queue: VecDeque::new(),
            modules: HashMap::new(),
            nodes: HashMap::new(),
            versions_memo: HashMap::new(),
            metadata_memo: HashMap::new(),
            excluded: Vec::new(),
            failures: Vec::new(),
            session_errors: Vec::new(),
        }
    }

    /// Build the graph from the declared root requests.
    pub(crate) fn build(
        mut self,
        roots: Vec<DependencyRequest>,
    ) -> Result<ResolutionResult, ResolveError> {
        self.prefetch_versions(&roots);

        for request in roots {
            let excludes = request.exclusions().to_vec();
            self.queue.push_back(QueuedRequest {
                from: None,
                requester: "root".to_string(),
                request,
                path: Vec::new(),
                excludes,
            });
        }

        while let Some(queued) = self.queue.pop_front() {
            if self.cancellation.is_cancelled() {
                tracing::debug!("resolution cancelled, abandoning in-flight work");
                return Err(ResolveError::Cancelled);
            }
            self.process_request(queued);
        }

        self.finalize()
    }

    /// Warm the version-listing memo for independent root subgraphs in
    /// parallel. Listing failures degrade to an empty listing here and
    /// surface later, when metadata resolution fails.
    fn prefetch_versions(&mut self, roots: &[DependencyRequest]) {
        let pending: Vec<ModuleId> = roots
            .iter()
            .map(|r| self.substituted(r).module())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let repositories = self.repositories;
        let fetched: Vec<(ModuleId, Vec<Version>)> = pending
            .par_iter()
            .map(|&module| (module, list_all_versions(repositories, module)))
            .collect();

        for (module, versions) in fetched {
            self.versions_memo.insert(module, versions);
        }
    }

    fn substituted(&self, request: &DependencyRequest) -> DependencyRequest {
        for rule in self.substitutions {
            if let Some(rewritten) = rule.apply(request) {
                tracing::debug!(
                    from = %request.module(),
                    to = %rewritten.module(),
                    "substituting dependency"
                );
                return rewritten;
            }
        }
        request.clone()
    }

    fn process_request(&mut self, queued: QueuedRequest) {
        // A queue entry from a node that has since lost conflict
        // resolution is stale; dropping it completes the retraction of
        // everything that node contributed.
        if let Some(from) = queued.from {
            let alive = self
                .nodes
                .get(&from)
                .map(|record| record.state != NodeState::Excluded)
                .unwrap_or(false);
            if !alive {
                tracing::debug!(
                    from = %from,
                    module = %queued.request.module(),
                    "dropping stale request from deselected node"
                );
                return;
            }
        }

        let request = self.substituted(&queued.request);
        let module = request.module();

        if queued.excludes.contains(&module) {
            self.excluded.push(ExcludedNode {
                module,
                component: None,
                reason: ExclusionReason::ByRule {
                    requester: queued.requester.clone(),
                },
            });
            return;
        }

        // A component depending on its own module is a true error cycle;
        // any other revisit is an ordinary graph cycle, broken silently
        // because nodes expand at most once.
        if queued.path.last() == Some(&module) {
            let mut path: Vec<String> = queued.path.iter().map(|m| m.to_string()).collect();
            path.push(module.to_string());
            self.session_errors.push(ResolveError::CyclicDependency {
                module: module.to_string(),
                path,
            });
            return;
        }

        let candidate = self.candidate_for(&request, &queued.requester);

        let state = self.modules.entry(module).or_default();
        state.requests.push(LiveRequest {
            from: queued.from,
            requester: queued.requester,
            request,
            candidate,
            path: queued.path,
            excludes: queued.excludes,
        });

        self.reselect(module);
    }

    /// Resolve the candidate version for one request, recording a
    /// per-node failure when nothing matches.
    fn candidate_for(&mut self, request: &DependencyRequest, requester: &str) -> Option<Version> {
        let module = request.module();
        let versions = self.versions_for(module);

        let best = versions
            .iter()
            .filter(|v| request.constraint().matches(v))
            .max()
            .cloned();
        if let Some(best) = best {
            return Some(best);
        }

        // Platform constraints are satisfiable without a real module:
        // the exact constrained version names the virtual node.
        if request.kind() == RequestKind::Platform {
            if let Some(version) = request.constraint().exact_version() {
                return Some(version);
            }
        }

        tracing::warn!(module = %module, requirement = %request.constraint(), "module not found");
        self.failures.push(NodeFailure {
            module,
            error: ResolveError::NotFound {
                module: module.to_string(),
                requirement: request.constraint().to_string(),
                requesters: vec![requester.to_string()],
            },
        });
        None
    }

    fn versions_for(&mut self, module: ModuleId) -> Vec<Version> {
        if let Some(versions) = self.versions_memo.get(&module) {
            return versions.clone();
        }
        let versions = list_all_versions(self.repositories, module);
        self.versions_memo.insert(module, versions.clone());
        versions
    }

    /// Re-run conflict resolution for a module against its live requests.
    fn reselect(&mut self, module: ModuleId) {
        let Some(state) = self.modules.get(&module) else {
            return;
        };
        if state.poisoned {
            return;
        }

        let candidates: Vec<CandidateRequest> = state
            .requests
            .iter()
            .filter_map(|r| {
                r.candidate.as_ref().map(|candidate| CandidateRequest {
                    requester: r.requester.clone(),
                    constraint: r.request.constraint().clone(),
                    candidate: candidate.clone(),
                })
            })
            .collect();

        let selected =
            match conflicts::select_version(module, self.config.resolution.ordering, &candidates) {
                Ok(selected) => selected,
                Err(error) => {
                    self.session_errors.push(error);
                    self.modules.get_mut(&module).unwrap().poisoned = true;
                    return;
                }
            };

        let previous = state.selected.clone();
        if previous == selected {
            // Selection unchanged; make sure the node exists and is expanded
            if let Some(version) = selected {
                self.ensure_selected_node(module, version);
            }
            return;
        }

        tracing::debug!(
            module = %module,
            from = ?previous,
            to = ?selected,
            "conflict resolution changed selection"
        );

        self.modules.get_mut(&module).unwrap().selected = selected.clone();

        if let Some(old_version) = previous {
            let loser = ComponentId::module(module, old_version);
            if let Some(record) = self.nodes.get_mut(&loser) {
                record.state = NodeState::Excluded;
            }
            // A module whose last request was retracted just leaves the
            // graph; only an actual replacement is a conflict loss.
            if let Some(winner) = selected.clone().map(|v| ComponentId::module(module, v)) {
                self.excluded.push(ExcludedNode {
                    module,
                    component: Some(loser),
                    reason: ExclusionReason::ConflictLoser { winner },
                });
            }
            self.retract_contributions(loser);
        }

        if let Some(version) = selected {
            self.ensure_selected_node(module, version);
        }
    }

    /// Remove every live request contributed by a deselected node,
    /// drop the per-node failures those requests recorded, and re-run
    /// selection on the modules the node touched.
    fn retract_contributions(&mut self, loser: ComponentId) {
        let mut affected = Vec::new();
        let mut dead: Vec<(ModuleId, String)> = Vec::new();
        for (&module, state) in self.modules.iter_mut() {
            let before = state.requests.len();
            state.requests.retain(|r| {
                if r.from == Some(loser) {
                    dead.push((module, r.requester.clone()));
                    false
                } else {
                    true
                }
            });
            if state.requests.len() != before {
                affected.push(module);
            }
        }

        // A NotFound recorded for a retracted request no longer names
        // anything a live node requires.
        if !dead.is_empty() {
            self.failures.retain(|f| match &f.error {
                ResolveError::NotFound { requesters, .. } => !dead
                    .iter()
                    .any(|(module, requester)| {
                        *module == f.module && requesters.contains(requester)
                    }),
                _ => true,
            });
        }

        affected.sort();
        for module in affected {
            self.reselect(module);
        }
    }

    /// Create, resolve and expand the node for a module's selected
    /// version. Idempotent: a node expands at most once per session.
    fn ensure_selected_node(&mut self, module: ModuleId, version: Version) {
        let component = ComponentId::module(module, version.clone());

        if !self.nodes.contains_key(&component) {
            let state = &self.modules[&module];
            let platform_only = state.platform_only();

            let metadata = match self.fetch_metadata(component) {
                Some(metadata) => Some(metadata),
                None if platform_only => {
                    Some(self.lenient.virtual_metadata(module, &version))
                }
                None => None,
            };

            let Some(metadata) = metadata else {
                // Listed but unresolvable; already recorded as a failure
                return;
            };

            self.nodes.insert(
                component,
                NodeRecord {
                    metadata,
                    state: NodeState::Resolved,
                    expanded: false,
                },
            );
        } else if self.nodes[&component].state == NodeState::Excluded {
            // Re-selected after losing an earlier conflict round. Its
            // contributions were retracted, so it must expand again, and
            // the stale exclusion record no longer applies.
            let record = self.nodes.get_mut(&component).unwrap();
            record.state = NodeState::Resolved;
            record.expanded = false;
            self.excluded.retain(|e| e.component != Some(component));
        }

        self.expand(component, module);
    }

    /// Enqueue the dependencies of a newly selected node.
    fn expand(&mut self, component: ComponentId, module: ModuleId) {
        let record = self.nodes.get_mut(&component).unwrap();
        if record.expanded {
            return;
        }
        record.expanded = true;

        let metadata = record.metadata.clone();
        let requester = metadata.module_version_id().to_string();

        // Children inherit the path and exclusions of the first live
        // request that reached this node.
        let (base_path, base_excludes) = {
            let state = &self.modules[&module];
            state
                .requests
                .iter()
                .find(|r| r.candidate.as_ref() == component.version())
                .map(|r| (r.path.clone(), r.excludes.clone()))
                .unwrap_or_default()
        };

        let mut child_path = base_path;
        child_path.push(module);

        for dep in metadata.dependencies() {
            let mut child_excludes = base_excludes.clone();
            for excluded in dep.exclusions() {
                if !child_excludes.contains(excluded) {
                    child_excludes.push(*excluded);
                }
            }
            self.queue.push_back(QueuedRequest {
                from: Some(component),
                requester: requester.clone(),
                request: dep.clone(),
                path: child_path.clone(),
                excludes: child_excludes,
            });
        }
    }

    /// Fetch real metadata for a component, trying each repository in
    /// order. Artifact materialization goes through the cache.
    fn fetch_metadata(&mut self, component: ComponentId) -> Option<ModuleMetadata> {
        if let Some(memoized) = self.metadata_memo.get(&component) {
            return memoized.clone();
        }

        let mut resolved = None;
        for repository in self.repositories {
            match repository.resolve_metadata(component) {
                Ok(MetadataLookup::Found(real)) => {
                    self.materialize_artifacts(repository.as_ref(), &real);
                    resolved = Some(ModuleMetadata::Real(real));
                    break;
                }
                Ok(MetadataLookup::NotFound) => continue,
                Err(error) => {
                    tracing::warn!(component = %component, %error, "repository fetch failed");
                    if let Some(module) = component.module_id() {
                        self.failures.push(NodeFailure {
                            module,
                            error: ResolveError::Repository {
                                repository: error.repository,
                                message: error.message,
                                module: module.to_string(),
                            },
                        });
                    }
                }
            }
        }

        self.metadata_memo.insert(component, resolved.clone());
        resolved
    }

    /// Materialize the artifact set for resolved metadata. A trusted
    /// cache hit short-circuits the repository call entirely; after
    /// cancellation is observed nothing may repopulate the cache.
    fn materialize_artifacts(&self, repository: &dyn Repository, real: &crate::core::RealMetadata) {
        let component = real.component_id();

        if let Some(hit) =
            self.cache
                .get_cached_artifacts(repository.id(), component, self.context)
        {
            if hit.descriptor_hash() == real.content_hash()
                && self.config.is_cache_age_trusted(hit.age_millis())
            {
                tracing::debug!(component = %component, age = hit.age_millis(), "artifacts cache hit");
                return;
            }
            tracing::debug!(component = %component, "artifacts cache entry stale");
        }

        match repository.resolve_artifacts(component, self.context) {
            Ok(artifacts) => {
                if self.cancellation.is_cancelled() {
                    return;
                }
                self.cache.cache_artifacts(
                    repository.id().clone(),
                    component,
                    self.context,
                    real.content_hash().clone(),
                    artifacts,
                );
            }
            Err(error) => {
                tracing::warn!(component = %component, %error, "artifact resolution failed");
            }
        }
    }

    /// Assemble the final graph, transform registrations and aggregated
    /// failures once the queue has drained.
    fn finalize(mut self) -> Result<ResolutionResult, ResolveError> {
        if !self.session_errors.is_empty() {
            let mut errors = self.session_errors;
            return Err(if errors.len() == 1 {
                errors.remove(0)
            } else {
                ResolveError::Aggregate { errors }
            });
        }

        let mut graph = ResolvedGraph::new();
        let mut transforms = Vec::new();

        let mut modules: Vec<ModuleId> = self.modules.keys().copied().collect();
        modules.sort();

        for module in &modules {
            let state = &self.modules[module];
            let Some(version) = &state.selected else {
                continue;
            };
            let component = ComponentId::module(*module, version.clone());
            let Some(record) = self.nodes.get_mut(&component) else {
                continue;
            };
            record.state = NodeState::Finalized;
            graph.add_component(component, record.metadata.clone());
        }

        for module in &modules {
            let state = &self.modules[module];
            let Some(version) = &state.selected else {
                continue;
            };
            let component = ComponentId::module(*module, version.clone());
            if !graph.contains(component) {
                continue;
            }

            for request in &state.requests {
                // Only edges from nodes that themselves stayed selected
                if let Some(from) = request.from {
                    if graph.contains(from) {
                        graph.add_edge(from, component);
                    } else {
                        continue;
                    }
                }

                // Register the requester as an owner of a virtual platform
                if request.request.is_platform() {
                    if let Some(ModuleMetadata::Virtual(virtual_meta)) =
                        self.nodes.get(&component).map(|r| &r.metadata)
                    {
                        if let Some(from) = request.from {
                            if let Some(owner) = from.module_version_id() {
                                virtual_meta.platform_state().add_owner(owner);
                            }
                        }
                    }
                }

                // Schedule the transform riding on this edge
                if let Some(transformation) = request.request.transform() {
                    let id = self.transform_ids.next_id();
                    let resolver = self.resolver_factory.create(component, transformation);
                    transforms.push(TransformRegistration::new(
                        id,
                        component,
                        transformation.clone(),
                        resolver,
                    ));
                }
            }
        }

        for excluded in self.excluded {
            graph.add_excluded(excluded);
        }

        Ok(ResolutionResult::new(graph, self.failures, transforms))
    }
}

/// Versions a module is available at, across every configured
/// repository. Listing failures degrade to warnings.
fn list_all_versions(repositories: &[Arc<dyn Repository>], module: ModuleId) -> Vec<Version> {
    let mut versions: Vec<Version> = Vec::new();
    for repository in repositories {
        match repository.list_versions(module) {
            Ok(listed) => {
                for version in listed {
                    if !versions.contains(&version) {
                        versions.push(version);
                    }
                }
            }
            Err(error) => {
                tracing::warn!(module = %module, %error, "version listing failed");
            }
        }
    }
    versions.sort();
    versions
}
