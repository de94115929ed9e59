//! Extra execution-graph dependencies for artifact transforms.
//!
//! A transform's direct input is a single artifact, but executing the
//! transform body may need more of the graph available first (typically
//! the producing component's dependency closure). The execution
//! scheduler queries a resolver per transform edge to learn those extra
//! dependencies before sequencing the work.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, LazyLock, RwLock};

use crate::core::ComponentId;
use crate::resolver::graph::ResolvedGraph;
use crate::util::InternedString;

use super::Transformation;

/// Yields the build-artifact dependencies a transform needs beyond its
/// direct input.
pub trait ExtraDependenciesResolver: Send + Sync {
    /// Components whose artifacts must be available before the transform
    /// body runs.
    fn extra_dependencies(&self, graph: &ResolvedGraph) -> BTreeSet<ComponentId>;
}

/// Resolver that never contributes extra dependencies.
///
/// Immutable, so one instance is shared globally.
pub struct EmptyExtraDependenciesResolver;

impl ExtraDependenciesResolver for EmptyExtraDependenciesResolver {
    fn extra_dependencies(&self, _graph: &ResolvedGraph) -> BTreeSet<ComponentId> {
        BTreeSet::new()
    }
}

static EMPTY_RESOLVER: LazyLock<Arc<dyn ExtraDependenciesResolver>> =
    LazyLock::new(|| Arc::new(EmptyExtraDependenciesResolver));

/// The shared empty-resolver singleton.
pub fn empty_resolver() -> Arc<dyn ExtraDependenciesResolver> {
    EMPTY_RESOLVER.clone()
}

/// Resolver yielding the transitive dependency closure of a component.
pub struct DependencyClosureResolver {
    component: ComponentId,
}

impl DependencyClosureResolver {
    /// Create a closure resolver for the given component.
    pub fn new(component: ComponentId) -> Self {
        DependencyClosureResolver { component }
    }
}

impl ExtraDependenciesResolver for DependencyClosureResolver {
    fn extra_dependencies(&self, graph: &ResolvedGraph) -> BTreeSet<ComponentId> {
        graph.transitive_deps(self.component).into_iter().collect()
    }
}

/// Creates an `ExtraDependenciesResolver` per (component, transformation)
/// pairing.
pub trait ExtraDependenciesResolverFactory: Send + Sync {
    /// Create (or reuse) the resolver for the pairing.
    fn create(
        &self,
        component: ComponentId,
        transformation: &Transformation,
    ) -> Arc<dyn ExtraDependenciesResolver>;
}

/// Factory with no extra-dependency information: always hands out the
/// shared empty singleton.
pub struct AlwaysEmptyResolverFactory;

impl ExtraDependenciesResolverFactory for AlwaysEmptyResolverFactory {
    fn create(
        &self,
        _component: ComponentId,
        _transformation: &Transformation,
    ) -> Arc<dyn ExtraDependenciesResolver> {
        empty_resolver()
    }
}

/// Factory producing dependency-closure resolvers, memoized per
/// (component, transformation) pairing for the session's lifetime.
#[derive(Default)]
pub struct ClosureResolverFactory {
    resolvers: RwLock<HashMap<(ComponentId, InternedString), Arc<dyn ExtraDependenciesResolver>>>,
}

impl ExtraDependenciesResolverFactory for ClosureResolverFactory {
    fn create(
        &self,
        component: ComponentId,
        transformation: &Transformation,
    ) -> Arc<dyn ExtraDependenciesResolver> {
        let key = (component, transformation.name());

        if let Some(resolver) = self.resolvers.read().unwrap().get(&key) {
            return resolver.clone();
        }

        let mut resolvers = self.resolvers.write().unwrap();
        resolvers
            .entry(key)
            .or_insert_with(|| Arc::new(DependencyClosureResolver::new(component)))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ModuleId;
    use semver::Version;

    fn component(name: &str, major: u64) -> ComponentId {
        ComponentId::module(ModuleId::new("org.example", name), Version::new(major, 0, 0))
    }

    #[test]
    fn test_empty_resolver_is_shared() {
        let a = empty_resolver();
        let b = empty_resolver();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.extra_dependencies(&ResolvedGraph::new()).is_empty());
    }

    #[test]
    fn test_always_empty_factory() {
        let factory = AlwaysEmptyResolverFactory;
        let resolver = factory.create(component("lib", 1), &Transformation::new("unzip"));
        assert!(Arc::ptr_eq(&resolver, &empty_resolver()));
    }

    #[test]
    fn test_closure_factory_memoizes_per_pairing() {
        let factory = ClosureResolverFactory::default();
        let unzip = Transformation::new("unzip");
        let minify = Transformation::new("minify");

        let a = factory.create(component("lib", 1), &unzip);
        let b = factory.create(component("lib", 1), &unzip);
        let c = factory.create(component("lib", 1), &minify);
        let d = factory.create(component("other", 1), &unzip);

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert!(!Arc::ptr_eq(&a, &d));
    }

    #[test]
    fn test_closure_resolver_walks_graph() {
        use crate::core::ModuleMetadata;
        use crate::core::RealMetadata;

        let mut graph = ResolvedGraph::new();
        let a = component("a", 1);
        let b = component("b", 1);
        let c = component("c", 1);
        for id in [a, b, c] {
            let metadata = RealMetadata::new(id.module_id().unwrap(), id.version().unwrap().clone());
            graph.add_component(id, ModuleMetadata::Real(metadata));
        }
        graph.add_edge(a, b);
        graph.add_edge(b, c);

        let resolver = DependencyClosureResolver::new(a);
        let extra = resolver.extra_dependencies(&graph);
        assert_eq!(extra, BTreeSet::from([b, c]));
    }
}
