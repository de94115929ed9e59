//! The resolved dependency graph.
//!
//! Immutable once resolution finishes: components with their attached
//! metadata, dependency edges among selected versions, and the excluded
//! alternates retained for diagnostics.

use std::collections::{HashMap, HashSet};
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Topo;

use crate::core::component_id::{ComponentId, ModuleId};
use crate::core::metadata::ModuleMetadata;

/// Why a node was excluded from the live graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionReason {
    /// Lost version conflict resolution to another candidate
    ConflictLoser { winner: ComponentId },
    /// Pruned by an exclusion rule on a requesting edge
    ByRule { requester: String },
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionReason::ConflictLoser { winner } => {
                write!(f, "excluded by conflict (selected {})", winner)
            }
            ExclusionReason::ByRule { requester } => {
                write!(f, "excluded by rule on edge from {}", requester)
            }
        }
    }
}

/// A node pruned from the live graph, retained for diagnostics.
#[derive(Debug, Clone)]
pub struct ExcludedNode {
    pub module: ModuleId,
    pub component: Option<ComponentId>,
    pub reason: ExclusionReason,
}

/// The resolved dependency graph.
#[derive(Debug, Clone, Default)]
pub struct ResolvedGraph {
    /// Component graph; edges point from dependent to dependency
    graph: DiGraph<ComponentId, ()>,

    /// Map from component to node index
    component_to_node: HashMap<ComponentId, NodeIndex>,

    /// Selected component per module
    selected: HashMap<ModuleId, ComponentId>,

    /// Metadata for each component
    metadata: HashMap<ComponentId, ModuleMetadata>,

    /// Nodes pruned from the live graph
    excluded: Vec<ExcludedNode>,
}

impl ResolvedGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component with its metadata.
    pub fn add_component(&mut self, component: ComponentId, metadata: ModuleMetadata) {
        if self.component_to_node.contains_key(&component) {
            return;
        }

        let node = self.graph.add_node(component);
        self.component_to_node.insert(component, node);
        if let Some(module) = component.module_id() {
            self.selected.insert(module, component);
        }
        self.metadata.insert(component, metadata);
    }

    /// Add a dependency edge between components.
    pub fn add_edge(&mut self, from: ComponentId, to: ComponentId) {
        if let (Some(&from_node), Some(&to_node)) = (
            self.component_to_node.get(&from),
            self.component_to_node.get(&to),
        ) {
            if !self.graph.contains_edge(from_node, to_node) {
                self.graph.add_edge(from_node, to_node, ());
            }
        }
    }

    /// Record an excluded node.
    pub fn add_excluded(&mut self, excluded: ExcludedNode) {
        self.excluded.push(excluded);
    }

    /// The selected component for a module, if any.
    pub fn selected(&self, module: ModuleId) -> Option<ComponentId> {
        self.selected.get(&module).copied()
    }

    /// Metadata attached to a component.
    pub fn metadata(&self, component: ComponentId) -> Option<&ModuleMetadata> {
        self.metadata.get(&component)
    }

    /// Iterate over all components with metadata.
    pub fn components(&self) -> impl Iterator<Item = (&ComponentId, &ModuleMetadata)> {
        self.metadata.iter()
    }

    /// Excluded nodes, retained for diagnostics.
    pub fn excluded(&self) -> &[ExcludedNode] {
        &self.excluded
    }

    /// Number of live components.
    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    /// Check if the graph has no live components.
    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// Check if a component is in the live graph.
    pub fn contains(&self, component: ComponentId) -> bool {
        self.component_to_node.contains_key(&component)
    }

    /// Direct dependencies of a component.
    pub fn deps(&self, component: ComponentId) -> Vec<ComponentId> {
        if let Some(&node) = self.component_to_node.get(&component) {
            self.graph.neighbors(node).map(|n| self.graph[n]).collect()
        } else {
            Vec::new()
        }
    }

    /// Components that depend on the given component.
    pub fn dependents(&self, component: ComponentId) -> Vec<ComponentId> {
        if let Some(&node) = self.component_to_node.get(&component) {
            self.graph
                .neighbors_directed(node, petgraph::Direction::Incoming)
                .map(|n| self.graph[n])
                .collect()
        } else {
            Vec::new()
        }
    }

    /// All transitive dependencies of a component.
    pub fn transitive_deps(&self, component: ComponentId) -> HashSet<ComponentId> {
        let mut visited = HashSet::new();
        let mut stack = vec![component];

        while let Some(current) = stack.pop() {
            if visited.insert(current) {
                for dep in self.deps(current) {
                    stack.push(dep);
                }
            }
        }

        visited.remove(&component);
        visited
    }

    /// Components in topological order (dependencies before dependents).
    pub fn topological_order(&self) -> Vec<ComponentId> {
        let mut topo = Topo::new(&self.graph);
        let mut order = Vec::new();

        while let Some(node) = topo.next(&self.graph) {
            order.push(self.graph[node]);
        }

        // add_edge(a, b) means "a depends on b", so b must come first.
        order.reverse();
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RealMetadata;
    use semver::Version;

    fn component(name: &str, major: u64) -> (ComponentId, ModuleMetadata) {
        let module = ModuleId::new("org.example", name);
        let version = Version::new(major, 0, 0);
        let id = ComponentId::module(module, version.clone());
        (id, ModuleMetadata::Real(RealMetadata::new(module, version)))
    }

    #[test]
    fn test_graph_basics() {
        let mut graph = ResolvedGraph::new();

        let (a, meta_a) = component("a", 1);
        let (b, meta_b) = component("b", 1);
        graph.add_component(a, meta_a);
        graph.add_component(b, meta_b);
        graph.add_edge(a, b);

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.deps(a), vec![b]);
        assert_eq!(graph.dependents(b), vec![a]);
        assert_eq!(graph.selected(ModuleId::new("org.example", "a")), Some(a));
    }

    #[test]
    fn test_topological_order() {
        let mut graph = ResolvedGraph::new();

        let (a, meta_a) = component("a", 1);
        let (b, meta_b) = component("b", 1);
        let (c, meta_c) = component("c", 1);
        graph.add_component(a, meta_a);
        graph.add_component(b, meta_b);
        graph.add_component(c, meta_c);

        // a -> b -> c
        graph.add_edge(a, b);
        graph.add_edge(b, c);

        let order = graph.topological_order();
        let pos = |id| order.iter().position(|&x| x == id).unwrap();

        assert!(pos(c) < pos(b));
        assert!(pos(b) < pos(a));
    }

    #[test]
    fn test_transitive_deps() {
        let mut graph = ResolvedGraph::new();

        let (a, meta_a) = component("a", 1);
        let (b, meta_b) = component("b", 1);
        let (c, meta_c) = component("c", 1);
        graph.add_component(a, meta_a);
        graph.add_component(b, meta_b);
        graph.add_component(c, meta_c);
        graph.add_edge(a, b);
        graph.add_edge(b, c);

        let deps = graph.transitive_deps(a);
        assert_eq!(deps, HashSet::from([b, c]));
    }

    #[test]
    fn test_duplicate_component_ignored() {
        let mut graph = ResolvedGraph::new();
        let (a, meta_a) = component("a", 1);
        graph.add_component(a, meta_a.clone());
        graph.add_component(a, meta_a);
        assert_eq!(graph.len(), 1);
    }
}
