//! Artifact transformations along graph edges.

pub mod extra_deps;
pub mod identity;

pub use extra_deps::{
    empty_resolver, AlwaysEmptyResolverFactory, ClosureResolverFactory,
    DependencyClosureResolver, EmptyExtraDependenciesResolver, ExtraDependenciesResolver,
    ExtraDependenciesResolverFactory,
};
pub use identity::{TransformationId, TransformationIdSequence};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::core::component_id::ComponentId;
use crate::util::hash::Fingerprint;
use crate::util::InternedString;

/// A declared artifact transformation.
///
/// Converts one artifact form into another along a graph edge. The
/// definition is pure data; execution belongs to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformation {
    name: InternedString,
    parameters: BTreeMap<InternedString, String>,
}

impl Transformation {
    /// Create a transformation.
    pub fn new(name: impl Into<InternedString>) -> Self {
        Transformation {
            name: name.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Add a parameter.
    pub fn with_parameter(mut self, key: impl Into<InternedString>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Get the transformation name.
    pub fn name(&self) -> InternedString {
        self.name
    }

    /// Get the parameters.
    pub fn parameters(&self) -> &BTreeMap<InternedString, String> {
        &self.parameters
    }

    /// Stable cache key over name and parameters.
    pub fn cache_key(&self) -> String {
        let mut fp = Fingerprint::new();
        fp.update_str(&self.name);
        for (key, value) in &self.parameters {
            fp.update_str(key).update_str(value);
        }
        fp.finish()
    }
}

impl fmt::Display for Transformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// One scheduled transform invocation: everything the execution
/// scheduler needs to sequence it correctly.
#[derive(Clone)]
pub struct TransformRegistration {
    id: TransformationId,
    component: ComponentId,
    transformation: Transformation,
    resolver: Arc<dyn ExtraDependenciesResolver>,
}

impl TransformRegistration {
    pub(crate) fn new(
        id: TransformationId,
        component: ComponentId,
        transformation: Transformation,
        resolver: Arc<dyn ExtraDependenciesResolver>,
    ) -> Self {
        TransformRegistration {
            id,
            component,
            transformation,
            resolver,
        }
    }

    /// The invocation identity.
    pub fn id(&self) -> TransformationId {
        self.id
    }

    /// The component whose artifact is under transform.
    pub fn component(&self) -> ComponentId {
        self.component
    }

    /// The transformation definition.
    pub fn transformation(&self) -> &Transformation {
        &self.transformation
    }

    /// The extra-dependencies resolver for this invocation.
    pub fn resolver(&self) -> &Arc<dyn ExtraDependenciesResolver> {
        &self.resolver
    }
}

impl fmt::Debug for TransformRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRegistration")
            .field("id", &self.id)
            .field("component", &self.component)
            .field("transformation", &self.transformation.name.as_str())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_depends_on_parameters() {
        let plain = Transformation::new("minify");
        let tuned = Transformation::new("minify").with_parameter("level", "3");

        assert_eq!(plain.cache_key(), Transformation::new("minify").cache_key());
        assert_ne!(plain.cache_key(), tuned.cache_key());
    }
}
