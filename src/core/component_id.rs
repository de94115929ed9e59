//! Component identification - WHAT is being resolved.
//!
//! A `ModuleId` names a module (group + name) and is the key conflict
//! resolution operates on. A `ComponentId` pins one candidate of that
//! module (or a local project) and is interned for cheap comparison,
//! since it serves as a graph-node and cache key. A `ModuleVersionId`
//! is the external-facing identity of a resolved version.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{LazyLock, RwLock};

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::util::InternedString;

/// A module identity: group and name, without a version.
///
/// Conflict resolution selects exactly one version per `ModuleId` in a
/// resolution session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleId {
    group: InternedString,
    name: InternedString,
}

impl ModuleId {
    /// Create a module id from group and name.
    pub fn new(group: impl Into<InternedString>, name: impl Into<InternedString>) -> Self {
        ModuleId {
            group: group.into(),
            name: name.into(),
        }
    }

    /// Get the module group.
    pub fn group(&self) -> InternedString {
        self.group
    }

    /// Get the module name.
    pub fn name(&self) -> InternedString {
        self.name
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.name)
    }
}

/// Identifies a specific resolved version of a module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleVersionId {
    module: ModuleId,
    version: Version,
}

impl ModuleVersionId {
    /// Create a module version id.
    pub fn new(module: ModuleId, version: Version) -> Self {
        ModuleVersionId { module, version }
    }

    /// Get the module id.
    pub fn module(&self) -> ModuleId {
        self.module
    }

    /// Get the version.
    pub fn version(&self) -> &Version {
        &self.version
    }
}

impl fmt::Display for ModuleVersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.version)
    }
}

/// Global component ID interner
static COMPONENT_INTERNER: LazyLock<RwLock<HashMap<ComponentIdInner, &'static ComponentIdInner>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// A unique identifier for a resolvable component (interned).
///
/// ComponentIds are cheap to clone and compare (pointer comparison).
/// A component is either one version of an external module or a local
/// project addressed by its path.
#[derive(Clone, Copy)]
pub struct ComponentId {
    inner: &'static ComponentIdInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum ComponentIdInner {
    Module { module: ModuleId, version: Version },
    Project { path: InternedString },
}

impl ComponentId {
    /// Create a component id for one version of a module.
    pub fn module(module: ModuleId, version: Version) -> Self {
        Self::intern(ComponentIdInner::Module { module, version })
    }

    /// Create a component id for a local project.
    pub fn project(path: impl Into<InternedString>) -> Self {
        Self::intern(ComponentIdInner::Project { path: path.into() })
    }

    fn intern(inner: ComponentIdInner) -> Self {
        // Fast path: check if already interned
        {
            let interner = COMPONENT_INTERNER.read().unwrap();
            if let Some(&interned) = interner.get(&inner) {
                return ComponentId { inner: interned };
            }
        }

        let mut interner = COMPONENT_INTERNER.write().unwrap();

        // Double-check after acquiring write lock
        if let Some(&interned) = interner.get(&inner) {
            return ComponentId { inner: interned };
        }

        let leaked: &'static ComponentIdInner = Box::leak(Box::new(inner.clone()));
        interner.insert(inner, leaked);

        ComponentId { inner: leaked }
    }

    /// Get the module id, if this is a module component.
    pub fn module_id(&self) -> Option<ModuleId> {
        match self.inner {
            ComponentIdInner::Module { module, .. } => Some(*module),
            ComponentIdInner::Project { .. } => None,
        }
    }

    /// Get the version, if this is a module component.
    pub fn version(&self) -> Option<&Version> {
        match self.inner {
            ComponentIdInner::Module { version, .. } => Some(version),
            ComponentIdInner::Project { .. } => None,
        }
    }

    /// Get the project path, if this is a local project.
    pub fn project_path(&self) -> Option<InternedString> {
        match self.inner {
            ComponentIdInner::Module { .. } => None,
            ComponentIdInner::Project { path } => Some(*path),
        }
    }

    /// Check if this identifies a local project.
    pub fn is_project(&self) -> bool {
        matches!(self.inner, ComponentIdInner::Project { .. })
    }

    /// The module-version identity for this component, if any.
    pub fn module_version_id(&self) -> Option<ModuleVersionId> {
        match self.inner {
            ComponentIdInner::Module { module, version } => {
                Some(ModuleVersionId::new(*module, version.clone()))
            }
            ComponentIdInner::Project { .. } => None,
        }
    }
}

impl PartialEq for ComponentId {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.inner, other.inner)
    }
}

impl Eq for ComponentId {}

impl Hash for ComponentId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.inner, state)
    }
}

impl PartialOrd for ComponentId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ComponentId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.inner.cmp(other.inner)
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner {
            ComponentIdInner::Module { module, version } => f
                .debug_struct("ComponentId")
                .field("module", &format_args!("{}", module))
                .field("version", version)
                .finish(),
            ComponentIdInner::Project { path } => f
                .debug_struct("ComponentId")
                .field("project", &path.as_str())
                .finish(),
        }
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner {
            ComponentIdInner::Module { module, version } => write!(f, "{}:{}", module, version),
            ComponentIdInner::Project { path } => write!(f, "project {}", path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_id_interning() {
        let module = ModuleId::new("org.example", "lib");
        let a = ComponentId::module(module, Version::new(1, 0, 0));
        let b = ComponentId::module(module, Version::new(1, 0, 0));

        assert_eq!(a, b);
        assert!(std::ptr::eq(a.inner, b.inner));
    }

    #[test]
    fn test_component_id_distinct_versions() {
        let module = ModuleId::new("org.example", "lib");
        let a = ComponentId::module(module, Version::new(1, 0, 0));
        let b = ComponentId::module(module, Version::new(2, 0, 0));

        assert_ne!(a, b);
        assert_eq!(a.module_id(), b.module_id());
    }

    #[test]
    fn test_project_component() {
        let p = ComponentId::project(":app");
        assert!(p.is_project());
        assert_eq!(p.module_id(), None);
        assert_eq!(p.project_path().unwrap().as_str(), ":app");
    }

    #[test]
    fn test_module_version_display() {
        let mvid = ModuleVersionId::new(ModuleId::new("org.example", "lib"), Version::new(1, 2, 3));
        assert_eq!(mvid.to_string(), "org.example:lib:1.2.3");
    }

    #[test]
    fn test_component_ordering() {
        let m = ModuleId::new("org.example", "lib");
        let a = ComponentId::module(m, Version::new(1, 0, 0));
        let b = ComponentId::module(m, Version::new(2, 0, 0));
        assert!(a < b);
    }
}
