//! Lenient resolution of platform constraints.
//!
//! A module referenced only as a platform constraint may never resolve
//! to a real descriptor. The graph still needs a node for it so that
//! every edge target exists and conflict scoring can run; the provider
//! synthesizes a virtual metadata node bound to per-platform shared
//! state, and repeated references to the same platform converge onto
//! that one state instead of creating duplicates.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use semver::Version;

use crate::core::component_id::{ComponentId, ModuleId, ModuleVersionId};
use crate::core::metadata::{ModuleMetadata, VirtualMetadata};

/// Shared mutable state for one virtual platform.
///
/// Tracks which real module versions currently constrain the platform's
/// membership. Updates are synchronized at object granularity: owners
/// accumulate from concurrent branches as resolution proceeds.
#[derive(Debug)]
pub struct VirtualPlatformState {
    module: ModuleId,
    owners: Mutex<BTreeSet<ModuleVersionId>>,
}

impl VirtualPlatformState {
    fn new(module: ModuleId) -> Self {
        VirtualPlatformState {
            module,
            owners: Mutex::new(BTreeSet::new()),
        }
    }

    /// The platform's module id.
    pub fn module_id(&self) -> ModuleId {
        self.module
    }

    /// Record a real module version that constrains this platform.
    pub fn add_owner(&self, owner: ModuleVersionId) {
        self.owners.lock().unwrap().insert(owner);
    }

    /// The module versions currently constraining this platform, in
    /// stable order.
    pub fn owners(&self) -> Vec<ModuleVersionId> {
        self.owners.lock().unwrap().iter().cloned().collect()
    }
}

/// Provider of virtual platform metadata.
#[derive(Default)]
pub struct LenientPlatformProvider {
    states: RwLock<HashMap<ModuleId, Arc<VirtualPlatformState>>>,
}

impl LenientPlatformProvider {
    /// Get or create the shared state for a platform.
    pub fn platform_state(&self, module: ModuleId) -> Arc<VirtualPlatformState> {
        if let Some(state) = self.states.read().unwrap().get(&module) {
            return state.clone();
        }

        let mut states = self.states.write().unwrap();
        states
            .entry(module)
            .or_insert_with(|| Arc::new(VirtualPlatformState::new(module)))
            .clone()
    }

    /// Synthesize virtual metadata for a platform at the given version,
    /// bound to the platform's shared state.
    pub fn virtual_metadata(&self, module: ModuleId, version: &Version) -> ModuleMetadata {
        let state = self.platform_state(module);
        let component_id = ComponentId::module(module, version.clone());
        let module_version = ModuleVersionId::new(module, version.clone());
        tracing::debug!(platform = %module_version, "synthesizing virtual platform node");
        ModuleMetadata::Virtual(VirtualMetadata::new(component_id, module_version, state))
    }
}
