//! Metadata/artifacts caching.

pub mod artifacts;

pub use artifacts::{ArtifactsAtRepositoryKey, CachedArtifacts, ModuleArtifactsCache};
