//! In-memory module artifacts cache.
//!
//! Process-lifetime cache mapping (repository, component, context) to
//! the artifact set resolved there, stamped with a creation time and the
//! descriptor hash the artifacts were derived from. The cache performs
//! no expiry of its own: callers decide from `(age, descriptor_hash)`
//! whether a hit is still trustworthy. Entries are immutable and
//! replaced wholesale, so concurrent readers never observe a partial
//! entry.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use crate::core::{ArtifactMetadata, ComponentId};
use crate::repository::RepositoryId;
use crate::util::hash::DescriptorHash;
use crate::util::interning::InternedString;
use crate::util::time::Clock;

/// Composite key for one artifact set at one repository.
///
/// Two keys are equal iff repository, component and context all match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactsAtRepositoryKey {
    repository: RepositoryId,
    component: ComponentId,
    context: InternedString,
}

impl ArtifactsAtRepositoryKey {
    /// Create a cache key.
    pub fn new(
        repository: RepositoryId,
        component: ComponentId,
        context: impl Into<InternedString>,
    ) -> Self {
        ArtifactsAtRepositoryKey {
            repository,
            component,
            context: context.into(),
        }
    }
}

/// A read view of one cache entry.
#[derive(Debug, Clone)]
pub struct CachedArtifacts {
    artifacts: Arc<BTreeSet<ArtifactMetadata>>,
    descriptor_hash: DescriptorHash,
    age_millis: u64,
}

impl CachedArtifacts {
    /// The cached artifact set.
    pub fn artifacts(&self) -> &BTreeSet<ArtifactMetadata> {
        &self.artifacts
    }

    /// Descriptor hash at entry creation time.
    pub fn descriptor_hash(&self) -> &DescriptorHash {
        &self.descriptor_hash
    }

    /// Entry age at lookup time, in milliseconds. Always >= 0.
    pub fn age_millis(&self) -> u64 {
        self.age_millis
    }
}

struct CacheEntry {
    artifacts: Arc<BTreeSet<ArtifactMetadata>>,
    descriptor_hash: DescriptorHash,
    create_timestamp: u64,
}

/// Process-lifetime in-memory artifacts cache.
///
/// Writes are visible to concurrent readers immediately; readers take no
/// lock beyond the map's read guard because entries are never mutated in
/// place. Persistent-tier caching and its eviction policy live outside
/// this core.
pub struct ModuleArtifactsCache {
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<ArtifactsAtRepositoryKey, Arc<CacheEntry>>>,
}

impl ModuleArtifactsCache {
    /// Create a cache backed by the given time source.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        ModuleArtifactsCache {
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Store an artifact set, replacing any previous entry for the key.
    ///
    /// Returns a read view with age 0 (or near-0, depending on clock
    /// granularity).
    pub fn cache_artifacts(
        &self,
        repository: RepositoryId,
        component: ComponentId,
        context: impl Into<InternedString>,
        descriptor_hash: DescriptorHash,
        artifacts: impl IntoIterator<Item = ArtifactMetadata>,
    ) -> CachedArtifacts {
        let key = ArtifactsAtRepositoryKey::new(repository, component, context);
        let entry = Arc::new(CacheEntry {
            artifacts: Arc::new(artifacts.into_iter().collect()),
            descriptor_hash,
            create_timestamp: self.clock.current_time_millis(),
        });

        tracing::debug!(component = %component, "caching artifact set");
        self.entries.write().unwrap().insert(key, entry.clone());
        self.read_view(&entry)
    }

    /// Look up the artifact set for a key. A miss returns `None`.
    pub fn get_cached_artifacts(
        &self,
        repository: &RepositoryId,
        component: ComponentId,
        context: &str,
    ) -> Option<CachedArtifacts> {
        let key = ArtifactsAtRepositoryKey::new(repository.clone(), component, context);
        let entry = self.entries.read().unwrap().get(&key).cloned()?;
        Some(self.read_view(&entry))
    }

    fn read_view(&self, entry: &CacheEntry) -> CachedArtifacts {
        let age_millis = self
            .clock
            .current_time_millis()
            .saturating_sub(entry.create_timestamp);
        CachedArtifacts {
            artifacts: entry.artifacts.clone(),
            descriptor_hash: entry.descriptor_hash.clone(),
            age_millis,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ModuleId;
    use crate::util::time::ManualClock;
    use semver::Version;
    use url::Url;

    fn repo(name: &str) -> RepositoryId {
        RepositoryId::new(
            name,
            Url::parse(&format!("https://repo.example/{}", name)).unwrap(),
        )
    }

    fn component(name: &str) -> ComponentId {
        ComponentId::module(ModuleId::new("org.example", name), Version::new(1, 0, 0))
    }

    fn artifact(name: &str) -> ArtifactMetadata {
        ArtifactMetadata::new(name, "lib").with_extension("a")
    }

    #[test]
    fn test_cache_then_read_back() {
        let clock = Arc::new(ManualClock::starting_at(1000));
        let cache = ModuleArtifactsCache::new(clock.clone());

        let hash = DescriptorHash::of_bytes(b"descriptor");
        let stored = cache.cache_artifacts(
            repo("central"),
            component("lib"),
            "compile",
            hash.clone(),
            [artifact("lib")],
        );
        assert_eq!(stored.age_millis(), 0);

        let hit = cache
            .get_cached_artifacts(&repo("central"), component("lib"), "compile")
            .unwrap();
        assert_eq!(hit.artifacts().len(), 1);
        assert!(hit.artifacts().contains(&artifact("lib")));
        assert_eq!(hit.descriptor_hash(), &hash);
    }

    #[test]
    fn test_age_is_nondecreasing() {
        let clock = Arc::new(ManualClock::starting_at(1000));
        let cache = ModuleArtifactsCache::new(clock.clone());

        cache.cache_artifacts(
            repo("central"),
            component("lib"),
            "compile",
            DescriptorHash::of_bytes(b"d"),
            [artifact("lib")],
        );

        clock.advance(500);
        let first = cache
            .get_cached_artifacts(&repo("central"), component("lib"), "compile")
            .unwrap();
        assert_eq!(first.age_millis(), 500);

        clock.advance(250);
        let second = cache
            .get_cached_artifacts(&repo("central"), component("lib"), "compile")
            .unwrap();
        assert_eq!(second.age_millis(), 750);
        assert!(second.age_millis() >= first.age_millis());
    }

    #[test]
    fn test_miss_is_none() {
        let cache = ModuleArtifactsCache::new(Arc::new(ManualClock::default()));
        assert!(cache
            .get_cached_artifacts(&repo("central"), component("lib"), "compile")
            .is_none());
    }

    #[test]
    fn test_keys_are_independent() {
        let cache = ModuleArtifactsCache::new(Arc::new(ManualClock::default()));

        cache.cache_artifacts(
            repo("central"),
            component("lib"),
            "compile",
            DescriptorHash::of_bytes(b"d"),
            [artifact("lib")],
        );

        // Different context, repository and component all miss
        assert!(cache
            .get_cached_artifacts(&repo("central"), component("lib"), "runtime")
            .is_none());
        assert!(cache
            .get_cached_artifacts(&repo("mirror"), component("lib"), "compile")
            .is_none());
        assert!(cache
            .get_cached_artifacts(&repo("central"), component("other"), "compile")
            .is_none());
    }

    #[test]
    fn test_last_write_wins() {
        let cache = ModuleArtifactsCache::new(Arc::new(ManualClock::default()));

        let h1 = DescriptorHash::of_bytes(b"h1");
        let h2 = DescriptorHash::of_bytes(b"h2");

        cache.cache_artifacts(
            repo("central"),
            component("lib"),
            "compile",
            h1,
            [artifact("art1")],
        );
        cache.cache_artifacts(
            repo("central"),
            component("lib"),
            "compile",
            h2.clone(),
            [artifact("art2")],
        );

        let hit = cache
            .get_cached_artifacts(&repo("central"), component("lib"), "compile")
            .unwrap();
        assert_eq!(hit.descriptor_hash(), &h2);
        assert_eq!(hit.artifacts().len(), 1);
        assert!(hit.artifacts().contains(&artifact("art2")));
        assert!(!hit.artifacts().contains(&artifact("art1")));
    }
}
