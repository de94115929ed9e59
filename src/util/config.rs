//! Resolution configuration.
//!
//! Session policy that is not derivable from the dependency declarations
//! themselves: the version-ordering scheme used by conflict resolution
//! and how long a cached artifact set stays trustworthy.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::resolver::conflicts::VersionOrdering;

/// Configuration for a resolution session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    /// Conflict resolution settings
    pub resolution: ResolutionSettings,

    /// Cache freshness settings
    pub cache: CacheSettings,
}

/// Conflict resolution settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionSettings {
    /// Version ordering scheme used to pick among conflicting requests
    pub ordering: VersionOrdering,
}

/// Cache freshness settings.
///
/// The cache itself never expires entries; the graph builder applies
/// these settings to decide whether a hit is still trustworthy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// How long a cached artifact set is trusted, in milliseconds.
    /// `None` trusts entries for the whole session.
    pub trust_cached_for_millis: Option<u64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            // 24h, matching the usual refresh period for changing modules
            trust_cached_for_millis: Some(24 * 60 * 60 * 1000),
        }
    }
}

impl ResolveConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read resolve config: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse resolve config: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if the file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load resolve config from {}: {}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create config directory: {}", parent.display()))?;
        }

        let contents =
            toml::to_string_pretty(self).with_context(|| "failed to serialize resolve config")?;

        std::fs::write(path, contents)
            .with_context(|| format!("failed to write resolve config: {}", path.display()))?;

        Ok(())
    }

    /// Check whether a cache hit of the given age is still trustworthy.
    pub fn is_cache_age_trusted(&self, age_millis: u64) -> bool {
        match self.cache.trust_cached_for_millis {
            Some(ttl) => age_millis <= ttl,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ResolveConfig::default();
        assert_eq!(config.resolution.ordering, VersionOrdering::HighestWins);
        assert!(config.is_cache_age_trusted(0));
        assert!(!config.is_cache_age_trusted(25 * 60 * 60 * 1000));
    }

    #[test]
    fn test_parse_toml() {
        let config: ResolveConfig = toml::from_str(
            r#"
            [resolution]
            ordering = "highest-wins"

            [cache]
            trust_cached_for_millis = 1000
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.trust_cached_for_millis, Some(1000));
        assert!(config.is_cache_age_trusted(1000));
        assert!(!config.is_cache_age_trusted(1001));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("resolve.toml");

        let mut config = ResolveConfig::default();
        config.cache.trust_cached_for_millis = Some(42);
        config.save(&path).unwrap();

        let loaded = ResolveConfig::load(&path).unwrap();
        assert_eq!(loaded.cache.trust_cached_for_millis, Some(42));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let tmp = TempDir::new().unwrap();
        let config = ResolveConfig::load_or_default(&tmp.path().join("absent.toml"));
        assert_eq!(config.resolution.ordering, VersionOrdering::HighestWins);
    }
}
