//! Descriptor hashing and fingerprinting.
//!
//! A module descriptor's content hash is the freshness key for the
//! artifacts cache: a cached entry is only trusted while the descriptor
//! it was created from still hashes to the same value.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Compute SHA256 hash of a byte slice.
pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute SHA256 hash of a string.
pub fn sha256_str(s: &str) -> String {
    sha256_bytes(s.as_bytes())
}

/// Content hash of a module descriptor.
///
/// Compared for equality only; two descriptors with equal hashes are
/// treated as the same descriptor for cache-freshness purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DescriptorHash(String);

impl DescriptorHash {
    /// Hash raw descriptor content.
    pub fn of_bytes(data: &[u8]) -> Self {
        DescriptorHash(sha256_bytes(data))
    }

    /// Wrap an already-computed hex digest.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        DescriptorHash(hex.into())
    }

    /// Get the hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DescriptorHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A hasher for building fingerprints from multiple components.
#[derive(Default)]
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    /// Create a new fingerprint builder.
    pub fn new() -> Self {
        Fingerprint {
            hasher: Sha256::new(),
        }
    }

    /// Add a string component to the fingerprint.
    pub fn update_str(&mut self, s: &str) -> &mut Self {
        self.hasher.update(s.as_bytes());
        self.hasher.update(b"\0"); // Separator
        self
    }

    /// Add an optional string component.
    pub fn update_opt(&mut self, opt: Option<&str>) -> &mut Self {
        match opt {
            Some(s) => {
                self.hasher.update(b"\x01"); // Present marker
                self.update_str(s);
            }
            None => {
                self.hasher.update(b"\x00"); // Absent marker
            }
        }
        self
    }

    /// Add a boolean component.
    pub fn update_bool(&mut self, b: bool) -> &mut Self {
        self.hasher.update([b as u8]);
        self
    }

    /// Finalize into a descriptor hash.
    pub fn finish_hash(self) -> DescriptorHash {
        DescriptorHash(hex::encode(self.hasher.finalize()))
    }

    /// Finalize and return the fingerprint as a hex string.
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}
