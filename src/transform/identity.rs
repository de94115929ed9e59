//! Transformation invocation identities.
//!
//! Every scheduled transform invocation gets one identity from the
//! session's sequence. Identities carry no resolution semantics: they
//! are correlation keys for logging, caching and execution-graph
//! bookkeeping, distinguishing invocations whose inputs are otherwise
//! identical.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque identity of one transformation invocation.
///
/// Equality, hashing and ordering use the numeric id only. Ids are
/// never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransformationId(u64);

impl TransformationId {
    /// The numeric id.
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransformationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transform #{}", self.0)
    }
}

/// Strictly increasing id allocator owned by a resolution session.
///
/// An atomic counter: allocation is safe from any worker thread without
/// external locking, and allocation order matches numeric order.
#[derive(Debug, Default)]
pub struct TransformationIdSequence {
    next: AtomicU64,
}

impl TransformationIdSequence {
    /// Create a sequence starting at zero.
    pub fn new() -> Self {
        TransformationIdSequence {
            next: AtomicU64::new(0),
        }
    }

    /// Allocate the next identity.
    pub fn next_id(&self) -> TransformationId {
        TransformationId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_distinct_and_ordered() {
        let sequence = TransformationIdSequence::new();
        let a = sequence.next_id();
        let b = sequence.next_id();
        let c = sequence.next_id();

        assert_ne!(a, b);
        assert_ne!(b, c);
        assert!(a < b && b < c);
        assert_eq!(a.id() + 1, b.id());
    }

    #[test]
    fn test_concurrent_allocation_is_unique() {
        use std::collections::HashSet;
        use std::sync::Arc;

        let sequence = Arc::new(TransformationIdSequence::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let sequence = sequence.clone();
            handles.push(std::thread::spawn(move || {
                (0..100).map(|_| sequence.next_id()).collect::<Vec<_>>()
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {}", id);
            }
        }
        assert_eq!(seen.len(), 400);
    }

    #[test]
    fn test_sessions_are_independent() {
        let a = TransformationIdSequence::new();
        let b = TransformationIdSequence::new();
        assert_eq!(a.next_id().id(), 0);
        assert_eq!(b.next_id().id(), 0);
    }
}
