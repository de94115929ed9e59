//! Dependency requests and version constraints.
//!
//! A `DependencyRequest` is the typed form of one declared dependency
//! edge: which module it targets, what versions are acceptable, whether
//! the target is an ordinary library or a platform constraint, and any
//! exclusions, substitutions and artifact transforms riding on the edge.
//! Raw user notations are parsed elsewhere; this core only ever sees
//! these typed objects.

use std::fmt;

use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};

use crate::core::component_id::ModuleId;
use crate::transform::Transformation;

/// A version constraint on a requested module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionConstraint {
    /// Acceptable versions
    required: VersionReq,

    /// Strict constraints pin their version and are never overridden by
    /// non-strict requests for other versions.
    strict: bool,

    /// Versions explicitly rejected even when `required` matches
    rejected: Vec<VersionReq>,
}

impl VersionConstraint {
    /// Create a plain (non-strict) requirement.
    pub fn require(required: VersionReq) -> Self {
        VersionConstraint {
            required,
            strict: false,
            rejected: Vec::new(),
        }
    }

    /// Create a strict requirement.
    pub fn strictly(required: VersionReq) -> Self {
        VersionConstraint {
            required,
            strict: true,
            rejected: Vec::new(),
        }
    }

    /// Create an exact (non-strict) requirement on a single version.
    pub fn exact(version: &Version) -> Self {
        let req: VersionReq = format!("={}", version)
            .parse()
            .unwrap_or(VersionReq::STAR);
        VersionConstraint::require(req)
    }

    /// Add rejected version ranges.
    pub fn with_rejects(mut self, rejected: Vec<VersionReq>) -> Self {
        self.rejected = rejected;
        self
    }

    /// Get the required range.
    pub fn required(&self) -> &VersionReq {
        &self.required
    }

    /// Check if this constraint is strict.
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Check if a version satisfies this constraint.
    pub fn matches(&self, version: &Version) -> bool {
        self.required.matches(version) && !self.rejected.iter().any(|r| r.matches(version))
    }

    /// If the requirement pins exactly one version, return it.
    ///
    /// Platform constraints name exact versions; the lenient provider
    /// uses this to mint the virtual node's version.
    pub fn exact_version(&self) -> Option<Version> {
        if self.required.comparators.len() != 1 {
            return None;
        }
        let cmp = &self.required.comparators[0];
        if cmp.op != semver::Op::Exact {
            return None;
        }
        Some(Version::new(
            cmp.major,
            cmp.minor?,
            cmp.patch?,
        ))
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.strict {
            write!(f, "strictly {}", self.required)
        } else {
            write!(f, "{}", self.required)
        }
    }
}

/// How a requested module participates in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    /// An ordinary resolvable dependency
    Library,
    /// A platform constraint; may be satisfied by a virtual node when no
    /// real metadata exists
    Platform,
}

/// A typed dependency request: one edge the graph builder must satisfy.
#[derive(Debug, Clone)]
pub struct DependencyRequest {
    module: ModuleId,
    constraint: VersionConstraint,
    kind: RequestKind,
    exclusions: Vec<ModuleId>,
    transform: Option<Transformation>,
}

impl DependencyRequest {
    /// Create a library request.
    pub fn library(module: ModuleId, constraint: VersionConstraint) -> Self {
        DependencyRequest {
            module,
            constraint,
            kind: RequestKind::Library,
            exclusions: Vec::new(),
            transform: None,
        }
    }

    /// Create a platform request.
    pub fn platform(module: ModuleId, constraint: VersionConstraint) -> Self {
        DependencyRequest {
            module,
            constraint,
            kind: RequestKind::Platform,
            exclusions: Vec::new(),
            transform: None,
        }
    }

    /// Exclude modules from the subtree reached through this edge.
    pub fn with_exclusions(mut self, exclusions: Vec<ModuleId>) -> Self {
        self.exclusions = exclusions;
        self
    }

    /// Attach an artifact transform to this edge.
    pub fn with_transform(mut self, transform: Transformation) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Get the requested module.
    pub fn module(&self) -> ModuleId {
        self.module
    }

    /// Get the version constraint.
    pub fn constraint(&self) -> &VersionConstraint {
        &self.constraint
    }

    /// Get the request kind.
    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// Check if this is a platform request.
    pub fn is_platform(&self) -> bool {
        self.kind == RequestKind::Platform
    }

    /// Modules excluded below this edge.
    pub fn exclusions(&self) -> &[ModuleId] {
        &self.exclusions
    }

    /// The transform riding on this edge, if any.
    pub fn transform(&self) -> Option<&Transformation> {
        self.transform.as_ref()
    }
}

impl fmt::Display for DependencyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.module, self.constraint)
    }
}

/// A session-level dependency substitution rule.
///
/// Requests targeting `from` are rewritten to `to` (optionally with a
/// replacement constraint) before any repository lookup happens.
#[derive(Debug, Clone)]
pub struct SubstitutionRule {
    from: ModuleId,
    to: ModuleId,
    constraint: Option<VersionConstraint>,
}

impl SubstitutionRule {
    /// Substitute one module for another.
    pub fn new(from: ModuleId, to: ModuleId) -> Self {
        SubstitutionRule {
            from,
            to,
            constraint: None,
        }
    }

    /// Also replace the version constraint.
    pub fn with_constraint(mut self, constraint: VersionConstraint) -> Self {
        self.constraint = Some(constraint);
        self
    }

    /// Apply this rule to a request, returning the rewritten request if
    /// the rule matches.
    pub fn apply(&self, request: &DependencyRequest) -> Option<DependencyRequest> {
        if request.module != self.from {
            return None;
        }
        let mut rewritten = request.clone();
        rewritten.module = self.to;
        if let Some(constraint) = &self.constraint {
            rewritten.constraint = constraint.clone();
        }
        Some(rewritten)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(name: &str) -> ModuleId {
        ModuleId::new("org.example", name)
    }

    #[test]
    fn test_constraint_matching() {
        let constraint = VersionConstraint::require("^1.0".parse().unwrap())
            .with_rejects(vec!["=1.2.0".parse().unwrap()]);

        assert!(constraint.matches(&Version::new(1, 1, 0)));
        assert!(!constraint.matches(&Version::new(1, 2, 0)));
        assert!(!constraint.matches(&Version::new(2, 0, 0)));
    }

    #[test]
    fn test_exact_version() {
        let exact = VersionConstraint::exact(&Version::new(2, 1, 0));
        assert_eq!(exact.exact_version(), Some(Version::new(2, 1, 0)));

        let range = VersionConstraint::require("^1.0".parse().unwrap());
        assert_eq!(range.exact_version(), None);
    }

    #[test]
    fn test_strict_display() {
        let strict = VersionConstraint::strictly("=1.0.0".parse().unwrap());
        assert!(strict.is_strict());
        assert_eq!(strict.to_string(), "strictly =1.0.0");
    }

    #[test]
    fn test_substitution() {
        let rule = SubstitutionRule::new(module("old"), module("new"))
            .with_constraint(VersionConstraint::exact(&Version::new(3, 0, 0)));

        let request = DependencyRequest::library(
            module("old"),
            VersionConstraint::require("^1.0".parse().unwrap()),
        );

        let rewritten = rule.apply(&request).unwrap();
        assert_eq!(rewritten.module(), module("new"));
        assert_eq!(
            rewritten.constraint().exact_version(),
            Some(Version::new(3, 0, 0))
        );

        let other = DependencyRequest::library(
            module("unrelated"),
            VersionConstraint::require(VersionReq::STAR),
        );
        assert!(rule.apply(&other).is_none());
    }
}
