//! Version conflict resolution.
//!
//! Among all requests resolving to the same module, exactly one version
//! is selected per resolution session. Selection is a convergent
//! reduction over the request set: it depends only on which requests
//! exist, never on the order concurrent branches discovered them.

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::core::component_id::ModuleId;
use crate::core::constraint::VersionConstraint;

use super::errors::ResolveError;

/// Version ordering scheme used to pick among conflicting requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersionOrdering {
    /// The highest requested version wins, unless pinned by a strict
    /// constraint.
    #[default]
    HighestWins,
}

/// One candidate a request resolved to.
#[derive(Debug, Clone)]
pub struct CandidateRequest {
    /// Display name of the requesting node
    pub requester: String,
    /// The constraint carried by the request
    pub constraint: VersionConstraint,
    /// The version the request resolved to
    pub candidate: Version,
}

/// Select the version for a module given every live request.
///
/// Strict constraints pin their version and are never overridden by
/// non-strict requests, regardless of recency or magnitude. Two strict
/// constraints pinning different versions are a hard failure naming
/// both. Otherwise the ordering scheme applies across all candidates.
pub fn select_version(
    module: ModuleId,
    ordering: VersionOrdering,
    requests: &[CandidateRequest],
) -> Result<Option<Version>, ResolveError> {
    if requests.is_empty() {
        return Ok(None);
    }

    let strict: Vec<&CandidateRequest> =
        requests.iter().filter(|r| r.constraint.is_strict()).collect();

    if let Some(first) = strict.first() {
        if let Some(disagreeing) = strict.iter().find(|r| r.candidate != first.candidate) {
            return Err(ResolveError::StrictConflict {
                module: module.to_string(),
                constraints: vec![
                    (first.requester.clone(), first.constraint.to_string()),
                    (
                        disagreeing.requester.clone(),
                        disagreeing.constraint.to_string(),
                    ),
                ],
            });
        }
        return Ok(Some(first.candidate.clone()));
    }

    match ordering {
        VersionOrdering::HighestWins => Ok(requests.iter().map(|r| r.candidate.clone()).max()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module() -> ModuleId {
        ModuleId::new("org.example", "lib")
    }

    fn request(requester: &str, constraint: VersionConstraint, candidate: Version) -> CandidateRequest {
        CandidateRequest {
            requester: requester.to_string(),
            constraint,
            candidate,
        }
    }

    #[test]
    fn test_highest_wins() {
        let requests = vec![
            request(
                "app",
                VersionConstraint::exact(&Version::new(1, 0, 0)),
                Version::new(1, 0, 0),
            ),
            request(
                "framework",
                VersionConstraint::exact(&Version::new(2, 0, 0)),
                Version::new(2, 0, 0),
            ),
        ];

        let selected = select_version(module(), VersionOrdering::HighestWins, &requests).unwrap();
        assert_eq!(selected, Some(Version::new(2, 0, 0)));
    }

    #[test]
    fn test_selection_is_order_insensitive() {
        let a = request(
            "app",
            VersionConstraint::exact(&Version::new(1, 5, 0)),
            Version::new(1, 5, 0),
        );
        let b = request(
            "framework",
            VersionConstraint::exact(&Version::new(1, 2, 0)),
            Version::new(1, 2, 0),
        );

        let forward =
            select_version(module(), VersionOrdering::HighestWins, &[a.clone(), b.clone()]).unwrap();
        let backward = select_version(module(), VersionOrdering::HighestWins, &[b, a]).unwrap();
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_strict_is_never_overridden() {
        let requests = vec![
            request(
                "app",
                VersionConstraint::strictly("=1.0.0".parse().unwrap()),
                Version::new(1, 0, 0),
            ),
            request(
                "framework",
                VersionConstraint::exact(&Version::new(9, 0, 0)),
                Version::new(9, 0, 0),
            ),
        ];

        let selected = select_version(module(), VersionOrdering::HighestWins, &requests).unwrap();
        assert_eq!(selected, Some(Version::new(1, 0, 0)));
    }

    #[test]
    fn test_disagreeing_strict_constraints_fail() {
        let requests = vec![
            request(
                "app",
                VersionConstraint::strictly("=1.0.0".parse().unwrap()),
                Version::new(1, 0, 0),
            ),
            request(
                "framework",
                VersionConstraint::strictly("=2.0.0".parse().unwrap()),
                Version::new(2, 0, 0),
            ),
        ];

        let err = select_version(module(), VersionOrdering::HighestWins, &requests).unwrap_err();
        match err {
            ResolveError::StrictConflict { module, constraints } => {
                assert_eq!(module, "org.example:lib");
                assert_eq!(constraints.len(), 2);
            }
            other => panic!("expected StrictConflict, got {:?}", other),
        }
    }

    #[test]
    fn test_agreeing_strict_constraints_resolve() {
        let requests = vec![
            request(
                "app",
                VersionConstraint::strictly("=1.0.0".parse().unwrap()),
                Version::new(1, 0, 0),
            ),
            request(
                "framework",
                VersionConstraint::strictly("=1.0.0".parse().unwrap()),
                Version::new(1, 0, 0),
            ),
        ];

        let selected = select_version(module(), VersionOrdering::HighestWins, &requests).unwrap();
        assert_eq!(selected, Some(Version::new(1, 0, 0)));
    }

    #[test]
    fn test_empty_request_set() {
        let selected = select_version(module(), VersionOrdering::HighestWins, &[]).unwrap();
        assert_eq!(selected, None);
    }
}
