//! Resolution error types and diagnostics.

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::util::diagnostic::Diagnostic;

/// Error during dependency resolution.
///
/// `NotFound` and `Repository` are per-node failures: they are recorded
/// against the requesting node and never abort the walk on their own.
/// `StrictConflict` and `CyclicDependency` are session failures,
/// gathered during the walk and surfaced together in `Aggregate`.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum ResolveError {
    #[error("module not found: `{module}`")]
    #[diagnostic(code(ballast::resolve::not_found))]
    NotFound {
        module: String,
        requirement: String,
        requesters: Vec<String>,
    },

    #[error("conflicting strict version constraints for `{module}`")]
    #[diagnostic(
        code(ballast::resolve::strict_conflict),
        help("align the strict constraints or relax one to a plain requirement")
    )]
    StrictConflict {
        module: String,
        constraints: Vec<(String, String)>, // (requester, constraint)
    },

    #[error("cyclic dependency on `{module}`")]
    #[diagnostic(code(ballast::resolve::cycle))]
    CyclicDependency {
        module: String,
        path: Vec<String>,
    },

    #[error("repository `{repository}` failed: {message}")]
    #[diagnostic(code(ballast::resolve::repository))]
    Repository {
        repository: String,
        message: String,
        module: String,
    },

    #[error("resolution was cancelled")]
    #[diagnostic(code(ballast::resolve::cancelled))]
    Cancelled,

    #[error("dependency resolution failed with {} error(s)", errors.len())]
    #[diagnostic(code(ballast::resolve::aggregate))]
    Aggregate {
        #[related]
        errors: Vec<ResolveError>,
    },
}

impl ResolveError {
    /// Convert to a user-facing diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ResolveError::NotFound {
                module,
                requirement,
                requesters,
            } => {
                let mut diag = Diagnostic::error(format!(
                    "could not find `{}` matching `{}` in any configured repository",
                    module, requirement
                ));

                for requester in requesters {
                    diag = diag.with_context(format!("required by {}", requester));
                }

                diag.with_suggestion(format!(
                    "Check that `{}` is spelled correctly and published to a configured repository",
                    module
                ))
            }

            ResolveError::StrictConflict {
                module,
                constraints,
            } => {
                let mut diag = Diagnostic::error(format!(
                    "conflicting strict version constraints for `{}`",
                    module
                ));

                for (requester, constraint) in constraints {
                    diag = diag
                        .with_context(format!("`{}` requires {} {}", requester, module, constraint));
                }

                diag.with_suggestion(format!(
                    "Align the strict constraints on `{}` or relax one to a plain requirement",
                    module
                ))
            }

            ResolveError::CyclicDependency { module, path } => {
                Diagnostic::error(format!("cyclic dependency on `{}`", module))
                    .with_context(format!("cycle: {}", path.join(" -> ")))
                    .with_suggestion("Remove the self-referential dependency".to_string())
            }

            ResolveError::Repository {
                repository,
                message,
                module,
            } => Diagnostic::error(format!(
                "error fetching `{}` from `{}`: {}",
                module, repository, message
            ))
            .with_suggestion("Check your network connection and repository configuration".to_string()),

            ResolveError::Cancelled => Diagnostic::warning("resolution was cancelled"),

            ResolveError::Aggregate { errors } => {
                let mut diag = Diagnostic::error(format!(
                    "dependency resolution failed with {} error(s)",
                    errors.len()
                ));
                for error in errors {
                    diag = diag.with_context(error.to_string());
                }
                diag
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_conflict_diagnostic_names_both_sides() {
        let err = ResolveError::StrictConflict {
            module: "org.example:lib".to_string(),
            constraints: vec![
                ("org.example:app:1.0.0".to_string(), "strictly =1.0.0".to_string()),
                ("org.example:framework:2.0.0".to_string(), "strictly =2.0.0".to_string()),
            ],
        };

        let output = err.to_diagnostic().format(false);
        assert!(output.contains("conflicting strict version constraints"));
        assert!(output.contains("org.example:app:1.0.0"));
        assert!(output.contains("org.example:framework:2.0.0"));
    }

    #[test]
    fn test_aggregate_lists_every_cause() {
        let err = ResolveError::Aggregate {
            errors: vec![
                ResolveError::NotFound {
                    module: "org.example:gone".to_string(),
                    requirement: "^1.0".to_string(),
                    requesters: vec!["root".to_string()],
                },
                ResolveError::CyclicDependency {
                    module: "org.example:selfish".to_string(),
                    path: vec![
                        "org.example:selfish:1.0.0".to_string(),
                        "org.example:selfish".to_string(),
                    ],
                },
            ],
        };

        let output = err.to_diagnostic().format(false);
        assert!(output.contains("2 error(s)"));
        assert!(output.contains("org.example:gone"));
        assert!(output.contains("org.example:selfish"));
    }
}
