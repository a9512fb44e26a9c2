//! Error types for graph building, planning and execution.
//!
//! Declaration and planning failures are [`GraphError`]s and are returned
//! before anything is applied. Failures that happen while a plan is being
//! executed are recorded per resource as a [`ResourceError`] inside the
//! execution report, so partial progress is never lost.

use crate::types::Reference;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building, planning or resolving a resource graph
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Two declarations share the same logical name
    #[error("duplicate resource name: {name}")]
    DuplicateName {
        /// The repeated name
        name: String,
    },

    /// A resource name that no reference could ever point at
    #[error("invalid resource name '{name}': must be non-empty, without '.' or whitespace")]
    InvalidName {
        /// The rejected name
        name: String,
    },

    /// A reference names a resource or output key that is not declared
    #[error("unknown reference {reference} in resource {resource}")]
    UnknownReference {
        /// Resource holding the reference
        resource: String,
        /// The reference that could not be found
        reference: Reference,
    },

    /// A reference is not of the form `resource.output`
    #[error("invalid reference '{text}' in resource {resource}")]
    InvalidReference {
        /// Resource holding the reference
        resource: String,
        /// Raw text of the reference
        text: String,
    },

    /// The graph contains a dependency cycle
    #[error("dependency cycle detected: {}", format_cycle(.members))]
    Cycle {
        /// Cycle members in traversal order
        members: Vec<String>,
    },

    /// A reference was not available when its resource was resolved.
    ///
    /// This means the plan order was violated and is never retried.
    #[error("unresolved reference {reference} while resolving {resource}")]
    UnresolvedReference {
        /// Resource being resolved
        resource: String,
        /// The reference with no applied value
        reference: Reference,
    },
}

impl GraphError {
    /// Whether this error is an internal invariant violation
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::UnresolvedReference { .. })
    }
}

fn format_cycle(members: &[String]) -> String {
    match members.first() {
        Some(first) => format!("{} -> {first}", members.join(" -> ")),
        None => String::new(),
    }
}

/// Failure reported by a provisioning callback
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct ProviderError {
    /// Human-readable failure description
    pub message: String,
    /// Whether re-invoking the callback may succeed
    pub retryable: bool,
}

impl ProviderError {
    /// Create a provider error with an explicit retry flag
    pub fn new(message: impl Into<String>, retryable: bool) -> Self {
        Self {
            message: message.into(),
            retryable,
        }
    }

    /// A transient failure worth retrying
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(message, true)
    }

    /// A permanent failure
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(message, false)
    }
}

/// Why a resource ended up in the `Failed` state
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceError {
    /// The provisioning callback failed
    #[error("provider error: {0}")]
    Provider(ProviderError),

    /// Inputs could not be resolved (internal invariant violation)
    #[error("unresolved reference {reference}")]
    Unresolved {
        /// The missing reference
        reference: Reference,
    },

    /// Any other broken invariant, e.g. a plan entry missing from the graph
    #[error("invariant violation: {message}")]
    Invariant {
        /// What went wrong
        message: String,
    },
}

impl ResourceError {
    /// Whether a caller may re-run the failed resource as-is
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider(e) => e.retryable,
            Self::Unresolved { .. } | Self::Invariant { .. } => false,
        }
    }
}

impl From<GraphError> for ResourceError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::UnresolvedReference { reference, .. } => Self::Unresolved { reference },
            other => Self::Invariant {
                message: other.to_string(),
            },
        }
    }
}

impl From<ProviderError> for ResourceError {
    fn from(err: ProviderError) -> Self {
        Self::Provider(err)
    }
}

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_display_closes_loop() {
        let err = GraphError::Cycle {
            members: vec!["a".into(), "b".into(), "c".into()],
        };
        assert_eq!(err.to_string(), "dependency cycle detected: a -> b -> c -> a");
    }

    #[test]
    fn test_unknown_reference_display() {
        let err = GraphError::UnknownReference {
            resource: "network".into(),
            reference: Reference::new("storage", "bucket_arn"),
        };
        assert_eq!(
            err.to_string(),
            "unknown reference storage.bucket_arn in resource network"
        );
    }

    #[test]
    fn test_retryable_flags() {
        assert!(ResourceError::from(ProviderError::transient("throttled")).is_retryable());
        assert!(!ResourceError::from(ProviderError::fatal("denied")).is_retryable());
        let unresolved = ResourceError::Unresolved {
            reference: Reference::new("a", "b"),
        };
        assert!(!unresolved.is_retryable());
    }

    #[test]
    fn test_graph_error_into_resource_error() {
        let err = GraphError::UnresolvedReference {
            resource: "cloudflare".into(),
            reference: Reference::new("network", "cf_domain"),
        };
        assert_eq!(
            ResourceError::from(err),
            ResourceError::Unresolved {
                reference: Reference::new("network", "cf_domain"),
            }
        );

        let err = GraphError::InvalidReference {
            resource: "x".into(),
            text: "nodot".into(),
        };
        assert!(matches!(
            ResourceError::from(err),
            ResourceError::Invariant { .. }
        ));
    }

    #[test]
    fn test_only_unresolved_is_invariant_violation() {
        let unresolved = GraphError::UnresolvedReference {
            resource: "x".into(),
            reference: Reference::new("a", "b"),
        };
        assert!(unresolved.is_invariant_violation());
        assert!(!GraphError::DuplicateName { name: "x".into() }.is_invariant_violation());
    }
}
