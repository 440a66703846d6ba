// SPDX-License-Identifier: MIT OR Apache-2.0

use hrgate_core::{PrincipalId, ResourceKind};
use thiserror::Error;

/// Outcome of a refused request.
///
/// `NotFound` and `PermissionDenied` need to be distinguishable by callers and tests, but user
/// interfaces present both the same way so the existence of hidden records does not leak.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// No principal exists for the presented identifier.
    #[error("authentication required")]
    AuthenticationRequired,

    /// The principal knows the record exists but may not perform the action on it.
    #[error("permission denied")]
    PermissionDenied,

    /// The record does not exist or is outside of the principal's visibility.
    #[error("not found")]
    NotFound,

    /// A join did not name an edge while more than one edge leads to the target type.
    #[error("relationship from {from} to {target} is ambiguous, name one of {candidates:?}")]
    AmbiguousRelationship {
        from: ResourceKind,
        target: ResourceKind,
        candidates: Vec<&'static str>,
    },

    /// No edge with the given name (or no edge at all) leads to the target type.
    #[error("no relationship {name:?} from {from} to {target}")]
    UnknownRelationship {
        from: ResourceKind,
        name: Option<String>,
        target: ResourceKind,
    },

    /// Principal resolution was re-entered from inside a policy evaluation or from inside its own
    /// identity lookup. This is a configuration error and surfaced to operators only.
    #[error("policy cycle detected while resolving principal {0}")]
    PolicyCycleDetected(PrincipalId),

    /// The stored state moved on since the caller last saw it, for example a leave request was
    /// already approved or rejected by someone else.
    #[error("record was already decided")]
    ConflictAlreadyDecided,
}
