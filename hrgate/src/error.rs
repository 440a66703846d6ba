// SPDX-License-Identifier: MIT OR Apache-2.0

use hrgate_auth::{AccessError, ResolveError};
use hrgate_core::InvalidRecord;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError<E> {
    #[error(transparent)]
    Access(#[from] AccessError),

    /// Storage backend failed.
    #[error(transparent)]
    Store(E),

    /// A record with the same id or unique key exists already.
    #[error("record already exists")]
    AlreadyExists,

    #[error(transparent)]
    InvalidRecord(#[from] InvalidRecord),
}

impl<E> GatewayError<E> {
    /// Text which can be shown to end users.
    ///
    /// Refusals which could reveal whether a record exists read the same, and internal failures
    /// are never described.
    pub fn user_message(&self) -> &'static str {
        match self {
            GatewayError::Access(AccessError::NotFound | AccessError::PermissionDenied) => {
                "This record is not available."
            }
            GatewayError::Access(AccessError::AuthenticationRequired) => {
                "Please sign in to continue."
            }
            GatewayError::Access(AccessError::ConflictAlreadyDecided) => {
                "This record was changed in the meantime. Reload it and decide again."
            }
            GatewayError::AlreadyExists => "This record exists already.",
            GatewayError::InvalidRecord(_) => "This record is incomplete or inconsistent.",
            GatewayError::Access(
                AccessError::AmbiguousRelationship { .. }
                | AccessError::UnknownRelationship { .. }
                | AccessError::PolicyCycleDetected(_),
            )
            | GatewayError::Store(_) => "Something went wrong. Please try again later.",
        }
    }

    pub fn access(&self) -> Option<&AccessError> {
        match self {
            GatewayError::Access(err) => Some(err),
            _ => None,
        }
    }
}

impl<E> From<ResolveError<E>> for GatewayError<E> {
    fn from(err: ResolveError<E>) -> Self {
        match err {
            ResolveError::AuthenticationRequired => {
                GatewayError::Access(AccessError::AuthenticationRequired)
            }
            ResolveError::PolicyCycleDetected(id) => {
                GatewayError::Access(AccessError::PolicyCycleDetected(id))
            }
            ResolveError::Store(err) => GatewayError::Store(err),
        }
    }
}
