// SPDX-License-Identifier: MIT OR Apache-2.0

//! Decides who may see or change which HR record.
//!
//! Authorization happens in three steps:
//!
//! 1. The [`RoleResolver`] turns a principal id into a [`PrincipalContext`] with exactly one
//!    lookup against an [`IdentityStore`]. This lookup is privileged and never passes through
//!    the policy it is about to feed, resolution attempted from inside a policy evaluation fails
//!    fast with `PolicyCycleDetected`.
//! 2. The context is handed as an opaque value into every [`PolicyEngine`] decision, together
//!    with a [`ResourceRef`] carrying the record's owner and the owner's _current_ department.
//! 3. The engine evaluates an ordered [`RuleSet`] and returns either `Allow` with the columns the
//!    principal may write, or `Deny`. Denials which would reveal the existence of a record are
//!    reported as `NotFound`.
//!
//! Joins from a record to a principal always name the edge they follow (see [`schema`]).
mod context;
mod error;
pub mod policy;
mod resolver;
pub mod schema;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use context::PrincipalContext;
pub use error::AccessError;
pub use policy::{Action, Columns, Decision, PolicyEngine, Predicate, ResourceRef, Rule, RuleSet};
pub use resolver::{IdentityStore, ResolveError, RoleResolver};
pub use schema::ForeignKeyPath;
