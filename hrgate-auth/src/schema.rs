// SPDX-License-Identifier: MIT OR Apache-2.0

//! Named edges between record types and the resolution of joins along them.
//!
//! Typed callers follow an edge with [`ForeignKeyPath::of`], which can not fail since the edge
//! enum of a record type only contains edges that exist. Callers which only know names at runtime
//! use [`resolve_edge`], which refuses to guess when more than one edge leads to the target.
use hrgate_core::{EDGES, Edge, EdgeDescriptor, ResourceKind};
use tracing::debug;

use crate::AccessError;

/// Column path a join follows from one record type to another.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ForeignKeyPath {
    pub from: ResourceKind,
    pub edge: &'static str,
    pub column: &'static str,
    pub target: ResourceKind,
}

impl ForeignKeyPath {
    pub fn of<E: Edge>(edge: E) -> Self {
        edge.descriptor().into()
    }
}

impl From<EdgeDescriptor> for ForeignKeyPath {
    fn from(descriptor: EdgeDescriptor) -> Self {
        Self {
            from: descriptor.from,
            edge: descriptor.name,
            column: descriptor.column,
            target: descriptor.target,
        }
    }
}

/// All edges leading from one record type to another.
pub fn edges_between(
    from: ResourceKind,
    target: ResourceKind,
) -> impl Iterator<Item = &'static EdgeDescriptor> {
    EDGES
        .iter()
        .filter(move |edge| edge.from == from && edge.target == target)
}

/// Resolves the join from `from` to `target`, optionally along a named edge.
///
/// Without a name the join only resolves if exactly one edge leads to the target type.
pub fn resolve_edge(
    from: ResourceKind,
    name: Option<&str>,
    target: ResourceKind,
) -> Result<ForeignKeyPath, AccessError> {
    let candidates: Vec<&EdgeDescriptor> = edges_between(from, target).collect();

    match name {
        Some(name) => candidates
            .into_iter()
            .find(|edge| edge.name == name)
            .map(|edge| ForeignKeyPath::from(*edge))
            .ok_or_else(|| AccessError::UnknownRelationship {
                from,
                name: Some(name.to_string()),
                target,
            }),
        None => match candidates.as_slice() {
            [] => Err(AccessError::UnknownRelationship {
                from,
                name: None,
                target,
            }),
            [edge] => Ok(ForeignKeyPath::from(**edge)),
            _ => {
                debug!(%from, %target, "refused unnamed join with several edges");
                Err(AccessError::AmbiguousRelationship {
                    from,
                    target,
                    candidates: candidates.iter().map(|edge| edge.name).collect(),
                })
            }
        },
    }
}
