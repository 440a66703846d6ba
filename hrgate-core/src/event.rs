// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{PrincipalId, RecordId, ResourceKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };

        write!(f, "{}", s)
    }
}

/// Notification that a record was mutated.
///
/// Events only identify _what_ changed, never carry field values. Receivers which want to know
/// the new state need to query it again, which keeps records outside of their visibility hidden.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub entity: ResourceKind,
    pub id: RecordId,
    pub operation: Operation,
    pub actor: PrincipalId,
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(entity: ResourceKind, id: RecordId, operation: Operation, actor: PrincipalId) -> Self {
        Self {
            entity,
            id,
            operation,
            actor,
            timestamp: Utc::now(),
        }
    }
}
