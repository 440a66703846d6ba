// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Type of an HR record. Also used as the entity type of change events and subscriptions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Attendance,
    LeaveRequest,
    Payroll,
    PerformanceReview,
    Profile,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Attendance,
        ResourceKind::LeaveRequest,
        ResourceKind::Payroll,
        ResourceKind::PerformanceReview,
        ResourceKind::Profile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Attendance => "attendance",
            ResourceKind::LeaveRequest => "leave_request",
            ResourceKind::Payroll => "payroll",
            ResourceKind::PerformanceReview => "performance_review",
            ResourceKind::Profile => "profile",
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = UnknownKindError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| UnknownKindError(value.to_string()))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown resource kind '{0}'")]
pub struct UnknownKindError(String);
