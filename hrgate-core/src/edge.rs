// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::{Debug, Display};

use serde::{Deserialize, Serialize};

use crate::{Attendance, LeaveRequest, Payroll, PerformanceReview, PrincipalId, Record, ResourceKind};

/// Description of a named foreign reference from one record type to another.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EdgeDescriptor {
    pub from: ResourceKind,
    pub name: &'static str,
    pub column: &'static str,
    pub target: ResourceKind,
}

const fn edge(from: ResourceKind, name: &'static str, column: &'static str) -> EdgeDescriptor {
    EdgeDescriptor {
        from,
        name,
        column,
        target: ResourceKind::Profile,
    }
}

const ATTENDANCE_EMPLOYEE: EdgeDescriptor = edge(ResourceKind::Attendance, "employee", "employee_id");
const LEAVE_APPLICANT: EdgeDescriptor = edge(ResourceKind::LeaveRequest, "applicant", "applicant_id");
const LEAVE_APPROVER: EdgeDescriptor = edge(ResourceKind::LeaveRequest, "approver", "approver_id");
const PAYROLL_EMPLOYEE: EdgeDescriptor = edge(ResourceKind::Payroll, "employee", "employee_id");
const REVIEW_EMPLOYEE: EdgeDescriptor =
    edge(ResourceKind::PerformanceReview, "employee", "employee_id");
const REVIEW_REVIEWER: EdgeDescriptor =
    edge(ResourceKind::PerformanceReview, "reviewer", "reviewer_id");

/// Every named edge between record types.
pub const EDGES: &[EdgeDescriptor] = &[
    ATTENDANCE_EMPLOYEE,
    LEAVE_APPLICANT,
    LEAVE_APPROVER,
    PAYROLL_EMPLOYEE,
    REVIEW_EMPLOYEE,
    REVIEW_REVIEWER,
];

/// A named edge of one record type. Implemented by closed enums, one per record type, so
/// following a reference always names which one.
pub trait Edge: Copy + Debug + Display + Send + Sync + 'static {
    /// Record type the edge starts from.
    const FROM: ResourceKind;

    fn descriptor(&self) -> EdgeDescriptor;

    fn name(&self) -> &'static str {
        self.descriptor().name
    }
}

/// Records which reference principals through named edges.
pub trait Related: Clone + Into<Record> {
    type Edge: Edge;

    /// Principal at the end of the given edge, if it is set.
    fn party(&self, edge: Self::Edge) -> Option<PrincipalId>;
}

macro_rules! edge_display {
    ($name:ident) => {
        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.name())
            }
        }
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceEdge {
    Employee,
}

impl Edge for AttendanceEdge {
    const FROM: ResourceKind = ResourceKind::Attendance;

    fn descriptor(&self) -> EdgeDescriptor {
        match self {
            AttendanceEdge::Employee => ATTENDANCE_EMPLOYEE,
        }
    }
}

edge_display!(AttendanceEdge);

impl Related for Attendance {
    type Edge = AttendanceEdge;

    fn party(&self, edge: Self::Edge) -> Option<PrincipalId> {
        match edge {
            AttendanceEdge::Employee => Some(self.employee),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveRequestEdge {
    /// Employee who asked for leave.
    Applicant,

    /// Principal who approved or rejected the request.
    Approver,
}

impl Edge for LeaveRequestEdge {
    const FROM: ResourceKind = ResourceKind::LeaveRequest;

    fn descriptor(&self) -> EdgeDescriptor {
        match self {
            LeaveRequestEdge::Applicant => LEAVE_APPLICANT,
            LeaveRequestEdge::Approver => LEAVE_APPROVER,
        }
    }
}

edge_display!(LeaveRequestEdge);

impl Related for LeaveRequest {
    type Edge = LeaveRequestEdge;

    fn party(&self, edge: Self::Edge) -> Option<PrincipalId> {
        match edge {
            LeaveRequestEdge::Applicant => Some(self.applicant),
            LeaveRequestEdge::Approver => self.approver,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayrollEdge {
    Employee,
}

impl Edge for PayrollEdge {
    const FROM: ResourceKind = ResourceKind::Payroll;

    fn descriptor(&self) -> EdgeDescriptor {
        match self {
            PayrollEdge::Employee => PAYROLL_EMPLOYEE,
        }
    }
}

edge_display!(PayrollEdge);

impl Related for Payroll {
    type Edge = PayrollEdge;

    fn party(&self, edge: Self::Edge) -> Option<PrincipalId> {
        match edge {
            PayrollEdge::Employee => Some(self.employee),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceReviewEdge {
    /// Employee being reviewed.
    Employee,

    /// Principal who wrote the review.
    Reviewer,
}

impl Edge for PerformanceReviewEdge {
    const FROM: ResourceKind = ResourceKind::PerformanceReview;

    fn descriptor(&self) -> EdgeDescriptor {
        match self {
            PerformanceReviewEdge::Employee => REVIEW_EMPLOYEE,
            PerformanceReviewEdge::Reviewer => REVIEW_REVIEWER,
        }
    }
}

edge_display!(PerformanceReviewEdge);

impl Related for PerformanceReview {
    type Edge = PerformanceReviewEdge;

    fn party(&self, edge: Self::Edge) -> Option<PrincipalId> {
        match edge {
            PerformanceReviewEdge::Employee => Some(self.employee),
            PerformanceReviewEdge::Reviewer => self.reviewer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EDGES, Edge, LeaveRequestEdge, PerformanceReviewEdge};
    use crate::ResourceKind;

    #[test]
    fn descriptors_are_registered() {
        for descriptor in [
            LeaveRequestEdge::Applicant.descriptor(),
            LeaveRequestEdge::Approver.descriptor(),
            PerformanceReviewEdge::Employee.descriptor(),
            PerformanceReviewEdge::Reviewer.descriptor(),
        ] {
            assert!(EDGES.contains(&descriptor));
        }
    }

    #[test]
    fn edges_start_at_their_record_type() {
        assert_eq!(
            LeaveRequestEdge::Approver.descriptor().from,
            LeaveRequestEdge::FROM
        );
        assert_eq!(LeaveRequestEdge::Approver.to_string(), "approver");
        assert_eq!(
            EDGES
                .iter()
                .filter(|edge| edge.from == ResourceKind::LeaveRequest)
                .count(),
            2
        );
    }
}
