// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core data types shared by every layer of the hrgate stack.
//!
//! HR records (attendance, leave, payroll, performance reviews and profiles) always concern one
//! employee, their _owner_. The owner's department is never stored on a record, it is looked up
//! at the time a record is queried so department moves take effect immediately.
//!
//! Records reference principals through _named edges_. A leave request for example has both an
//! `applicant` and an `approver`, both pointing at a profile. Edges are closed enums per record
//! type (see [`LeaveRequestEdge`]) so a lookup always states which reference it follows.
//!
//! Mutations are announced with identifier-only [`ChangeEvent`]s. They carry no field values and
//! subscribers need to re-query through the access layer to learn what changed.
mod edge;
mod event;
mod ids;
mod kind;
mod principal;
mod record;
mod role;

pub use edge::{
    AttendanceEdge, EDGES, Edge, EdgeDescriptor, LeaveRequestEdge, PayrollEdge,
    PerformanceReviewEdge, Related,
};
pub use event::{ChangeEvent, Operation};
pub use ids::{DepartmentId, IdError, PrincipalId, RecordId, SessionId};
pub use kind::{ResourceKind, UnknownKindError};
pub use principal::Principal;
pub use record::{
    Attendance, AttendanceStatus, Field, InvalidRecord, LeaveKind, LeaveRequest, LeaveStatus,
    Payroll, PerformanceReview, Profile, Record, RecordMismatch, UnknownStatusError,
};
pub use role::{Role, UnknownRoleError};
