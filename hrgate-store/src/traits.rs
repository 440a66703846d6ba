// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error as StdError;

use hrgate_core::{
    DepartmentId, LeaveRequest, LeaveStatus, PrincipalId, Record, RecordId, ResourceKind,
};

/// Result of a compare-and-swap replacement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplaceOutcome {
    Applied,

    /// The stored record is not the expected one anymore, or is gone.
    Stale,

    /// The new record collides with the unique key of another record.
    Duplicate,
}

/// Interface for storing, replacing and querying HR records.
///
/// Implementations are cheap to clone and every clone accesses the same data.
pub trait RecordStore: Clone + Send + Sync + 'static {
    type Error: StdError + Send + Sync + 'static;

    /// Get a record by kind and id.
    fn get(
        &self,
        kind: ResourceKind,
        id: RecordId,
    ) -> impl Future<Output = Result<Option<Record>, Self::Error>> + Send;

    /// All records of one kind, ordered by id.
    fn list(&self, kind: ResourceKind)
    -> impl Future<Output = Result<Vec<Record>, Self::Error>> + Send;

    /// Insert a new record.
    ///
    /// Records other than profiles get a fresh id assigned. Returns the stored record or `None`
    /// if a record with the same id or unique key already exists.
    fn insert(&self, record: Record)
    -> impl Future<Output = Result<Option<Record>, Self::Error>> + Send;

    /// Replace `expected` with `new` if the stored record still equals `expected`.
    fn replace(
        &self,
        expected: &Record,
        new: &Record,
    ) -> impl Future<Output = Result<ReplaceOutcome, Self::Error>> + Send;

    /// Move a leave request from status `from` to `to` and set its approver.
    ///
    /// Returns the updated request, or `None` if the request does not exist or its status is not
    /// `from` anymore. Only one of several concurrent transitions out of the same status succeeds.
    fn transition_leave(
        &self,
        id: RecordId,
        from: LeaveStatus,
        to: LeaveStatus,
        approver: Option<PrincipalId>,
    ) -> impl Future<Output = Result<Option<LeaveRequest>, Self::Error>> + Send;

    /// Delete a record.
    ///
    /// Returns `true` when the removal occurred and `false` when the record was not found.
    fn delete(
        &self,
        kind: ResourceKind,
        id: RecordId,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send;

    /// Current department of a principal according to their profile.
    fn department_of(
        &self,
        principal: PrincipalId,
    ) -> impl Future<Output = Result<Option<DepartmentId>, Self::Error>> + Send;
}
