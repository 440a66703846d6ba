// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dashboard views and the sessions keeping them up to date.
//!
//! A [`View`] names what a dashboard shows. Querying a view through the gateway yields
//! [`ViewData`] which only contains records the principal may read, a view's query is the only
//! way a session learns about records.
mod session;

use chrono::NaiveDate;
use hrgate_core::{
    Attendance, AttendanceStatus, LeaveRequest, LeaveRequestEdge, LeaveStatus, Payroll,
    PerformanceReview, Profile, Record, ResourceKind,
};
use serde::{Deserialize, Serialize};

use crate::gateway::{Backend, Gateway, StoreError};
use crate::{AccessError, GatewayError, PrincipalContext};

pub use session::{Session, SessionHandle, SessionState};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum View {
    /// Attendance of one day with present and absent counts.
    Attendance { date: NaiveDate },

    /// Leave requests, optionally only those with the given status.
    LeaveRequests { status: Option<LeaveStatus> },

    Payroll,

    PerformanceReviews,

    /// Profiles of everyone the principal can see.
    Directory,
}

impl View {
    /// Entity types whose changes can alter what the view shows.
    ///
    /// Profiles are watched wherever department membership or names are shown, a department move
    /// changes who sees which record.
    pub fn watches(&self) -> &'static [ResourceKind] {
        match self {
            View::Attendance { .. } => &[ResourceKind::Attendance, ResourceKind::Profile],
            View::LeaveRequests { .. } => &[ResourceKind::LeaveRequest, ResourceKind::Profile],
            View::Payroll => &[ResourceKind::Payroll, ResourceKind::Profile],
            View::PerformanceReviews => &[ResourceKind::PerformanceReview, ResourceKind::Profile],
            View::Directory => &[ResourceKind::Profile],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttendanceBoard {
    pub date: NaiveDate,
    pub rows: Vec<Attendance>,
    pub present: usize,
    pub absent: usize,
    pub half_day: usize,
    pub on_leave: usize,
}

impl AttendanceBoard {
    fn new(date: NaiveDate, rows: Vec<Attendance>) -> Self {
        let count = |status| rows.iter().filter(|row| row.status == status).count();
        Self {
            date,
            present: count(AttendanceStatus::Present),
            absent: count(AttendanceStatus::Absent),
            half_day: count(AttendanceStatus::HalfDay),
            on_leave: count(AttendanceStatus::OnLeave),
            rows,
        }
    }
}

/// Leave request together with the name of its applicant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeaveRow {
    pub request: LeaveRequest,

    /// Name found by following the `applicant` edge, if the profile is visible.
    pub applicant: Option<String>,
}

/// Authorized result of querying a [`View`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewData {
    Attendance(AttendanceBoard),
    LeaveRequests(Vec<LeaveRow>),
    Payroll(Vec<Payroll>),
    PerformanceReviews(Vec<PerformanceReview>),
    Directory(Vec<Profile>),
}

impl ViewData {
    pub fn len(&self) -> usize {
        match self {
            ViewData::Attendance(board) => board.rows.len(),
            ViewData::LeaveRequests(rows) => rows.len(),
            ViewData::Payroll(rows) => rows.len(),
            ViewData::PerformanceReviews(rows) => rows.len(),
            ViewData::Directory(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_attendance(&self) -> Option<&AttendanceBoard> {
        match self {
            ViewData::Attendance(board) => Some(board),
            _ => None,
        }
    }

    pub fn as_leave_requests(&self) -> Option<&[LeaveRow]> {
        match self {
            ViewData::LeaveRequests(rows) => Some(rows),
            _ => None,
        }
    }
}

impl<S> Gateway<S>
where
    S: Backend,
{
    /// Run the query behind a view.
    pub async fn query(
        &self,
        context: &PrincipalContext,
        view: &View,
    ) -> Result<ViewData, GatewayError<StoreError<S>>> {
        let data = match view {
            View::Attendance { date } => {
                let rows = self
                    .list(context, ResourceKind::Attendance)
                    .await?
                    .into_iter()
                    .filter_map(|record| match record {
                        Record::Attendance(row) if row.date == *date => Some(row),
                        _ => None,
                    })
                    .collect();
                ViewData::Attendance(AttendanceBoard::new(*date, rows))
            }
            View::LeaveRequests { status } => {
                let requests = self.list(context, ResourceKind::LeaveRequest).await?;
                let mut rows = Vec::with_capacity(requests.len());
                for record in requests {
                    let Record::LeaveRequest(request) = record else {
                        continue;
                    };
                    if status.is_some_and(|status| status != request.status) {
                        continue;
                    }

                    let applicant = match self
                        .related(context, &request, LeaveRequestEdge::Applicant)
                        .await
                    {
                        Ok(profile) => profile.map(|profile| profile.name),
                        Err(GatewayError::Access(AccessError::NotFound)) => None,
                        Err(err) => return Err(err),
                    };
                    rows.push(LeaveRow { request, applicant });
                }
                ViewData::LeaveRequests(rows)
            }
            View::Payroll => ViewData::Payroll(
                self.list(context, ResourceKind::Payroll)
                    .await?
                    .into_iter()
                    .filter_map(|record| match record {
                        Record::Payroll(row) => Some(row),
                        _ => None,
                    })
                    .collect(),
            ),
            View::PerformanceReviews => ViewData::PerformanceReviews(
                self.list(context, ResourceKind::PerformanceReview)
                    .await?
                    .into_iter()
                    .filter_map(|record| match record {
                        Record::PerformanceReview(row) => Some(row),
                        _ => None,
                    })
                    .collect(),
            ),
            View::Directory => ViewData::Directory(
                self.list(context, ResourceKind::Profile)
                    .await?
                    .into_iter()
                    .filter_map(|record| match record {
                        Record::Profile(row) => Some(row),
                        _ => None,
                    })
                    .collect(),
            ),
        };

        Ok(data)
    }
}
