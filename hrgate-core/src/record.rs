// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Display;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{DepartmentId, PrincipalId, RecordId, ResourceKind, Role};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    HalfDay,
    OnLeave,
}

/// Attendance of one employee on one day. There is at most one row per employee and day.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendance {
    pub id: RecordId,
    pub employee: PrincipalId,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
}

impl Attendance {
    pub fn new(employee: PrincipalId, date: NaiveDate, status: AttendanceStatus) -> Self {
        Self {
            id: RecordId::UNASSIGNED,
            employee,
            date,
            status,
            check_in: None,
            check_out: None,
        }
    }

    pub fn with_times(mut self, check_in: NaiveTime, check_out: Option<NaiveTime>) -> Self {
        self.check_in = Some(check_in);
        self.check_out = check_out;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveKind {
    Annual,
    Sick,
    Unpaid,
    Other,
}

/// Status of a leave request. Only `Pending` requests can transition, every other status is
/// final.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl LeaveStatus {
    pub const ALL: [LeaveStatus; 4] = [
        LeaveStatus::Pending,
        LeaveStatus::Approved,
        LeaveStatus::Rejected,
        LeaveStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveStatus::Pending => "pending",
            LeaveStatus::Approved => "approved",
            LeaveStatus::Rejected => "rejected",
            LeaveStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_final(&self) -> bool {
        !matches!(self, LeaveStatus::Pending)
    }
}

impl Display for LeaveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LeaveStatus {
    type Err = UnknownStatusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        LeaveStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| UnknownStatusError(value.to_string()))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown leave status '{0}'")]
pub struct UnknownStatusError(String);

/// Request for leave. References two principals: the `applicant` who owns the request and the
/// `approver` who decided it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub id: RecordId,
    pub applicant: PrincipalId,
    pub approver: Option<PrincipalId>,
    pub kind: LeaveKind,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
    pub status: LeaveStatus,
}

impl LeaveRequest {
    pub fn new(
        applicant: PrincipalId,
        kind: LeaveKind,
        start_date: NaiveDate,
        end_date: NaiveDate,
        reason: &str,
    ) -> Self {
        Self {
            id: RecordId::UNASSIGNED,
            applicant,
            approver: None,
            kind,
            start_date,
            end_date,
            reason: reason.to_string(),
            status: LeaveStatus::Pending,
        }
    }

    /// Number of calendar days covered, both ends included.
    pub fn days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }
}

/// Payroll entry of one employee for one month. Amounts are in minor currency units and are
/// computed elsewhere.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payroll {
    pub id: RecordId,
    pub employee: PrincipalId,

    /// First day of the month this entry pays for.
    pub period: NaiveDate,
    pub gross: i64,
    pub deductions: i64,
    pub net: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceReview {
    pub id: RecordId,
    pub employee: PrincipalId,
    pub reviewer: Option<PrincipalId>,
    pub period: String,

    /// Rating from 1 to 5.
    pub rating: u8,
    pub comments: String,
}

/// Profile of a principal. The identity store reads role and department from here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: PrincipalId,
    pub name: String,
    pub email: String,
    pub job_title: Option<String>,
    pub role: Role,
    pub department: Option<DepartmentId>,
}

impl Profile {
    pub fn new(id: PrincipalId, name: &str, role: Role, department: Option<DepartmentId>) -> Self {
        let email = format!("{}@example.org", name.to_lowercase().replace(' ', "."));
        Self {
            id,
            name: name.to_string(),
            email,
            job_title: None,
            role,
            department,
        }
    }
}

/// Column of a record which can be written.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Employee,
    Applicant,
    Approver,
    Reviewer,
    Date,
    Status,
    CheckIn,
    CheckOut,
    LeaveKind,
    StartDate,
    EndDate,
    Reason,
    Period,
    Gross,
    Deductions,
    Net,
    Rating,
    Comments,
    Name,
    Email,
    JobTitle,
    Role,
    Department,
}

impl Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Field::Employee => "employee",
            Field::Applicant => "applicant",
            Field::Approver => "approver",
            Field::Reviewer => "reviewer",
            Field::Date => "date",
            Field::Status => "status",
            Field::CheckIn => "check_in",
            Field::CheckOut => "check_out",
            Field::LeaveKind => "leave_kind",
            Field::StartDate => "start_date",
            Field::EndDate => "end_date",
            Field::Reason => "reason",
            Field::Period => "period",
            Field::Gross => "gross",
            Field::Deductions => "deductions",
            Field::Net => "net",
            Field::Rating => "rating",
            Field::Comments => "comments",
            Field::Name => "name",
            Field::Email => "email",
            Field::JobTitle => "job_title",
            Field::Role => "role",
            Field::Department => "department",
        };

        write!(f, "{}", s)
    }
}

/// Any HR record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Record {
    Attendance(Attendance),
    LeaveRequest(LeaveRequest),
    Payroll(Payroll),
    PerformanceReview(PerformanceReview),
    Profile(Profile),
}

impl Record {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Record::Attendance(_) => ResourceKind::Attendance,
            Record::LeaveRequest(_) => ResourceKind::LeaveRequest,
            Record::Payroll(_) => ResourceKind::Payroll,
            Record::PerformanceReview(_) => ResourceKind::PerformanceReview,
            Record::Profile(_) => ResourceKind::Profile,
        }
    }

    pub fn id(&self) -> RecordId {
        match self {
            Record::Attendance(record) => record.id,
            Record::LeaveRequest(record) => record.id,
            Record::Payroll(record) => record.id,
            Record::PerformanceReview(record) => record.id,
            Record::Profile(record) => record.id.into(),
        }
    }

    /// The employee this record concerns.
    pub fn owner(&self) -> PrincipalId {
        match self {
            Record::Attendance(record) => record.employee,
            Record::LeaveRequest(record) => record.applicant,
            Record::Payroll(record) => record.employee,
            Record::PerformanceReview(record) => record.employee,
            Record::Profile(record) => record.id,
        }
    }

    /// Returns the record with the given id assigned. Profiles keep the id of their principal.
    pub fn with_id(mut self, id: RecordId) -> Self {
        match &mut self {
            Record::Attendance(record) => record.id = id,
            Record::LeaveRequest(record) => record.id = id,
            Record::Payroll(record) => record.id = id,
            Record::PerformanceReview(record) => record.id = id,
            Record::Profile(_) => (),
        }
        self
    }

    /// Key which must be unique among all records of the same kind, if any.
    pub fn unique_key(&self) -> Option<String> {
        match self {
            Record::Attendance(record) => Some(format!("{}:{}", record.employee, record.date)),
            Record::Payroll(record) => Some(format!("{}:{}", record.employee, record.period)),
            _ => None,
        }
    }

    /// Status column used for conditional transitions.
    pub fn status(&self) -> Option<LeaveStatus> {
        match self {
            Record::LeaveRequest(record) => Some(record.status),
            _ => None,
        }
    }

    /// Principal referenced by the given foreign key column, if the column exists and is set.
    pub fn party(&self, column: &str) -> Option<PrincipalId> {
        match (self, column) {
            (Record::Attendance(record), "employee_id") => Some(record.employee),
            (Record::LeaveRequest(record), "applicant_id") => Some(record.applicant),
            (Record::LeaveRequest(record), "approver_id") => record.approver,
            (Record::Payroll(record), "employee_id") => Some(record.employee),
            (Record::PerformanceReview(record), "employee_id") => Some(record.employee),
            (Record::PerformanceReview(record), "reviewer_id") => record.reviewer,
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<(), InvalidRecord> {
        let reason = match self {
            Record::Attendance(record) => match (record.check_in, record.check_out) {
                (None, Some(_)) => Some("check-out without check-in"),
                (Some(check_in), Some(check_out)) if check_out < check_in => {
                    Some("check-out before check-in")
                }
                _ => None,
            },
            Record::LeaveRequest(record) => {
                if record.end_date < record.start_date {
                    Some("leave ends before it starts")
                } else if record.status == LeaveStatus::Pending && record.approver.is_some() {
                    Some("pending leave can not have an approver")
                } else {
                    None
                }
            }
            Record::Payroll(record) => {
                if record.period.day() != 1 {
                    Some("payroll period must start on the first of a month")
                } else if record.gross < 0 || record.deductions < 0 || record.net < 0 {
                    Some("payroll amounts must not be negative")
                } else {
                    None
                }
            }
            Record::PerformanceReview(record) => {
                if !(1..=5).contains(&record.rating) {
                    Some("rating must be between 1 and 5")
                } else if record.reviewer == Some(record.employee) {
                    Some("employees can not review themselves")
                } else {
                    None
                }
            }
            Record::Profile(record) => {
                if record.name.trim().is_empty() {
                    Some("profile name is empty")
                } else if !record.email.contains('@') {
                    Some("profile email is malformed")
                } else {
                    None
                }
            }
        };

        match reason {
            Some(reason) => Err(InvalidRecord {
                kind: self.kind(),
                reason,
            }),
            None => Ok(()),
        }
    }

    /// Fields which differ between this record and the given newer version of it.
    pub fn changed_fields(&self, new: &Record) -> Result<Vec<Field>, RecordMismatch> {
        let mut fields = Vec::new();

        match (self, new) {
            (Record::Attendance(old), Record::Attendance(new)) if old.id == new.id => {
                diff(&mut fields, Field::Employee, &old.employee, &new.employee);
                diff(&mut fields, Field::Date, &old.date, &new.date);
                diff(&mut fields, Field::Status, &old.status, &new.status);
                diff(&mut fields, Field::CheckIn, &old.check_in, &new.check_in);
                diff(&mut fields, Field::CheckOut, &old.check_out, &new.check_out);
            }
            (Record::LeaveRequest(old), Record::LeaveRequest(new)) if old.id == new.id => {
                diff(&mut fields, Field::Applicant, &old.applicant, &new.applicant);
                diff(&mut fields, Field::Approver, &old.approver, &new.approver);
                diff(&mut fields, Field::LeaveKind, &old.kind, &new.kind);
                diff(&mut fields, Field::StartDate, &old.start_date, &new.start_date);
                diff(&mut fields, Field::EndDate, &old.end_date, &new.end_date);
                diff(&mut fields, Field::Reason, &old.reason, &new.reason);
                diff(&mut fields, Field::Status, &old.status, &new.status);
            }
            (Record::Payroll(old), Record::Payroll(new)) if old.id == new.id => {
                diff(&mut fields, Field::Employee, &old.employee, &new.employee);
                diff(&mut fields, Field::Period, &old.period, &new.period);
                diff(&mut fields, Field::Gross, &old.gross, &new.gross);
                diff(&mut fields, Field::Deductions, &old.deductions, &new.deductions);
                diff(&mut fields, Field::Net, &old.net, &new.net);
            }
            (Record::PerformanceReview(old), Record::PerformanceReview(new))
                if old.id == new.id =>
            {
                diff(&mut fields, Field::Employee, &old.employee, &new.employee);
                diff(&mut fields, Field::Reviewer, &old.reviewer, &new.reviewer);
                diff(&mut fields, Field::Period, &old.period, &new.period);
                diff(&mut fields, Field::Rating, &old.rating, &new.rating);
                diff(&mut fields, Field::Comments, &old.comments, &new.comments);
            }
            (Record::Profile(old), Record::Profile(new)) if old.id == new.id => {
                diff(&mut fields, Field::Name, &old.name, &new.name);
                diff(&mut fields, Field::Email, &old.email, &new.email);
                diff(&mut fields, Field::JobTitle, &old.job_title, &new.job_title);
                diff(&mut fields, Field::Role, &old.role, &new.role);
                diff(&mut fields, Field::Department, &old.department, &new.department);
            }
            _ => {
                return Err(RecordMismatch {
                    left: (self.kind(), self.id()),
                    right: (new.kind(), new.id()),
                });
            }
        }

        Ok(fields)
    }

    pub fn as_attendance(&self) -> Option<&Attendance> {
        match self {
            Record::Attendance(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_leave_request(&self) -> Option<&LeaveRequest> {
        match self {
            Record::LeaveRequest(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_payroll(&self) -> Option<&Payroll> {
        match self {
            Record::Payroll(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_performance_review(&self) -> Option<&PerformanceReview> {
        match self {
            Record::PerformanceReview(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_profile(&self) -> Option<&Profile> {
        match self {
            Record::Profile(record) => Some(record),
            _ => None,
        }
    }
}

fn diff<T: PartialEq>(fields: &mut Vec<Field>, field: Field, old: &T, new: &T) {
    if old != new {
        fields.push(field);
    }
}

impl From<Attendance> for Record {
    fn from(record: Attendance) -> Self {
        Record::Attendance(record)
    }
}

impl From<LeaveRequest> for Record {
    fn from(record: LeaveRequest) -> Self {
        Record::LeaveRequest(record)
    }
}

impl From<Payroll> for Record {
    fn from(record: Payroll) -> Self {
        Record::Payroll(record)
    }
}

impl From<PerformanceReview> for Record {
    fn from(record: PerformanceReview) -> Self {
        Record::PerformanceReview(record)
    }
}

impl From<Profile> for Record {
    fn from(record: Profile) -> Self {
        Record::Profile(record)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid {kind} record: {reason}")]
pub struct InvalidRecord {
    pub kind: ResourceKind,
    pub reason: &'static str,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("can not compare {} {} with {} {}", left.0, left.1, right.0, right.1)]
pub struct RecordMismatch {
    pub left: (ResourceKind, RecordId),
    pub right: (ResourceKind, RecordId),
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{NaiveDate, NaiveTime};

    use crate::{
        Attendance, AttendanceStatus, DepartmentId, Field, LeaveKind, LeaveRequest, LeaveStatus,
        PrincipalId, Profile, Record, RecordId, Role,
    };

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
    }

    #[test]
    fn leave_changes_are_listed_per_field() {
        let old = LeaveRequest::new(
            PrincipalId::new(5),
            LeaveKind::Annual,
            date(2),
            date(4),
            "family visit",
        );
        let mut new = old.clone();
        new.status = LeaveStatus::Approved;
        new.approver = Some(PrincipalId::new(2));

        let fields = Record::from(old).changed_fields(&new.into()).unwrap();
        assert_eq!(fields, vec![Field::Approver, Field::Status]);
    }

    #[test]
    fn changes_across_records_are_rejected() {
        let attendance = Attendance {
            id: RecordId::new(1),
            ..Attendance::new(PrincipalId::new(5), date(2), AttendanceStatus::Present)
        };
        let profile = Profile::new(PrincipalId::new(5), "Alice", Role::Employee, None);

        assert!(
            Record::from(attendance.clone())
                .changed_fields(&profile.into())
                .is_err()
        );

        // Same kind but different id.
        let other = Attendance {
            id: RecordId::new(2),
            ..attendance.clone()
        };
        assert!(
            Record::from(attendance)
                .changed_fields(&other.into())
                .is_err()
        );
    }

    #[test]
    fn validation() {
        let leave = LeaveRequest::new(
            PrincipalId::new(5),
            LeaveKind::Sick,
            date(4),
            date(2),
            "flu",
        );
        assert_matches!(Record::from(leave).validate(), Err(err) if err.reason.contains("ends"));

        let attendance = Attendance::new(PrincipalId::new(5), date(2), AttendanceStatus::Present)
            .with_times(
                NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
                Some(NaiveTime::from_hms_opt(9, 0, 0).unwrap()),
            );
        assert!(Record::from(attendance).validate().is_err());

        let profile = Profile::new(
            PrincipalId::new(5),
            "Alice Smith",
            Role::Employee,
            Some(DepartmentId::new(10)),
        );
        assert_eq!(profile.email, "alice.smith@example.org");
        assert!(Record::from(profile).validate().is_ok());
    }

    #[test]
    fn unique_keys_and_parties() {
        let attendance = Attendance::new(PrincipalId::new(5), date(2), AttendanceStatus::Present);
        let record = Record::from(attendance);
        assert_eq!(record.unique_key().as_deref(), Some("5:2026-03-02"));
        assert_eq!(record.party("employee_id"), Some(PrincipalId::new(5)));
        assert_eq!(record.party("approver_id"), None);

        let leave = LeaveRequest::new(
            PrincipalId::new(5),
            LeaveKind::Annual,
            date(2),
            date(2),
            "",
        );
        let record = Record::from(leave);
        assert_eq!(record.unique_key(), None);
        assert_eq!(record.party("applicant_id"), Some(PrincipalId::new(5)));
        assert_eq!(record.party("approver_id"), None);
    }

    #[test]
    fn assigning_ids() {
        let attendance = Attendance::new(PrincipalId::new(5), date(2), AttendanceStatus::Present);
        let record = Record::from(attendance).with_id(RecordId::new(9));
        assert_eq!(record.id(), RecordId::new(9));

        // Profiles always keep the id of their principal.
        let profile = Profile::new(PrincipalId::new(5), "Alice", Role::Employee, None);
        let record = Record::from(profile).with_id(RecordId::new(9));
        assert_eq!(record.id(), RecordId::new(5));
    }
}
