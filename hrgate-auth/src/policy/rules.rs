// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Debug;
use std::sync::Arc;

use hrgate_core::{Field, ResourceKind, Role};

use crate::PrincipalContext;
use crate::policy::{Action, Columns, ResourceRef};

type CustomPredicate = dyn Fn(&PrincipalContext, &ResourceRef) -> bool + Send + Sync;

/// Condition under which a rule applies.
#[derive(Clone)]
pub enum Predicate {
    /// The principal owns the resource.
    Owner,

    /// The principal has the given role.
    Role(Role),

    /// The principal has the given role and shares the owner's department.
    SameDepartment(Role),

    /// Like [`Predicate::SameDepartment`] but never matches the principal's own resources.
    DepartmentPeer(Role),

    Custom(Arc<CustomPredicate>),
}

impl Predicate {
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&PrincipalContext, &ResourceRef) -> bool + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(predicate))
    }

    pub fn matches(&self, context: &PrincipalContext, resource: &ResourceRef) -> bool {
        match self {
            Predicate::Owner => context.id() == resource.owner,
            Predicate::Role(role) => context.role() == *role,
            Predicate::SameDepartment(role) => {
                context.role() == *role && same_department(context, resource)
            }
            Predicate::DepartmentPeer(role) => {
                context.role() == *role
                    && context.id() != resource.owner
                    && same_department(context, resource)
            }
            Predicate::Custom(predicate) => predicate(context, resource),
        }
    }
}

/// Principals and owners without a department are in no department, not in a shared one.
fn same_department(context: &PrincipalContext, resource: &ResourceRef) -> bool {
    match (context.department(), resource.department) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}

impl Debug for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Predicate::Owner => write!(f, "Owner"),
            Predicate::Role(role) => write!(f, "Role({role:?})"),
            Predicate::SameDepartment(role) => write!(f, "SameDepartment({role:?})"),
            Predicate::DepartmentPeer(role) => write!(f, "DepartmentPeer({role:?})"),
            Predicate::Custom(_) => write!(f, "Custom"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Rule {
    pub kind: ResourceKind,
    pub action: Action,
    pub predicate: Predicate,
    pub columns: Columns,
}

impl Rule {
    pub fn new(kind: ResourceKind, action: Action, predicate: Predicate) -> Self {
        Self {
            kind,
            action,
            predicate,
            columns: Columns::All,
        }
    }

    pub fn only(mut self, fields: &'static [Field]) -> Self {
        self.columns = Columns::Only(fields);
        self
    }
}

const ATTENDANCE_OWNER_FIELDS: &[Field] =
    &[Field::Date, Field::Status, Field::CheckIn, Field::CheckOut];

// Status is listed so owners can cancel, it only ever changes through a transition.
const LEAVE_OWNER_FIELDS: &[Field] = &[
    Field::LeaveKind,
    Field::StartDate,
    Field::EndDate,
    Field::Reason,
    Field::Status,
];

const LEAVE_APPROVER_FIELDS: &[Field] = &[Field::Status, Field::Approver];

const REVIEW_MANAGER_FIELDS: &[Field] =
    &[Field::Reviewer, Field::Period, Field::Rating, Field::Comments];

const PROFILE_OWNER_FIELDS: &[Field] = &[Field::Name, Field::Email, Field::JobTitle];

/// Ordered list of rules. Order matters only within the same resource kind and action.
#[derive(Clone, Debug, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Rules of the HR system.
    ///
    /// | Resource          | Owner                  | Manager (same department)  | Recruiter |
    /// |-------------------|------------------------|----------------------------|-----------|
    /// | Attendance        | read, write            | read                       | read      |
    /// | LeaveRequest      | read, write and cancel | read, approve (not own)    | read      |
    /// | Payroll           | read                   | read                       | read      |
    /// | PerformanceReview | read                   | read, write (not own)      | read      |
    /// | Profile           | read, write            | read                       | read      |
    ///
    /// Admins are not listed, they bypass all rules.
    pub fn canonical() -> Self {
        use Action::{Approve, Read, Write};
        use Predicate::{DepartmentPeer, Owner, SameDepartment};
        use ResourceKind::{Attendance, LeaveRequest, PerformanceReview, Profile};

        let mut rules = Self::empty();

        for kind in ResourceKind::ALL {
            rules.push(Rule::new(kind, Read, Owner));
            rules.push(Rule::new(kind, Read, SameDepartment(Role::Manager)));
            rules.push(Rule::new(kind, Read, Predicate::Role(Role::Recruiter)));
        }

        rules
            .with_rule(Rule::new(Attendance, Write, Owner).only(ATTENDANCE_OWNER_FIELDS))
            .with_rule(Rule::new(LeaveRequest, Write, Owner).only(LEAVE_OWNER_FIELDS))
            .with_rule(
                Rule::new(LeaveRequest, Approve, DepartmentPeer(Role::Manager))
                    .only(LEAVE_APPROVER_FIELDS),
            )
            .with_rule(
                Rule::new(PerformanceReview, Write, DepartmentPeer(Role::Manager))
                    .only(REVIEW_MANAGER_FIELDS),
            )
            .with_rule(Rule::new(Profile, Write, Owner).only(PROFILE_OWNER_FIELDS))
    }

    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.push(rule);
        self
    }

    pub fn rules_for(
        &self,
        kind: ResourceKind,
        action: Action,
    ) -> impl Iterator<Item = &Rule> + '_ {
        self.rules
            .iter()
            .filter(move |rule| rule.kind == kind && rule.action == action)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
