// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read, write and approve decisions on HR records.
//!
//! Decisions are pure functions of a [`PrincipalContext`], a [`ResourceRef`] and an [`Action`].
//! They never touch a store, the owner's department is looked up by the caller right before the
//! decision and handed in with the resource.
mod rules;

use std::cell::Cell;
use std::fmt::Display;
use std::sync::Arc;

use hrgate_core::{DepartmentId, Field, PrincipalId, Record, RecordId, ResourceKind};
use tracing::debug;

use crate::{AccessError, PrincipalContext};

pub use rules::{Predicate, Rule, RuleSet};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Read,
    Write,

    /// Decide a pending leave request.
    Approve,
}

impl Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Action::Read => "read",
            Action::Write => "write",
            Action::Approve => "approve",
        };

        write!(f, "{}", s)
    }
}

/// Columns an allowed action may touch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Columns {
    All,
    Only(&'static [Field]),
}

impl Columns {
    pub fn permits(&self, field: Field) -> bool {
        match self {
            Columns::All => true,
            Columns::Only(fields) => fields.contains(&field),
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Columns::All)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow(Columns),
    Deny,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }
}

/// The facts about a record a decision is based on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub id: RecordId,
    pub owner: PrincipalId,

    /// Department of the owner at the time of the request.
    pub department: Option<DepartmentId>,
}

impl ResourceRef {
    pub fn new(
        kind: ResourceKind,
        id: RecordId,
        owner: PrincipalId,
        department: Option<DepartmentId>,
    ) -> Self {
        Self {
            kind,
            id,
            owner,
            department,
        }
    }

    pub fn from_record(record: &Record, department: Option<DepartmentId>) -> Self {
        Self::new(record.kind(), record.id(), record.owner(), department)
    }
}

thread_local! {
    static EVALUATING: Cell<usize> = const { Cell::new(0) };
    static CYCLE: Cell<Option<PrincipalId>> = const { Cell::new(None) };
}

/// Marks the current thread as evaluating a policy for as long as the guard lives.
struct EvaluationGuard;

impl EvaluationGuard {
    fn enter() -> Self {
        EVALUATING.with(|depth| depth.set(depth.get() + 1));
        Self
    }

    /// Principal whose resolution was attempted from inside this evaluation, if any.
    fn take_cycle(&self) -> Option<PrincipalId> {
        CYCLE.with(Cell::take)
    }
}

impl Drop for EvaluationGuard {
    fn drop(&mut self) {
        let depth = EVALUATING.with(|depth| {
            let remaining = depth.get().saturating_sub(1);
            depth.set(remaining);
            remaining
        });
        if depth == 0 {
            CYCLE.with(|cycle| cycle.set(None));
        }
    }
}

/// Returns `true` while a policy decision is evaluated on the current thread.
pub fn is_evaluating() -> bool {
    EVALUATING.with(|depth| depth.get() > 0)
}

/// Records that a principal was resolved from inside the running evaluation. The decision it
/// belongs to fails with [`AccessError::PolicyCycleDetected`] instead of being reported.
pub(crate) fn report_cycle(id: PrincipalId) {
    if is_evaluating() {
        CYCLE.with(|cycle| cycle.set(Some(id)));
    }
}

/// Evaluates an ordered [`RuleSet`].
///
/// Admins are allowed everything without consulting any rule. For everyone else the first rule
/// matching the resource kind, action and predicate decides, and if no rule matches the action is
/// denied.
#[derive(Clone, Debug)]
pub struct PolicyEngine {
    rules: Arc<RuleSet>,
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new(RuleSet::canonical())
    }
}

impl PolicyEngine {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules: Arc::new(rules),
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Decide an action. A decision that failed with a policy cycle counts as a denial, use
    /// [`PolicyEngine::evaluate`] to tell both apart.
    pub fn authorize(
        &self,
        context: &PrincipalContext,
        resource: &ResourceRef,
        action: Action,
    ) -> Decision {
        self.evaluate(context, resource, action)
            .unwrap_or(Decision::Deny)
    }

    /// Decide an action, failing if a rule tried to resolve a principal while it was evaluated.
    pub fn evaluate(
        &self,
        context: &PrincipalContext,
        resource: &ResourceRef,
        action: Action,
    ) -> Result<Decision, AccessError> {
        if context.is_admin() {
            return Ok(Decision::Allow(Columns::All));
        }

        let guard = EvaluationGuard::enter();
        let decision = self
            .rules
            .rules_for(resource.kind, action)
            .find(|rule| rule.predicate.matches(context, resource))
            .map(|rule| Decision::Allow(rule.columns))
            .unwrap_or(Decision::Deny);

        match guard.take_cycle() {
            Some(id) => Err(AccessError::PolicyCycleDetected(id)),
            None => Ok(decision),
        }
    }

    /// Authorizes an action and turns a denial into the error a caller is allowed to see.
    ///
    /// Principals who may not read the record are told it does not exist. Only principals who can
    /// already see it learn that the action itself was refused.
    pub fn check(
        &self,
        context: &PrincipalContext,
        resource: &ResourceRef,
        action: Action,
    ) -> Result<Columns, AccessError> {
        if let Decision::Allow(columns) = self.evaluate(context, resource, action)? {
            return Ok(columns);
        }

        let visible = action != Action::Read
            && self
                .evaluate(context, resource, Action::Read)?
                .is_allowed();

        debug!(
            principal = %context.id(),
            kind = %resource.kind,
            record = %resource.id,
            %action,
            visible,
            "denied"
        );

        if visible {
            Err(AccessError::PermissionDenied)
        } else {
            Err(AccessError::NotFound)
        }
    }
}
