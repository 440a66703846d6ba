// SPDX-License-Identifier: MIT OR Apache-2.0

use hrgate_core::{DepartmentId, Principal, PrincipalId, Role};

/// Resolved identity of the principal behind a request or dashboard session.
///
/// A context is produced once by the `RoleResolver` and then passed by value into every policy
/// decision. It does not change while it is held, a session which wants to observe a changed role
/// or department needs to resolve a new one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrincipalContext {
    id: PrincipalId,
    role: Role,
    department: Option<DepartmentId>,
}

impl PrincipalContext {
    pub(crate) fn from_principal(principal: Principal) -> Self {
        Self {
            id: principal.id,
            role: principal.role,
            department: principal.department,
        }
    }

    /// Builds a context without consulting an identity store.
    #[cfg(any(test, feature = "test_utils"))]
    pub fn new(id: PrincipalId, role: Role, department: Option<DepartmentId>) -> Self {
        Self {
            id,
            role,
            department,
        }
    }

    pub fn id(&self) -> PrincipalId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn department(&self) -> Option<DepartmentId> {
        self.department
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
