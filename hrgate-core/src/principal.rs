// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};

use crate::{DepartmentId, PrincipalId, Profile, Role};

/// Identity facts about an actor as kept by the identity store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub role: Role,
    pub department: Option<DepartmentId>,
}

impl From<&Profile> for Principal {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.id,
            role: profile.role,
            department: profile.department,
        }
    }
}
