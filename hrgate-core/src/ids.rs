// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub const fn as_u64(&self) -> u64 {
                self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                value
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|_| IdError(value.to_string()))
            }
        }
    };
}

identifier!(
    /// Identifier of an authenticated actor. Equal to the id of the actor's `Profile` record.
    PrincipalId
);

identifier!(
    /// Identifier of a department.
    DepartmentId
);

identifier!(
    /// Identifier of a record, unique per resource kind.
    RecordId
);

identifier!(
    /// Identifier of an open dashboard session.
    SessionId
);

impl RecordId {
    /// Placeholder for records which were not persisted yet. Stores assign the real id on insert.
    pub const UNASSIGNED: RecordId = RecordId(0);

    pub fn is_unassigned(&self) -> bool {
        *self == Self::UNASSIGNED
    }
}

impl From<PrincipalId> for RecordId {
    fn from(id: PrincipalId) -> Self {
        Self(id.as_u64())
    }
}

impl From<RecordId> for PrincipalId {
    fn from(id: RecordId) -> Self {
        Self(id.as_u64())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid identifier '{0}'")]
pub struct IdError(String);

#[cfg(test)]
mod tests {
    use super::{PrincipalId, RecordId};

    #[test]
    fn parse_and_display() {
        let id: PrincipalId = "42".parse().unwrap();
        assert_eq!(id, PrincipalId::new(42));
        assert_eq!(id.to_string(), "42");
        assert!("forty-two".parse::<PrincipalId>().is_err());
    }

    #[test]
    fn profile_ids_map_to_principals() {
        let principal = PrincipalId::new(7);
        let record: RecordId = principal.into();
        assert_eq!(PrincipalId::from(record), principal);
        assert!(!record.is_unassigned());
        assert!(RecordId::UNASSIGNED.is_unassigned());
    }
}
