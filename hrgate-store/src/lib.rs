// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage of HR records.
//!
//! The store is the only arbiter of truth. It does not know about principals or policies, but it
//! enforces the invariants concurrent writers rely on: uniqueness of attendance and payroll rows,
//! compare-and-swap replacement of whole records and conditional leave status transitions.
//!
//! Both backends also implement [`IdentityStore`](hrgate_auth::IdentityStore) by reading profiles
//! directly, bypassing any access policy.
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(any(test, feature = "test_utils"))]
mod test_utils;
mod traits;

pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteError, SqliteStore, SqliteStoreBuilder};
pub use traits::{RecordStore, ReplaceOutcome};
