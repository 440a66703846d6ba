// SPDX-License-Identifier: MIT OR Apache-2.0

//! Role-scoped access to HR records.
//!
//! All reads and writes go through a [`Gateway`]. A request first resolves its principal into a
//! [`PrincipalContext`] once, every decision afterwards is made by the policy engine against that
//! context and the record's owner and current department. Records outside of a principal's
//! visibility are reported as `NotFound`.
//!
//! Successful mutations are announced with identifier-only change events. Dashboard
//! [`Session`]s subscribe to the entity types their [`View`] shows and re-run their authorized
//! query on every event, their own mutations included, so each session only ever shows what its
//! principal may see.
//!
//! ## Example
//!
//! ```rust
//! # use hrgate::{Gateway, View};
//! # use hrgate_core::{PrincipalId, Profile, Role, DepartmentId};
//! # use hrgate_store::RecordStore;
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = Gateway::builder().build_memory();
//!
//! // Profiles are the identity store and seeded out of band.
//! let alice = PrincipalId::new(5);
//! gateway
//!     .store()
//!     .insert(Profile::new(alice, "Alice", Role::Employee, Some(DepartmentId::new(10))).into())
//!     .await?;
//!
//! let context = gateway.resolve(alice).await?;
//! let mut session = gateway.session(alice, View::Directory);
//! session.open().await?;
//! assert_eq!(context.role(), Role::Employee);
//! # Ok(())
//! # }
//! ```
mod builder;
mod config;
pub mod dashboard;
mod error;
mod gateway;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use builder::GatewayBuilder;
pub use config::Config;
pub use dashboard::{
    AttendanceBoard, LeaveRow, Session, SessionHandle, SessionState, View, ViewData,
};
pub use error::GatewayError;
pub use gateway::{Backend, Gateway, StoreError, Verdict};
pub use hrgate_auth::{AccessError, PrincipalContext};
