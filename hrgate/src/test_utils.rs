// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixtures for testing gateways and dashboard sessions.
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use hrgate_auth::IdentityStore;
use hrgate_core::{
    DepartmentId, LeaveRequest, LeaveStatus, Principal, PrincipalId, Profile, Record, RecordId,
    ResourceKind, Role,
};
use hrgate_store::{MemoryStore, RecordStore, ReplaceOutcome};
use tokio::sync::{RwLock, RwLockWriteGuard, watch};

use crate::gateway::{Backend, StoreError};

pub use hrgate_auth::test_utils::context;

pub const DEPT_A: DepartmentId = DepartmentId::new(10);
pub const DEPT_B: DepartmentId = DepartmentId::new(20);

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

/// Principals of a small company with two departments.
#[derive(Clone, Copy, Debug)]
pub struct Directory {
    pub admin: PrincipalId,
    pub manager_a: PrincipalId,
    pub manager_b: PrincipalId,
    pub recruiter: PrincipalId,
    pub alice: PrincipalId,
    pub bob: PrincipalId,
    pub carol: PrincipalId,
}

impl Default for Directory {
    fn default() -> Self {
        Self {
            admin: PrincipalId::new(1),
            manager_a: PrincipalId::new(2),
            manager_b: PrincipalId::new(3),
            recruiter: PrincipalId::new(4),
            alice: PrincipalId::new(5),
            bob: PrincipalId::new(6),
            carol: PrincipalId::new(7),
        }
    }
}

impl Directory {
    pub fn profiles(&self) -> Vec<Profile> {
        vec![
            Profile::new(self.admin, "Ada Admin", Role::Admin, Some(DEPT_A)),
            Profile::new(self.manager_a, "Mia Manager", Role::Manager, Some(DEPT_A)),
            Profile::new(self.manager_b, "Max Manager", Role::Manager, Some(DEPT_B)),
            Profile::new(self.recruiter, "Rui Recruiter", Role::Recruiter, None),
            Profile::new(self.alice, "Alice", Role::Employee, Some(DEPT_A)),
            Profile::new(self.bob, "Bob", Role::Employee, Some(DEPT_B)),
            Profile::new(self.carol, "Carol", Role::Employee, Some(DEPT_A)),
        ]
    }

    /// Inserts every profile directly into the store, bypassing authorization.
    pub async fn seed<S: Backend>(store: &S) -> Result<Self, StoreError<S>> {
        let directory = Self::default();
        for profile in directory.profiles() {
            store.insert(profile.into()).await?;
        }
        Ok(directory)
    }
}

/// Memory store which counts identity lookups and can hold back listing queries.
#[derive(Clone, Debug)]
pub struct InstrumentedStore {
    inner: MemoryStore,
    lookups: Arc<AtomicUsize>,
    lists: Arc<watch::Sender<usize>>,
    list_gate: Arc<RwLock<()>>,
}

impl Default for InstrumentedStore {
    fn default() -> Self {
        Self {
            inner: MemoryStore::default(),
            lookups: Arc::default(),
            lists: Arc::new(watch::Sender::new(0)),
            list_gate: Arc::default(),
        }
    }
}

impl InstrumentedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of identity lookups so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Receiver of the number of listing queries started so far.
    pub fn lists(&self) -> watch::Receiver<usize> {
        self.lists.subscribe()
    }

    /// Blocks every listing query until the returned guard is dropped.
    pub async fn hold_lists(&self) -> RwLockWriteGuard<'_, ()> {
        self.list_gate.write().await
    }
}

impl RecordStore for InstrumentedStore {
    type Error = <MemoryStore as RecordStore>::Error;

    async fn get(&self, kind: ResourceKind, id: RecordId) -> Result<Option<Record>, Self::Error> {
        self.inner.get(kind, id).await
    }

    async fn list(&self, kind: ResourceKind) -> Result<Vec<Record>, Self::Error> {
        self.lists.send_modify(|lists| *lists += 1);
        let _permit = self.list_gate.read().await;
        self.inner.list(kind).await
    }

    async fn insert(&self, record: Record) -> Result<Option<Record>, Self::Error> {
        self.inner.insert(record).await
    }

    async fn replace(&self, expected: &Record, new: &Record) -> Result<ReplaceOutcome, Self::Error> {
        self.inner.replace(expected, new).await
    }

    async fn transition_leave(
        &self,
        id: RecordId,
        from: LeaveStatus,
        to: LeaveStatus,
        approver: Option<PrincipalId>,
    ) -> Result<Option<LeaveRequest>, Self::Error> {
        self.inner.transition_leave(id, from, to, approver).await
    }

    async fn delete(&self, kind: ResourceKind, id: RecordId) -> Result<bool, Self::Error> {
        self.inner.delete(kind, id).await
    }

    async fn department_of(
        &self,
        principal: PrincipalId,
    ) -> Result<Option<DepartmentId>, Self::Error> {
        self.inner.department_of(principal).await
    }
}

impl IdentityStore for InstrumentedStore {
    type Error = <MemoryStore as RecordStore>::Error;

    async fn principal(&self, id: PrincipalId) -> Result<Option<Principal>, Self::Error> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        IdentityStore::principal(&self.inner, id).await
    }
}
