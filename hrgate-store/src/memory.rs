// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory persistence for HR records.
use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use hrgate_auth::IdentityStore;
use hrgate_core::{
    DepartmentId, LeaveRequest, LeaveStatus, Principal, PrincipalId, Record, RecordId,
    ResourceKind,
};

use crate::{RecordStore, ReplaceOutcome};

type RecordKey = (ResourceKind, RecordId);

#[derive(Clone, Debug, Default)]
pub struct InnerMemoryStore {
    records: BTreeMap<RecordKey, Record>,
    unique: HashMap<(ResourceKind, String), RecordId>,
    next_id: u64,
}

impl InnerMemoryStore {
    fn assign_id(&mut self, record: Record) -> Record {
        if record.kind() == ResourceKind::Profile {
            return record;
        }
        self.next_id += 1;
        record.with_id(RecordId::new(self.next_id))
    }

    fn unique_key_taken(&self, record: &Record) -> bool {
        record.unique_key().is_some_and(|key| {
            self.unique
                .get(&(record.kind(), key))
                .is_some_and(|owner| *owner != record.id())
        })
    }
}

/// An in-memory store for HR records.
///
/// `MemoryStore` supports usage in asynchronous and multi-threaded contexts by wrapping an
/// `InnerMemoryStore` with an `RwLock` and `Arc`. Every operation takes the lock exactly once, so
/// each of them is atomic.
///
/// This does not persist data permanently, all changes are lost when the process ends.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<InnerMemoryStore>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Obtain a read-lock on the store.
    pub fn read_store(&self) -> RwLockReadGuard<'_, InnerMemoryStore> {
        self.inner
            .read()
            .expect("acquire shared read access on store")
    }

    /// Obtain a write-lock on the store.
    pub fn write_store(&self) -> RwLockWriteGuard<'_, InnerMemoryStore> {
        self.inner
            .write()
            .expect("acquire exclusive write access on store")
    }
}

impl RecordStore for MemoryStore {
    type Error = Infallible;

    async fn get(&self, kind: ResourceKind, id: RecordId) -> Result<Option<Record>, Self::Error> {
        Ok(self.read_store().records.get(&(kind, id)).cloned())
    }

    async fn list(&self, kind: ResourceKind) -> Result<Vec<Record>, Self::Error> {
        let store = self.read_store();
        let records = store
            .records
            .range((kind, RecordId::new(0))..=(kind, RecordId::new(u64::MAX)))
            .map(|(_, record)| record.clone())
            .collect();
        Ok(records)
    }

    async fn insert(&self, record: Record) -> Result<Option<Record>, Self::Error> {
        let mut store = self.write_store();

        if store.unique_key_taken(&record) {
            return Ok(None);
        }

        let record = store.assign_id(record);
        let key = (record.kind(), record.id());
        if store.records.contains_key(&key) {
            return Ok(None);
        }

        if let Some(unique_key) = record.unique_key() {
            store.unique.insert((record.kind(), unique_key), record.id());
        }
        store.records.insert(key, record.clone());

        Ok(Some(record))
    }

    async fn replace(&self, expected: &Record, new: &Record) -> Result<ReplaceOutcome, Self::Error> {
        let mut store = self.write_store();
        let key = (expected.kind(), expected.id());

        if store.records.get(&key) != Some(expected) || (new.kind(), new.id()) != key {
            return Ok(ReplaceOutcome::Stale);
        }

        if store.unique_key_taken(new) {
            return Ok(ReplaceOutcome::Duplicate);
        }

        if let Some(unique_key) = expected.unique_key() {
            store.unique.remove(&(expected.kind(), unique_key));
        }
        if let Some(unique_key) = new.unique_key() {
            store.unique.insert((new.kind(), unique_key), new.id());
        }
        store.records.insert(key, new.clone());

        Ok(ReplaceOutcome::Applied)
    }

    async fn transition_leave(
        &self,
        id: RecordId,
        from: LeaveStatus,
        to: LeaveStatus,
        approver: Option<PrincipalId>,
    ) -> Result<Option<LeaveRequest>, Self::Error> {
        let mut store = self.write_store();

        let Some(Record::LeaveRequest(request)) =
            store.records.get_mut(&(ResourceKind::LeaveRequest, id))
        else {
            return Ok(None);
        };

        if request.status != from {
            return Ok(None);
        }

        request.status = to;
        request.approver = approver;
        Ok(Some(request.clone()))
    }

    async fn delete(&self, kind: ResourceKind, id: RecordId) -> Result<bool, Self::Error> {
        let mut store = self.write_store();
        let Some(record) = store.records.remove(&(kind, id)) else {
            return Ok(false);
        };

        if let Some(unique_key) = record.unique_key() {
            store.unique.remove(&(kind, unique_key));
        }

        Ok(true)
    }

    async fn department_of(
        &self,
        principal: PrincipalId,
    ) -> Result<Option<DepartmentId>, Self::Error> {
        let store = self.read_store();
        let department = store
            .records
            .get(&(ResourceKind::Profile, principal.into()))
            .and_then(Record::as_profile)
            .and_then(|profile| profile.department);
        Ok(department)
    }
}

impl IdentityStore for MemoryStore {
    type Error = Infallible;

    async fn principal(&self, id: PrincipalId) -> Result<Option<Principal>, Self::Error> {
        let store = self.read_store();
        let principal = store
            .records
            .get(&(ResourceKind::Profile, id.into()))
            .and_then(Record::as_profile)
            .map(Principal::from);
        Ok(principal)
    }
}
