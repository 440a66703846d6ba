// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use hrgate_auth::schema::resolve_edge;
use hrgate_auth::{
    Action, IdentityStore, PolicyEngine, PrincipalContext, ResourceRef, RoleResolver,
};
use hrgate_core::{
    ChangeEvent, DepartmentId, Field, InvalidRecord, LeaveRequest, LeaveStatus, Operation,
    PrincipalId, Profile, Record, RecordId, Related, ResourceKind, SessionId,
};
use hrgate_notify::{ChangeNotifier, Subscription};
use hrgate_store::{RecordStore, ReplaceOutcome};
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::builder::GatewayBuilder;
use crate::error::GatewayError;
use crate::{AccessError, Session, View};

/// Storage backends a gateway runs on: a record store which also serves as identity store.
pub trait Backend:
    RecordStore + IdentityStore<Error = <Self as RecordStore>::Error>
{
}

impl<T> Backend for T where T: RecordStore + IdentityStore<Error = <T as RecordStore>::Error> {}

/// Error type of a backend's record store.
pub type StoreError<S> = <S as RecordStore>::Error;

type Result<T, S> = std::result::Result<T, GatewayError<StoreError<S>>>;

/// Decision on a pending leave request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Approve,
    Reject,
}

impl Verdict {
    pub fn status(&self) -> LeaveStatus {
        match self {
            Verdict::Approve => LeaveStatus::Approved,
            Verdict::Reject => LeaveStatus::Rejected,
        }
    }
}

/// Serializes commits and publishes per entity type so events of one type leave in commit order.
#[derive(Debug, Default)]
struct CommitGates {
    attendance: Mutex<()>,
    leave_request: Mutex<()>,
    payroll: Mutex<()>,
    performance_review: Mutex<()>,
    profile: Mutex<()>,
}

impl CommitGates {
    async fn enter(&self, kind: ResourceKind) -> MutexGuard<'_, ()> {
        let gate = match kind {
            ResourceKind::Attendance => &self.attendance,
            ResourceKind::LeaveRequest => &self.leave_request,
            ResourceKind::Payroll => &self.payroll,
            ResourceKind::PerformanceReview => &self.performance_review,
            ResourceKind::Profile => &self.profile,
        };
        gate.lock().await
    }
}

/// The gated query path.
///
/// Every read and write is authorized against a resolved [`PrincipalContext`]. The gateway can
/// be cloned cheaply, all clones share the store, resolver cache and notifier.
#[derive(Clone)]
pub struct Gateway<S> {
    store: S,
    engine: PolicyEngine,
    resolver: RoleResolver<S>,
    notifier: ChangeNotifier,
    gates: Arc<CommitGates>,
    next_session: Arc<AtomicU64>,
}

impl Gateway<()> {
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }
}

impl<S> Gateway<S>
where
    S: Backend,
{
    pub(crate) fn from_parts(store: S, engine: PolicyEngine, notifier: ChangeNotifier) -> Self {
        Self {
            resolver: RoleResolver::new(store.clone()),
            store,
            engine,
            notifier,
            gates: Arc::default(),
            next_session: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Underlying store.
    ///
    /// Access through the store is not authorized, it is meant for seeding and the identity
    /// boundary.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn engine(&self) -> &PolicyEngine {
        &self.engine
    }

    pub fn resolver(&self) -> &RoleResolver<S> {
        &self.resolver
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Resolve a principal, reusing the cached context if there is one.
    pub async fn resolve(&self, principal: PrincipalId) -> Result<PrincipalContext, S> {
        Ok(self.resolver.resolve(principal).await?)
    }

    /// Resolve a principal with a fresh identity lookup.
    pub async fn refresh(&self, principal: PrincipalId) -> Result<PrincipalContext, S> {
        Ok(self.resolver.refresh(principal).await?)
    }

    /// Subscribe to change events of the given entity types.
    pub fn subscribe(&self, kinds: impl IntoIterator<Item = ResourceKind>) -> Subscription {
        self.notifier.subscribe(kinds)
    }

    /// Creates a dashboard session for a principal. The session resolves the principal when it
    /// is opened.
    pub fn session(&self, principal: PrincipalId, view: View) -> Session<S> {
        let id = SessionId::new(self.next_session.fetch_add(1, Ordering::SeqCst));
        Session::new(id, principal, view, self.clone())
    }

    async fn department_of(&self, principal: PrincipalId) -> Result<Option<DepartmentId>, S> {
        self.store
            .department_of(principal)
            .await
            .map_err(GatewayError::Store)
    }

    async fn resource(&self, record: &Record) -> Result<ResourceRef, S> {
        let department = self.department_of(record.owner()).await?;
        Ok(ResourceRef::from_record(record, department))
    }

    async fn fetch(&self, kind: ResourceKind, id: RecordId) -> Result<Record, S> {
        self.store
            .get(kind, id)
            .await
            .map_err(GatewayError::Store)?
            .ok_or(GatewayError::Access(AccessError::NotFound))
    }

    fn announce(&self, kind: ResourceKind, id: RecordId, operation: Operation, actor: PrincipalId) {
        if kind == ResourceKind::Profile {
            self.resolver.invalidate(PrincipalId::from(id));
        }
        self.notifier
            .publish(ChangeEvent::new(kind, id, operation, actor));
    }

    /// Get a record the principal may read.
    pub async fn get(
        &self,
        context: &PrincipalContext,
        kind: ResourceKind,
        id: RecordId,
    ) -> Result<Record, S> {
        let record = self.fetch(kind, id).await?;
        let resource = self.resource(&record).await?;
        self.engine.check(context, &resource, Action::Read)?;
        Ok(record)
    }

    /// All records of one kind the principal may read. Records outside of their visibility are
    /// left out without a trace.
    pub async fn list(&self, context: &PrincipalContext, kind: ResourceKind) -> Result<Vec<Record>, S> {
        let records = self.store.list(kind).await.map_err(GatewayError::Store)?;

        // Departments are looked up once per owner and only for the duration of this request.
        let mut departments: HashMap<PrincipalId, Option<DepartmentId>> = HashMap::new();
        let mut visible = Vec::with_capacity(records.len());

        for record in records {
            let owner = record.owner();
            let department = match departments.get(&owner) {
                Some(department) => *department,
                None => {
                    let department = self.department_of(owner).await?;
                    departments.insert(owner, department);
                    department
                }
            };

            let resource = ResourceRef::from_record(&record, department);
            if self
                .engine
                .evaluate(context, &resource, Action::Read)?
                .is_allowed()
            {
                visible.push(record);
            }
        }

        Ok(visible)
    }

    /// Follow a named edge from a record to the profile it references.
    ///
    /// Returns `None` if the edge is not set. The profile is subject to the same visibility rules
    /// as any other record.
    pub async fn related<R: Related>(
        &self,
        context: &PrincipalContext,
        record: &R,
        edge: R::Edge,
    ) -> Result<Option<Profile>, S> {
        let party = record.party(edge);
        self.follow(context, &record.clone().into(), party).await
    }

    /// Follow an edge given by name, as received from outside of the type system.
    ///
    /// Without a name this only works if exactly one edge leads to a profile, otherwise the join
    /// is ambiguous and refused.
    pub async fn related_by_name(
        &self,
        context: &PrincipalContext,
        record: &Record,
        edge: Option<&str>,
    ) -> Result<Option<Profile>, S> {
        let path = resolve_edge(record.kind(), edge, ResourceKind::Profile)?;
        self.follow(context, record, record.party(path.column)).await
    }

    async fn follow(
        &self,
        context: &PrincipalContext,
        source: &Record,
        party: Option<PrincipalId>,
    ) -> Result<Option<Profile>, S> {
        let resource = self.resource(source).await?;
        self.engine.check(context, &resource, Action::Read)?;

        let Some(party) = party else {
            return Ok(None);
        };

        match self.get(context, ResourceKind::Profile, party.into()).await? {
            Record::Profile(profile) => Ok(Some(profile)),
            _ => Err(GatewayError::Access(AccessError::NotFound)),
        }
    }

    /// Create a new record.
    ///
    /// The principal needs to be allowed to write the record as if it existed already. If they
    /// are not, they learn about the refusal only if they can see the profile of the record's
    /// owner.
    pub async fn create(&self, context: &PrincipalContext, record: Record) -> Result<Record, S> {
        record.validate()?;
        if let Record::LeaveRequest(request) = &record
            && request.status != LeaveStatus::Pending
        {
            return Err(GatewayError::InvalidRecord(InvalidRecord {
                kind: ResourceKind::LeaveRequest,
                reason: "new leave requests must be pending",
            }));
        }

        let owner = record.owner();
        let resource = self.resource(&record).await?;
        if !self
            .engine
            .evaluate(context, &resource, Action::Write)?
            .is_allowed()
        {
            let profile = ResourceRef::new(
                ResourceKind::Profile,
                owner.into(),
                owner,
                resource.department,
            );
            let visible = self
                .engine
                .evaluate(context, &profile, Action::Read)?
                .is_allowed();
            debug!(
                principal = %context.id(),
                kind = %resource.kind,
                %owner,
                visible,
                "denied create"
            );
            return Err(GatewayError::Access(if visible {
                AccessError::PermissionDenied
            } else {
                AccessError::NotFound
            }));
        }

        let kind = record.kind();
        let _gate = self.gates.enter(kind).await;
        let Some(stored) = self.store.insert(record).await.map_err(GatewayError::Store)? else {
            return Err(GatewayError::AlreadyExists);
        };
        self.announce(kind, stored.id(), Operation::Insert, context.id());

        Ok(stored)
    }

    /// Replace a record the caller has seen before with a new version of it.
    ///
    /// Only columns the principal may write can differ between `last_seen` and `record`. If the
    /// stored record is not `last_seen` anymore the update is refused with
    /// `ConflictAlreadyDecided`.
    pub async fn update(
        &self,
        context: &PrincipalContext,
        last_seen: &Record,
        record: Record,
    ) -> Result<Record, S> {
        let kind = last_seen.kind();
        let stored = self.fetch(kind, last_seen.id()).await?;
        let resource = self.resource(&stored).await?;
        let columns = self.engine.check(context, &resource, Action::Write)?;

        if stored != *last_seen {
            return Err(GatewayError::Access(AccessError::ConflictAlreadyDecided));
        }

        record.validate()?;
        let changed = last_seen.changed_fields(&record).map_err(|_| {
            GatewayError::InvalidRecord(InvalidRecord {
                kind,
                reason: "update changes record type or id",
            })
        })?;

        if changed.is_empty() {
            return Ok(stored);
        }

        if kind == ResourceKind::LeaveRequest
            && changed
                .iter()
                .any(|field| matches!(field, Field::Status | Field::Approver))
        {
            return Err(GatewayError::InvalidRecord(InvalidRecord {
                kind,
                reason: "leave status only changes through a decision or cancellation",
            }));
        }

        if let Some(field) = changed.iter().find(|field| !columns.permits(**field)) {
            debug!(
                principal = %context.id(),
                %kind,
                record = %stored.id(),
                %field,
                "denied write to column"
            );
            return Err(GatewayError::Access(AccessError::PermissionDenied));
        }

        let _gate = self.gates.enter(kind).await;
        match self
            .store
            .replace(last_seen, &record)
            .await
            .map_err(GatewayError::Store)?
        {
            ReplaceOutcome::Applied => {
                self.announce(kind, record.id(), Operation::Update, context.id());
                Ok(record)
            }
            ReplaceOutcome::Stale => Err(GatewayError::Access(AccessError::ConflictAlreadyDecided)),
            ReplaceOutcome::Duplicate => Err(GatewayError::AlreadyExists),
        }
    }

    /// Delete a record. Needs unrestricted write access.
    pub async fn delete(
        &self,
        context: &PrincipalContext,
        kind: ResourceKind,
        id: RecordId,
    ) -> Result<(), S> {
        let stored = self.fetch(kind, id).await?;
        let resource = self.resource(&stored).await?;
        let columns = self.engine.check(context, &resource, Action::Write)?;
        if !columns.is_unrestricted() {
            return Err(GatewayError::Access(AccessError::PermissionDenied));
        }

        let _gate = self.gates.enter(kind).await;
        if !self.store.delete(kind, id).await.map_err(GatewayError::Store)? {
            return Err(GatewayError::Access(AccessError::NotFound));
        }
        self.announce(kind, id, Operation::Delete, context.id());

        Ok(())
    }

    /// Cancel a pending leave request.
    pub async fn cancel_leave(
        &self,
        context: &PrincipalContext,
        id: RecordId,
        last_seen: LeaveStatus,
    ) -> Result<LeaveRequest, S> {
        let stored = self.fetch(ResourceKind::LeaveRequest, id).await?;
        let resource = self.resource(&stored).await?;
        let columns = self.engine.check(context, &resource, Action::Write)?;
        if !columns.permits(Field::Status) {
            return Err(GatewayError::Access(AccessError::PermissionDenied));
        }

        self.transition(context, &stored, last_seen, LeaveStatus::Cancelled, None)
            .await
    }

    /// Approve or reject a pending leave request.
    ///
    /// `last_seen` is the status the caller based their decision on. Only the first of several
    /// concurrent decisions is committed, everyone else receives `ConflictAlreadyDecided`.
    pub async fn decide_leave(
        &self,
        context: &PrincipalContext,
        id: RecordId,
        last_seen: LeaveStatus,
        verdict: Verdict,
    ) -> Result<LeaveRequest, S> {
        let stored = self.fetch(ResourceKind::LeaveRequest, id).await?;
        let resource = self.resource(&stored).await?;
        self.engine.check(context, &resource, Action::Approve)?;

        self.transition(
            context,
            &stored,
            last_seen,
            verdict.status(),
            Some(context.id()),
        )
        .await
    }

    async fn transition(
        &self,
        context: &PrincipalContext,
        stored: &Record,
        last_seen: LeaveStatus,
        to: LeaveStatus,
        approver: Option<PrincipalId>,
    ) -> Result<LeaveRequest, S> {
        if last_seen.is_final() || stored.status() != Some(last_seen) {
            return Err(GatewayError::Access(AccessError::ConflictAlreadyDecided));
        }

        let _gate = self.gates.enter(ResourceKind::LeaveRequest).await;
        let Some(request) = self
            .store
            .transition_leave(stored.id(), last_seen, to, approver)
            .await
            .map_err(GatewayError::Store)?
        else {
            debug!(record = %stored.id(), %to, "leave request was decided concurrently");
            return Err(GatewayError::Access(AccessError::ConflictAlreadyDecided));
        };
        self.announce(
            ResourceKind::LeaveRequest,
            request.id,
            Operation::Update,
            context.id(),
        );

        Ok(request)
    }
}
