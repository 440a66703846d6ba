// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::{Arc, Mutex, OnceLock};

use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime};
use futures_util::{FutureExt, StreamExt};
use hrgate::test_utils::{DEPT_A, Directory, InstrumentedStore, context, setup_logging};
use hrgate::{AccessError, Backend, Gateway, GatewayError, PrincipalContext, Verdict};
use hrgate_auth::{Action, Predicate, ResolveError, RoleResolver, Rule, RuleSet};
use hrgate_core::{
    Attendance, AttendanceStatus, ChangeEvent, LeaveKind, LeaveRequest, LeaveRequestEdge,
    LeaveStatus, Operation, Payroll, PrincipalId, Record, RecordId, ResourceKind, Role,
};
use hrgate_notify::Notice;
use hrgate_store::MemoryStore;

fn day(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
}

fn time(hour: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, 0, 0).unwrap()
}

async fn memory_gateway() -> (Gateway<MemoryStore>, Directory) {
    setup_logging();
    let gateway = Gateway::builder().build_memory();
    let directory = Directory::seed(gateway.store()).await.unwrap();
    (gateway, directory)
}

async fn contexts<S: Backend, const N: usize>(
    gateway: &Gateway<S>,
    ids: [PrincipalId; N],
) -> [PrincipalContext; N] {
    let mut contexts = Vec::with_capacity(N);
    for id in ids {
        contexts.push(gateway.resolve(id).await.unwrap());
    }
    contexts.try_into().unwrap()
}

fn payroll(employee: PrincipalId) -> Payroll {
    Payroll {
        id: RecordId::UNASSIGNED,
        employee,
        period: day(1),
        gross: 500_000,
        deductions: 120_000,
        net: 380_000,
    }
}

fn leave(applicant: PrincipalId) -> LeaveRequest {
    LeaveRequest::new(applicant, LeaveKind::Annual, day(16), day(20), "Holiday")
}

#[tokio::test]
async fn attendance_round_trip() {
    let (gateway, d) = memory_gateway().await;
    let alice = gateway.resolve(d.alice).await.unwrap();

    let attendance = Attendance::new(d.alice, day(2), AttendanceStatus::Present)
        .with_times(time(9), Some(time(17)));
    let created = gateway.create(&alice, attendance.clone().into()).await.unwrap();
    assert!(!created.id().is_unassigned());
    assert_eq!(created, Record::from(attendance.clone()).with_id(created.id()));

    let fetched = gateway
        .get(&alice, ResourceKind::Attendance, created.id())
        .await
        .unwrap();
    assert_eq!(fetched, created);

    // One row per employee and day.
    assert_matches!(
        gateway.create(&alice, attendance.into()).await,
        Err(GatewayError::AlreadyExists)
    );
}

#[tokio::test]
async fn visibility_follows_role_and_department() {
    let (gateway, d) = memory_gateway().await;
    let [alice, carol, bob, manager_a, manager_b, recruiter, admin] = contexts(
        &gateway,
        [d.alice, d.carol, d.bob, d.manager_a, d.manager_b, d.recruiter, d.admin],
    )
    .await;

    let record = gateway
        .create(
            &alice,
            Attendance::new(d.alice, day(2), AttendanceStatus::Present).into(),
        )
        .await
        .unwrap();

    for context in [&alice, &manager_a, &recruiter, &admin] {
        assert_eq!(
            gateway
                .get(context, ResourceKind::Attendance, record.id())
                .await
                .unwrap(),
            record
        );
    }

    // Colleagues and managers of other departments can not tell the record exists.
    for context in [&carol, &bob, &manager_b] {
        assert_matches!(
            gateway.get(context, ResourceKind::Attendance, record.id()).await,
            Err(GatewayError::Access(AccessError::NotFound))
        );
        assert!(
            gateway
                .list(context, ResourceKind::Attendance)
                .await
                .unwrap()
                .is_empty()
        );
    }

    let hidden = gateway
        .get(&manager_b, ResourceKind::Attendance, record.id())
        .await
        .unwrap_err();
    let missing = gateway
        .get(&manager_b, ResourceKind::Attendance, RecordId::new(999))
        .await
        .unwrap_err();
    assert_eq!(hidden.access(), missing.access());
    assert_eq!(hidden.user_message(), missing.user_message());
}

#[tokio::test]
async fn owners_can_not_change_their_payroll() {
    let (gateway, d) = memory_gateway().await;
    let [alice, carol, admin] = contexts(&gateway, [d.alice, d.carol, d.admin]).await;

    let record = gateway
        .create(&admin, payroll(d.alice).into())
        .await
        .unwrap();
    assert_eq!(
        gateway
            .get(&alice, ResourceKind::Payroll, record.id())
            .await
            .unwrap(),
        record
    );

    let mut raised = record.as_payroll().unwrap().clone();
    raised.net += 100_000;
    let denied = gateway
        .update(&alice, &record, raised.into())
        .await
        .unwrap_err();
    assert_matches!(denied, GatewayError::Access(AccessError::PermissionDenied));
    assert_eq!(denied.user_message(), "This record is not available.");

    assert_matches!(
        gateway.delete(&alice, ResourceKind::Payroll, record.id()).await,
        Err(GatewayError::Access(AccessError::PermissionDenied))
    );
    assert_matches!(
        gateway.get(&carol, ResourceKind::Payroll, record.id()).await,
        Err(GatewayError::Access(AccessError::NotFound))
    );

    // Employees can not create payroll entries, not even their own.
    let mut next_month = payroll(d.alice);
    next_month.period = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
    assert_matches!(
        gateway.create(&alice, next_month.into()).await,
        Err(GatewayError::Access(AccessError::PermissionDenied))
    );
}

#[tokio::test]
async fn admins_delete_records() {
    let (gateway, d) = memory_gateway().await;
    let [alice, manager_a, admin] = contexts(&gateway, [d.alice, d.manager_a, d.admin]).await;

    let record = gateway
        .create(
            &alice,
            Attendance::new(d.alice, day(2), AttendanceStatus::Present).into(),
        )
        .await
        .unwrap();
    let mut changes = gateway.subscribe([ResourceKind::Attendance]);

    // Owners and managers see the row but can not remove it.
    assert_matches!(
        gateway.delete(&alice, ResourceKind::Attendance, record.id()).await,
        Err(GatewayError::Access(AccessError::PermissionDenied))
    );
    assert_matches!(
        gateway.delete(&manager_a, ResourceKind::Attendance, record.id()).await,
        Err(GatewayError::Access(AccessError::PermissionDenied))
    );

    gateway
        .delete(&admin, ResourceKind::Attendance, record.id())
        .await
        .unwrap();
    assert_matches!(
        changes.next().await,
        Some(Notice::Changed(ChangeEvent {
            entity: ResourceKind::Attendance,
            operation: Operation::Delete,
            id,
            actor,
            ..
        })) if id == record.id() && actor == d.admin
    );

    for context in [&admin, &alice] {
        assert_matches!(
            gateway.get(context, ResourceKind::Attendance, record.id()).await,
            Err(GatewayError::Access(AccessError::NotFound))
        );
    }
    assert!(gateway.list(&admin, ResourceKind::Attendance).await.unwrap().is_empty());
    assert_matches!(
        gateway.delete(&admin, ResourceKind::Attendance, record.id()).await,
        Err(GatewayError::Access(AccessError::NotFound))
    );

    // The day is free again and the new row gets an id of its own.
    let again = gateway
        .create(
            &alice,
            Attendance::new(d.alice, day(2), AttendanceStatus::Present).into(),
        )
        .await
        .unwrap();
    assert_ne!(again.id(), record.id());
}

#[tokio::test]
async fn owners_write_only_their_columns() {
    let (gateway, d) = memory_gateway().await;
    let alice = gateway.resolve(d.alice).await.unwrap();

    let record = gateway
        .create(
            &alice,
            Attendance::new(d.alice, day(3), AttendanceStatus::Absent).into(),
        )
        .await
        .unwrap();

    let mut present = record.as_attendance().unwrap().clone();
    present.status = AttendanceStatus::Present;
    present.check_in = Some(time(10));
    let updated = gateway
        .update(&alice, &record, present.clone().into())
        .await
        .unwrap();
    assert_eq!(updated, Record::from(present.clone()));

    // The record moved on, the old copy is stale.
    let mut stale = record.as_attendance().unwrap().clone();
    stale.status = AttendanceStatus::HalfDay;
    assert_matches!(
        gateway.update(&alice, &record, stale.into()).await,
        Err(GatewayError::Access(AccessError::ConflictAlreadyDecided))
    );

    // Handing the row to somebody else is not one of the owner's columns.
    let mut reassigned = present.clone();
    reassigned.employee = d.carol;
    assert_matches!(
        gateway.update(&alice, &updated, reassigned.into()).await,
        Err(GatewayError::Access(AccessError::PermissionDenied))
    );

    let mut invalid = present;
    invalid.check_out = Some(time(8));
    assert_matches!(
        gateway.update(&alice, &updated, invalid.into()).await,
        Err(GatewayError::InvalidRecord(_))
    );
}

#[tokio::test]
async fn creating_for_others_reveals_nothing_hidden() {
    let (gateway, d) = memory_gateway().await;
    let [bob, recruiter] = contexts(&gateway, [d.bob, d.recruiter]).await;

    let attendance = Attendance::new(d.alice, day(4), AttendanceStatus::Present);

    // Recruiters see Alice's profile, so they learn they may not write.
    assert_matches!(
        gateway.create(&recruiter, attendance.clone().into()).await,
        Err(GatewayError::Access(AccessError::PermissionDenied))
    );
    assert_matches!(
        gateway.create(&bob, attendance.into()).await,
        Err(GatewayError::Access(AccessError::NotFound))
    );
}

#[tokio::test]
async fn managers_decide_leave_in_their_department() {
    let (gateway, d) = memory_gateway().await;
    let [alice, manager_a, manager_b] =
        contexts(&gateway, [d.alice, d.manager_a, d.manager_b]).await;

    let record = gateway
        .create(&alice, leave(d.alice).into())
        .await
        .unwrap();

    assert_matches!(
        gateway
            .decide_leave(&manager_b, record.id(), LeaveStatus::Pending, Verdict::Approve)
            .await,
        Err(GatewayError::Access(AccessError::NotFound))
    );
    assert_matches!(
        gateway
            .decide_leave(&alice, record.id(), LeaveStatus::Pending, Verdict::Approve)
            .await,
        Err(GatewayError::Access(AccessError::PermissionDenied))
    );

    let approved = gateway
        .decide_leave(&manager_a, record.id(), LeaveStatus::Pending, Verdict::Approve)
        .await
        .unwrap();
    assert_eq!(approved.status, LeaveStatus::Approved);
    assert_eq!(approved.approver, Some(d.manager_a));

    // Alice still believes the request is pending.
    assert_matches!(
        gateway
            .cancel_leave(&alice, record.id(), LeaveStatus::Pending)
            .await,
        Err(GatewayError::Access(AccessError::ConflictAlreadyDecided))
    );

    // Managers can not approve their own requests.
    let own = gateway
        .create(&manager_a, leave(d.manager_a).into())
        .await
        .unwrap();
    assert_matches!(
        gateway
            .decide_leave(&manager_a, own.id(), LeaveStatus::Pending, Verdict::Approve)
            .await,
        Err(GatewayError::Access(AccessError::PermissionDenied))
    );
}

#[tokio::test]
async fn leave_status_only_changes_through_decisions() {
    let (gateway, d) = memory_gateway().await;
    let alice = gateway.resolve(d.alice).await.unwrap();

    let record = gateway
        .create(&alice, leave(d.alice).into())
        .await
        .unwrap();

    let mut approved = record.as_leave_request().unwrap().clone();
    approved.status = LeaveStatus::Approved;
    approved.approver = Some(d.alice);
    assert_matches!(
        gateway.update(&alice, &record, approved.into()).await,
        Err(GatewayError::InvalidRecord(_))
    );

    let mut longer = record.as_leave_request().unwrap().clone();
    longer.end_date = day(24);
    let updated = gateway
        .update(&alice, &record, longer.into())
        .await
        .unwrap();
    assert_eq!(updated.as_leave_request().unwrap().days(), 9);

    let cancelled = gateway
        .cancel_leave(&alice, record.id(), LeaveStatus::Pending)
        .await
        .unwrap();
    assert_eq!(cancelled.status, LeaveStatus::Cancelled);
    assert_eq!(cancelled.approver, None);

    let mut decided = leave(d.alice);
    decided.status = LeaveStatus::Approved;
    assert_matches!(
        gateway.create(&alice, decided.into()).await,
        Err(GatewayError::InvalidRecord(_))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_decisions_have_one_winner() {
    let (gateway, d) = memory_gateway().await;
    let [alice, manager_a, admin] = contexts(&gateway, [d.alice, d.manager_a, d.admin]).await;

    for _ in 0..10 {
        let record = gateway
            .create(&alice, leave(d.alice).into())
            .await
            .unwrap();
        let id = record.id();

        let approve = tokio::spawn({
            let gateway = gateway.clone();
            let manager_a = manager_a.clone();
            async move {
                gateway
                    .decide_leave(&manager_a, id, LeaveStatus::Pending, Verdict::Approve)
                    .await
            }
        });
        let reject = tokio::spawn({
            let gateway = gateway.clone();
            let admin = admin.clone();
            async move {
                gateway
                    .decide_leave(&admin, id, LeaveStatus::Pending, Verdict::Reject)
                    .await
            }
        });

        let (approve, reject) = (approve.await.unwrap(), reject.await.unwrap());
        let winner = match (approve, reject) {
            (Ok(winner), Err(GatewayError::Access(AccessError::ConflictAlreadyDecided))) => winner,
            (Err(GatewayError::Access(AccessError::ConflictAlreadyDecided)), Ok(winner)) => winner,
            (approve, reject) => panic!("expected one winner, got {approve:?} and {reject:?}"),
        };

        let stored = gateway
            .get(&admin, ResourceKind::LeaveRequest, id)
            .await
            .unwrap();
        assert_eq!(stored, Record::from(winner));
    }
}

#[tokio::test]
async fn edges_are_followed_by_name() {
    let (gateway, d) = memory_gateway().await;
    let [alice, manager_a, recruiter] =
        contexts(&gateway, [d.alice, d.manager_a, d.recruiter]).await;

    let record = gateway
        .create(&alice, leave(d.alice).into())
        .await
        .unwrap();
    let pending = record.as_leave_request().unwrap().clone();

    let applicant = gateway
        .related(&manager_a, &pending, LeaveRequestEdge::Applicant)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(applicant.id, d.alice);
    assert_eq!(
        gateway
            .related(&recruiter, &pending, LeaveRequestEdge::Approver)
            .await
            .unwrap(),
        None
    );

    // Two edges lead from leave requests to profiles.
    assert_matches!(
        gateway.related_by_name(&manager_a, &record, None).await,
        Err(GatewayError::Access(AccessError::AmbiguousRelationship { candidates, .. }))
            if candidates == vec!["applicant", "approver"]
    );
    assert_matches!(
        gateway
            .related_by_name(&manager_a, &record, Some("manager"))
            .await,
        Err(GatewayError::Access(AccessError::UnknownRelationship { .. }))
    );

    let approved = gateway
        .decide_leave(&manager_a, record.id(), LeaveStatus::Pending, Verdict::Approve)
        .await
        .unwrap();
    let approved = Record::from(approved);
    let approver = gateway
        .related_by_name(&manager_a, &approved, Some("approver"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(approver.id, d.manager_a);

    // Employees do not see their manager's profile.
    assert_matches!(
        gateway
            .related_by_name(&alice, &approved, Some("approver"))
            .await,
        Err(GatewayError::Access(AccessError::NotFound))
    );

    // A single edge does not need a name.
    let attendance = gateway
        .create(
            &alice,
            Attendance::new(d.alice, day(5), AttendanceStatus::Present).into(),
        )
        .await
        .unwrap();
    let employee = gateway
        .related_by_name(&alice, &attendance, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(employee.id, d.alice);
}

#[tokio::test]
async fn department_moves_take_effect_immediately() {
    let (gateway, d) = memory_gateway().await;
    let [bob, manager_a, admin] = contexts(&gateway, [d.bob, d.manager_a, d.admin]).await;

    let record = gateway
        .create(
            &bob,
            Attendance::new(d.bob, day(6), AttendanceStatus::Present).into(),
        )
        .await
        .unwrap();
    assert_matches!(
        gateway.get(&manager_a, ResourceKind::Attendance, record.id()).await,
        Err(GatewayError::Access(AccessError::NotFound))
    );

    let profile = gateway
        .get(&admin, ResourceKind::Profile, d.bob.into())
        .await
        .unwrap();
    let mut moved = profile.as_profile().unwrap().clone();
    moved.department = Some(DEPT_A);
    gateway.update(&admin, &profile, moved.into()).await.unwrap();

    assert_eq!(
        gateway
            .get(&manager_a, ResourceKind::Attendance, record.id())
            .await
            .unwrap(),
        record
    );

    // The cached context of Bob was dropped with the profile change.
    let bob = gateway.resolve(d.bob).await.unwrap();
    assert_eq!(bob.department(), Some(DEPT_A));
}

#[tokio::test]
async fn unknown_principals_must_authenticate() {
    let (gateway, _) = memory_gateway().await;
    let err = gateway.resolve(PrincipalId::new(404)).await.unwrap_err();
    assert_matches!(err, GatewayError::Access(AccessError::AuthenticationRequired));
    assert_eq!(err.user_message(), "Please sign in to continue.");
}

#[tokio::test]
async fn admin_resolution_during_profile_checks_looks_up_once() {
    setup_logging();
    let store = InstrumentedStore::new();
    let gateway = Gateway::builder().build(store.clone());
    let d = Directory::seed(&store).await.unwrap();
    let checking = context(d.admin.as_u64(), Role::Admin, Some(DEPT_A.as_u64()));

    let (resolved, profiles) = tokio::join!(
        gateway.resolve(d.admin),
        gateway.list(&checking, ResourceKind::Profile)
    );

    let resolved = resolved.unwrap();
    assert_eq!(resolved.role(), Role::Admin);
    assert_eq!(profiles.unwrap().len(), 7);
    assert_eq!(store.lookups(), 1);

    assert_eq!(gateway.resolve(d.admin).await.unwrap(), resolved);
    assert_eq!(store.lookups(), 1);
}

#[tokio::test]
async fn resolving_from_inside_a_policy_is_a_cycle() {
    setup_logging();
    let slot: Arc<OnceLock<RoleResolver<MemoryStore>>> = Arc::default();
    let outcome = Arc::new(Mutex::new(None));

    let resolver = slot.clone();
    let observed = outcome.clone();
    let rules = RuleSet::canonical().with_rule(Rule::new(
        ResourceKind::Payroll,
        Action::Read,
        Predicate::custom(move |context, _| {
            let Some(resolver) = resolver.get() else {
                return false;
            };
            let result = resolver.resolve(context.id()).now_or_never();
            let allowed = matches!(&result, Some(Ok(context)) if context.is_admin());
            *observed.lock().unwrap() = Some(result);
            allowed
        }),
    ));

    let gateway = Gateway::builder().rules(rules).build_memory();
    slot.set(gateway.resolver().clone()).unwrap();
    let d = Directory::seed(gateway.store()).await.unwrap();
    let [bob, admin] = contexts(&gateway, [d.bob, d.admin]).await;

    let record = gateway
        .create(&admin, payroll(d.alice).into())
        .await
        .unwrap();
    let err = gateway
        .get(&bob, ResourceKind::Payroll, record.id())
        .await
        .unwrap_err();
    assert_matches!(
        &err,
        GatewayError::Access(AccessError::PolicyCycleDetected(id)) if *id == d.bob
    );
    assert_eq!(
        err.user_message(),
        "Something went wrong. Please try again later."
    );
    assert_matches!(
        outcome.lock().unwrap().take(),
        Some(Some(Err(ResolveError::PolicyCycleDetected(id)))) if id == d.bob
    );

    // Listing does not quietly drop the records the broken rule was asked about.
    assert_matches!(
        gateway.list(&bob, ResourceKind::Payroll).await,
        Err(GatewayError::Access(AccessError::PolicyCycleDetected(_)))
    );
}

#[tokio::test]
async fn sqlite_backend() {
    setup_logging();
    let gateway = Gateway::builder().build_sqlite().await.unwrap();
    let d = Directory::seed(gateway.store()).await.unwrap();
    let [alice, manager_a, manager_b] =
        contexts(&gateway, [d.alice, d.manager_a, d.manager_b]).await;

    let record = gateway
        .create(&alice, leave(d.alice).into())
        .await
        .unwrap();
    assert_matches!(
        gateway
            .get(&manager_b, ResourceKind::LeaveRequest, record.id())
            .await,
        Err(GatewayError::Access(AccessError::NotFound))
    );

    let approve = gateway.decide_leave(&manager_a, record.id(), LeaveStatus::Pending, Verdict::Approve);
    let cancel = gateway.cancel_leave(&alice, record.id(), LeaveStatus::Pending);
    let (approve, cancel) = tokio::join!(approve, cancel);
    assert!(approve.is_ok() != cancel.is_ok());

    let stored = gateway
        .get(&alice, ResourceKind::LeaveRequest, record.id())
        .await
        .unwrap();
    assert!(stored.status().unwrap().is_final());

    let admin = gateway.resolve(d.admin).await.unwrap();
    gateway
        .delete(&admin, ResourceKind::LeaveRequest, record.id())
        .await
        .unwrap();
    let next = gateway
        .create(&alice, leave(d.alice).into())
        .await
        .unwrap();
    assert!(next.id() > record.id());
}
