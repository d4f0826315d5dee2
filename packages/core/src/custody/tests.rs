use chrono::Duration;

use super::service::SUPERSEDED_NOTE;
use super::{ScanAction, ScanKind};
use crate::error::{ConflictReason, CustodyError, Missing};
use crate::model::{
    CalibrationStatus, CustodyEventType, ItemKind, ItemState, SuspensionCause, WorkerRole,
};
use crate::testing::{fixed_now, Fixture};

async fn open_records(fx: &Fixture, asset_id: uuid::Uuid) -> usize {
    fx.repo
        .custody_history(Some(asset_id), None, 50)
        .await
        .unwrap()
        .iter()
        .filter(|entry| entry.record.returned_at.is_none())
        .count()
}

#[tokio::test]
async fn checkout_then_on_time_return() {
    let fx = Fixture::new().await;
    let worker = fx.worker("W-1", WorkerRole::Operator).await;
    let asset = fx.asset("TW-001", None).await;
    let service = fx.service();

    let record = service
        .checkout("QR-W-1", "QR-TW-001", None, Some("bay 4"))
        .await
        .unwrap();
    assert_eq!(record.worker_id, worker.id);
    assert_eq!(record.item.asset_id(), Some(asset.id));
    assert_eq!(record.event_type, CustodyEventType::Checkout);
    assert_eq!(record.expected_return_at, Some(fixed_now() + Duration::hours(8)));
    assert!(!record.is_override);

    let stored = fx.repo.asset(asset.id).await.unwrap().unwrap();
    assert_eq!(stored.state, ItemState::InCustody);
    let active = fx.repo.active_custody(fixed_now()).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].item_code, "TW-001");

    fx.clock.advance(Duration::hours(2));
    let closed = service
        .return_item("QR-W-1", "QR-TW-001", None, None)
        .await
        .unwrap();
    assert_eq!(closed.id, record.id);
    assert_eq!(closed.returned_at, Some(fixed_now() + Duration::hours(2)));
    assert_eq!(closed.overdue_hours, None);
    assert_eq!(closed.notes.as_deref(), Some("bay 4"));

    let stored = fx.repo.asset(asset.id).await.unwrap().unwrap();
    assert_eq!(stored.state, ItemState::Available);
    assert_eq!(open_records(&fx, asset.id).await, 0);
}

#[tokio::test]
async fn late_return_records_overdue_hours() {
    let fx = Fixture::new().await;
    fx.worker("W-1", WorkerRole::Operator).await;
    fx.asset("TW-001", None).await;
    let service = fx.service();

    service.checkout("QR-W-1", "QR-TW-001", None, None).await.unwrap();
    fx.clock.advance(Duration::hours(10));
    let closed = service
        .return_item("QR-W-1", "QR-TW-001", None, Some("left in van"))
        .await
        .unwrap();
    assert_eq!(closed.overdue_hours, Some(2.0));
    assert_eq!(closed.notes.as_deref(), Some("left in van"));
}

#[tokio::test]
async fn second_checkout_is_refused_while_held() {
    let fx = Fixture::new().await;
    fx.worker("W-1", WorkerRole::Operator).await;
    fx.worker("W-2", WorkerRole::Operator).await;
    let asset = fx.asset("TW-001", None).await;
    let service = fx.service();

    service.checkout("QR-W-1", "QR-TW-001", None, None).await.unwrap();
    let err = service
        .checkout("QR-W-2", "QR-TW-001", None, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CustodyError::Conflict(ConflictReason::AlreadyHeld(ItemKind::Asset))
    ));
    assert_eq!(open_records(&fx, asset.id).await, 1);
}

#[tokio::test]
async fn suspended_and_withdrawn_items_cannot_be_checked_out() {
    let fx = Fixture::new().await;
    fx.worker("W-1", WorkerRole::Operator).await;
    fx.worker("SUP-1", WorkerRole::Supervisor).await;
    let suspended = fx.asset("TW-001", None).await;
    let withdrawn = fx.asset("TW-002", None).await;
    let service = fx.service();

    service.suspend("QR-TW-001", "QR-SUP-1", None).await.unwrap();
    service.withdraw("QR-TW-002", "QR-SUP-1", Some("cracked")).await.unwrap();

    let err = service
        .checkout("QR-W-1", "QR-TW-001", None, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CustodyError::Conflict(ConflictReason::Suspended(ItemKind::Asset))
    ));
    let err = service
        .checkout("QR-W-1", "QR-TW-002", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CustodyError::Conflict(ConflictReason::Withdrawn)));

    let suspended = fx.repo.asset(suspended.id).await.unwrap().unwrap();
    let withdrawn = fx.repo.asset(withdrawn.id).await.unwrap().unwrap();
    assert_eq!(suspended.state, ItemState::Suspended);
    assert_eq!(withdrawn.state, ItemState::Withdrawn);
    assert_eq!(open_records(&fx, suspended.id).await, 0);
}

#[tokio::test]
async fn returning_an_item_on_the_shelf_conflicts() {
    let fx = Fixture::new().await;
    fx.worker("W-1", WorkerRole::Operator).await;
    fx.asset("TW-001", None).await;
    let err = fx
        .service()
        .return_item("QR-W-1", "QR-TW-001", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CustodyError::Conflict(ConflictReason::NotHeld)));
}

#[tokio::test]
async fn unknown_codes_are_not_found() {
    let fx = Fixture::new().await;
    fx.worker("W-1", WorkerRole::Operator).await;
    fx.asset("TW-001", None).await;
    let service = fx.service();

    let err = service
        .checkout("QR-NOBODY", "QR-TW-001", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CustodyError::NotFound(Missing::Worker(_))));
    let err = service
        .checkout("QR-W-1", "QR-NOTHING", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CustodyError::NotFound(Missing::Item(_))));
}

#[tokio::test]
async fn operator_cannot_override() {
    let fx = Fixture::new().await;
    fx.worker("W-1", WorkerRole::Operator).await;
    fx.worker("W-2", WorkerRole::Operator).await;
    let asset = fx.asset("TW-001", None).await;
    let service = fx.service();

    let err = service
        .override_checkout("QR-W-1", "QR-TW-001", "QR-W-2", "urgent", None)
        .await
        .unwrap_err();
    assert!(matches!(err, CustodyError::Forbidden { .. }));
    let stored = fx.repo.asset(asset.id).await.unwrap().unwrap();
    assert_eq!(stored.state, ItemState::Available);
}

#[tokio::test]
async fn override_on_a_held_item_supersedes_the_open_record() {
    let fx = Fixture::new().await;
    fx.worker("W-1", WorkerRole::Operator).await;
    let second = fx.worker("W-2", WorkerRole::Operator).await;
    let supervisor = fx.worker("SUP-1", WorkerRole::Supervisor).await;
    let asset = fx.asset("TW-001", None).await;
    let service = fx.service();

    let first = service.checkout("QR-W-1", "QR-TW-001", None, None).await.unwrap();
    fx.clock.advance(Duration::hours(1));
    let record = service
        .override_checkout("QR-W-2", "QR-TW-001", "QR-SUP-1", "line down", None)
        .await
        .unwrap();
    assert!(record.is_override);
    assert_eq!(record.worker_id, second.id);
    assert_eq!(record.override_by, Some(supervisor.id));
    assert_eq!(record.override_reason.as_deref(), Some("line down"));
    assert_eq!(record.event_type, CustodyEventType::OverrideCheckout);

    let stored = fx.repo.asset(asset.id).await.unwrap().unwrap();
    assert_eq!(stored.state, ItemState::OverrideCustody);
    assert_eq!(open_records(&fx, asset.id).await, 1);

    let history = fx.repo.custody_history(Some(asset.id), None, 50).await.unwrap();
    let superseded = history
        .iter()
        .find(|entry| entry.record.id == first.id)
        .unwrap();
    assert_eq!(
        superseded.record.returned_at,
        Some(fixed_now() + Duration::hours(1))
    );
    assert_eq!(superseded.record.notes.as_deref(), Some(SUPERSEDED_NOTE));

    service.return_item("QR-W-2", "QR-TW-001", None, None).await.unwrap();
    let stored = fx.repo.asset(asset.id).await.unwrap().unwrap();
    assert_eq!(stored.state, ItemState::Available);
}

#[tokio::test]
async fn override_of_a_calibration_suspension_returns_to_suspension() {
    let fx = Fixture::new().await;
    fx.worker("W-1", WorkerRole::Operator).await;
    fx.worker("SUP-1", WorkerRole::Supervisor).await;
    let asset = fx.asset("TW-001", Some(fixed_now() - Duration::days(2))).await;
    fx.engine().run_calibration_check().await.unwrap();
    let service = fx.service();

    service
        .override_checkout("QR-W-1", "QR-TW-001", "QR-SUP-1", "audit job", None)
        .await
        .unwrap();
    let stored = fx.repo.asset(asset.id).await.unwrap().unwrap();
    assert_eq!(stored.state, ItemState::OverrideCustody);
    assert_eq!(stored.suspension_cause, None);

    service.return_item("QR-W-1", "QR-TW-001", None, None).await.unwrap();
    let stored = fx.repo.asset(asset.id).await.unwrap().unwrap();
    assert_eq!(stored.state, ItemState::Suspended);
    assert_eq!(stored.suspension_cause, Some(SuspensionCause::Calibration));
    assert_eq!(stored.calibration_status, CalibrationStatus::Overdue);
}

#[tokio::test]
async fn kits_are_issued_for_eight_hours() {
    let fx = Fixture::new().await;
    fx.worker("W-1", WorkerRole::Operator).await;
    let kit = fx.kit("KIT-001").await;
    let service = fx.service();

    let record = service.checkout("QR-W-1", "QR-KIT-001", None, None).await.unwrap();
    assert_eq!(record.item.kit_id(), Some(kit.id));
    assert_eq!(record.expected_return_at, Some(fixed_now() + Duration::hours(8)));
    let stored = fx.repo.kit(kit.id).await.unwrap().unwrap();
    assert_eq!(stored.state, ItemState::InCustody);
}

#[tokio::test]
async fn scan_toggles_between_checkout_and_return() {
    let fx = Fixture::new().await;
    fx.worker("W-1", WorkerRole::Operator).await;
    fx.asset("TW-001", None).await;
    let service = fx.service();

    let first = service
        .resolve_by_scan("QR-W-1", "QR-TW-001", None, None, None)
        .await
        .unwrap();
    assert_eq!(first.action, ScanAction::Checkout);

    let second = service
        .resolve_by_scan("QR-W-1", "QR-TW-001", None, None, None)
        .await
        .unwrap();
    assert_eq!(second.action, ScanAction::Return);
    assert_eq!(second.record.id, first.record.id);
    assert!(second.record.returned_at.is_some());

    let err = service
        .resolve_by_scan("QR-W-1", "QR-TW-001", Some(ScanKind::Return), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CustodyError::Conflict(ConflictReason::NotHeld)));
}

#[tokio::test]
async fn checkout_records_the_origin_node() {
    let fx = Fixture::new().await;
    fx.worker("W-1", WorkerRole::Operator).await;
    fx.asset("TW-001", None).await;
    fx.asset("TW-002", None).await;
    let node = fx.edge_node("EDGE-001").await;
    let service = fx.service();

    let defaulted = service.checkout("QR-W-1", "QR-TW-001", None, None).await.unwrap();
    assert_eq!(defaulted.edge_node_id, Some(node.id));
    let unknown = service
        .checkout("QR-W-1", "QR-TW-002", Some("EDGE-404"), None)
        .await
        .unwrap();
    assert_eq!(unknown.edge_node_id, None);
}

#[tokio::test]
async fn manual_suspension_round_trip() {
    let fx = Fixture::new().await;
    fx.worker("W-1", WorkerRole::Operator).await;
    fx.worker("SUP-1", WorkerRole::Supervisor).await;
    let asset = fx.asset("TW-001", None).await;
    let service = fx.service();

    let err = service.suspend("QR-TW-001", "QR-W-1", None).await.unwrap_err();
    assert!(matches!(err, CustodyError::Forbidden { .. }));

    let item = service
        .suspend("QR-TW-001", "QR-SUP-1", Some("worn jaws"))
        .await
        .unwrap();
    assert_eq!(item.state(), ItemState::Suspended);
    assert_eq!(item.suspension_cause(), Some(SuspensionCause::Manual));

    let err = service
        .suspend("QR-TW-001", "QR-SUP-1", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CustodyError::Conflict(ConflictReason::Suspended(ItemKind::Asset))
    ));

    let item = service.reinstate("QR-TW-001", "QR-SUP-1").await.unwrap();
    assert_eq!(item.state(), ItemState::Available);
    assert_eq!(item.suspension_cause(), None);

    let err = service.reinstate("QR-TW-001", "QR-SUP-1").await.unwrap_err();
    assert!(matches!(
        err,
        CustodyError::Conflict(ConflictReason::NotSuspended)
    ));

    let entries = fx
        .repo
        .audit_entries(Some("asset"), Some(asset.id), 10)
        .await
        .unwrap();
    let kinds: Vec<&str> = entries.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(kinds, vec!["REINSTATE", "SUSPEND"]);
}

#[tokio::test]
async fn reinstate_is_refused_while_calibration_is_overdue() {
    let fx = Fixture::new().await;
    fx.worker("SUP-1", WorkerRole::Supervisor).await;
    fx.asset("TW-001", Some(fixed_now() - Duration::days(1))).await;
    fx.engine().run_calibration_check().await.unwrap();

    let err = fx
        .service()
        .reinstate("QR-TW-001", "QR-SUP-1")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CustodyError::Conflict(ConflictReason::CalibrationOverdue)
    ));
}

#[tokio::test]
async fn withdrawal_is_terminal() {
    let fx = Fixture::new().await;
    fx.worker("W-1", WorkerRole::Operator).await;
    fx.worker("SUP-1", WorkerRole::Supervisor).await;
    fx.asset("TW-001", None).await;
    fx.asset("TW-002", None).await;
    let service = fx.service();

    service.checkout("QR-W-1", "QR-TW-002", None, None).await.unwrap();
    let err = service
        .withdraw("QR-TW-002", "QR-SUP-1", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CustodyError::Conflict(ConflictReason::AlreadyHeld(ItemKind::Asset))
    ));

    let item = service
        .withdraw("QR-TW-001", "QR-SUP-1", Some("scrapped"))
        .await
        .unwrap();
    assert_eq!(item.state(), ItemState::Withdrawn);

    let err = service.reinstate("QR-TW-001", "QR-SUP-1").await.unwrap_err();
    assert!(matches!(err, CustodyError::Conflict(ConflictReason::Withdrawn)));
    let err = service
        .override_checkout("QR-W-1", "QR-TW-001", "QR-SUP-1", "need it", None)
        .await
        .unwrap_err();
    assert!(matches!(err, CustodyError::Conflict(ConflictReason::Withdrawn)));
}

#[tokio::test]
async fn checkout_and_return_are_audited() {
    let fx = Fixture::new().await;
    let worker = fx.worker("W-1", WorkerRole::Operator).await;
    let asset = fx.asset("TW-001", None).await;
    let service = fx.service();

    service.checkout("QR-W-1", "QR-TW-001", None, None).await.unwrap();
    fx.clock.advance(Duration::minutes(30));
    service.return_item("QR-W-1", "QR-TW-001", None, None).await.unwrap();

    let entries = fx
        .repo
        .audit_entries(Some("asset"), Some(asset.id), 10)
        .await
        .unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].event_type, "RETURN");
    assert_eq!(entries[1].event_type, "CHECKOUT");
    assert_eq!(entries[1].changed_by, Some(worker.id));
    assert_eq!(
        entries[1].new_state.as_ref().unwrap()["state"],
        serde_json::json!("IN_CUSTODY")
    );
}
