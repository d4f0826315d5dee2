//! Calibration pass and calibration recording.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::{CalibrationSummary, RulesConfig, RulesEngine};
use crate::alerts::ensure_open_alert;
use crate::error::{CustodyError, CustodyResult, Missing, StoreError};
use crate::model::{
    AlertKind, AlertSeverity, Asset, CalibrationRecord, CalibrationStatus, CustodyEventType,
    ItemRef, ItemState, SuspensionCause,
};
use crate::repository::{alerts, audit, calibration, items, people, NewAlert, NewAuditEntry};

/// Note written on calibration alerts closed by a new calibration.
pub const CALIBRATION_RECORDED_NOTE: &str = "Calibration recorded";

/// Where a due date sits relative to now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Past due.
    Expired,
    /// Inside the alert window.
    DueSoonAlert,
    /// Inside the early-warning window but not yet the alert window.
    DueSoon,
    Valid,
}

impl Classification {
    pub fn status(&self) -> CalibrationStatus {
        match self {
            Classification::Expired => CalibrationStatus::Overdue,
            Classification::DueSoonAlert | Classification::DueSoon => CalibrationStatus::DueSoon,
            Classification::Valid => CalibrationStatus::Valid,
        }
    }
}

pub fn classify(due: DateTime<Utc>, now: DateTime<Utc>, config: &RulesConfig) -> Classification {
    if now > due {
        Classification::Expired
    } else if now > due - Duration::days(config.due_soon_alert_days) {
        Classification::DueSoonAlert
    } else if now > due - Duration::days(config.early_warning_days) {
        Classification::DueSoon
    } else {
        Classification::Valid
    }
}

/// A completed calibration to record against an asset.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordCalibration {
    pub calibrated_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub calibrated_by: Option<String>,
    pub certificate_number: Option<String>,
    pub result: Option<String>,
    pub notes: Option<String>,
    pub recorded_by: Option<Uuid>,
}

#[derive(Debug, Default)]
struct AssetOutcome {
    status_changed: bool,
    suspended: bool,
    alert_created: bool,
}

impl RulesEngine {
    /// Refresh calibration status on every calibrated asset, suspend
    /// expired assets on the shelf and raise expiry and due-soon alerts.
    pub async fn run_calibration_check(&self) -> Result<CalibrationSummary, StoreError> {
        let now = self.clock.now();
        let ids: Vec<Uuid> = {
            let mut conn = self.repo.pool().acquire().await?;
            items::list_calibrated_assets(&mut conn)
                .await?
                .into_iter()
                .map(|asset| asset.id)
                .collect()
        };

        let mut summary = CalibrationSummary {
            assets_checked: ids.len(),
            ..CalibrationSummary::default()
        };
        for id in ids {
            let outcome = self.evaluate_asset(id, now).await?;
            summary.statuses_updated += usize::from(outcome.status_changed);
            summary.assets_suspended += usize::from(outcome.suspended);
            summary.alerts_created += usize::from(outcome.alert_created);
        }

        if summary.statuses_updated > 0 || summary.alerts_created > 0 {
            tracing::info!(
                "Calibration check: {} assets, {} status changes, {} suspended, {} alerts",
                summary.assets_checked,
                summary.statuses_updated,
                summary.assets_suspended,
                summary.alerts_created
            );
        } else {
            tracing::debug!(
                "Calibration check: {} assets, nothing new",
                summary.assets_checked
            );
        }
        Ok(summary)
    }

    async fn evaluate_asset(
        &self,
        asset_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<AssetOutcome, StoreError> {
        let mut tx = self.repo.begin().await?;
        let asset = match items::fetch_asset(&mut tx, asset_id).await? {
            Some(asset) if asset.is_active => asset,
            _ => return Ok(AssetOutcome::default()),
        };
        let Some(due) = asset.calibration_due_at else {
            return Ok(AssetOutcome::default());
        };

        let class = classify(due, now, &self.config);
        let status = class.status();
        let mut outcome = AssetOutcome::default();

        if status != asset.calibration_status {
            items::set_calibration_status(&mut tx, asset.id, status, now).await?;
            outcome.status_changed = true;
        }

        let alert = match class {
            Classification::Expired => {
                if asset.state == ItemState::Available {
                    outcome.suspended = suspend_for_calibration(&mut tx, &asset, now).await?;
                }
                Some(expired_alert(&asset, due))
            }
            Classification::DueSoonAlert => Some(due_soon_alert(&asset, due, now)),
            Classification::DueSoon | Classification::Valid => None,
        };
        if let Some(alert) = alert {
            outcome.alert_created = ensure_open_alert(&mut tx, &alert, now).await?;
        }
        tx.commit().await?;

        if outcome.status_changed {
            tracing::info!(
                "{} calibration {} -> {}",
                asset.asset_code,
                asset.calibration_status,
                status
            );
        }
        Ok(outcome)
    }

    /// Record a completed calibration and refresh the asset to match.
    ///
    /// A calibration suspension is lifted when the new status is not
    /// OVERDUE; a manual suspension is left alone. Open CALIBRATION_EXPIRED
    /// and CALIBRATION_DUE_SOON alerts on the asset are resolved.
    pub async fn record_calibration(
        &self,
        asset_id: Uuid,
        input: RecordCalibration,
    ) -> CustodyResult<CalibrationRecord> {
        let now = self.clock.now();
        let mut tx = self.repo.begin().await?;

        let asset = items::fetch_asset(&mut tx, asset_id)
            .await?
            .ok_or_else(|| CustodyError::NotFound(Missing::Asset(asset_id.to_string())))?;
        if let Some(worker_id) = input.recorded_by {
            if people::fetch_worker(&mut tx, worker_id).await?.is_none() {
                return Err(CustodyError::NotFound(Missing::Worker(worker_id.to_string())));
            }
        }

        let record = CalibrationRecord {
            id: Uuid::new_v4(),
            asset_id,
            calibrated_at: input.calibrated_at,
            calibrated_by: input.calibrated_by,
            certificate_number: input.certificate_number,
            valid_until: input.valid_until,
            result: input.result,
            notes: input.notes,
            recorded_by: input.recorded_by,
            created_at: now,
        };
        calibration::insert_record(&mut tx, &record).await?;

        let status = classify(record.valid_until, now, &self.config).status();
        items::update_calibration_cache(
            &mut tx,
            asset_id,
            record.calibrated_at,
            record.valid_until,
            record.certificate_number.as_deref(),
            status,
            now,
        )
        .await?;

        let item = ItemRef::asset(asset_id);
        let mut state = asset.state;
        if asset.state == ItemState::Suspended
            && asset.suspension_cause == Some(SuspensionCause::Calibration)
            && status != CalibrationStatus::Overdue
        {
            if items::compare_and_set_state(
                &mut tx,
                item,
                ItemState::Suspended,
                ItemState::Available,
                None,
                now,
            )
            .await?
            {
                state = ItemState::Available;
            }
        } else if asset.state == ItemState::Available && status == CalibrationStatus::Overdue {
            if items::compare_and_set_state(
                &mut tx,
                item,
                ItemState::Available,
                ItemState::Suspended,
                Some(SuspensionCause::Calibration),
                now,
            )
            .await?
            {
                state = ItemState::Suspended;
            }
        }

        let resolved = alerts::resolve_open_for_asset(
            &mut tx,
            asset_id,
            &[AlertKind::CalibrationExpired, AlertKind::CalibrationDueSoon],
            record.recorded_by,
            CALIBRATION_RECORDED_NOTE,
            now,
        )
        .await?;

        audit::append(
            &mut tx,
            &NewAuditEntry {
                entity_type: "asset",
                entity_id: asset_id,
                event_type: CustodyEventType::CalibrationUpdated,
                old_state: Some(json!({
                    "state": asset.state,
                    "calibration_status": asset.calibration_status,
                    "calibration_due_at": asset.calibration_due_at,
                })),
                new_state: Some(json!({
                    "state": state,
                    "calibration_status": status,
                    "calibration_due_at": record.valid_until,
                    "certificate_number": record.certificate_number,
                })),
                changed_by: record.recorded_by,
                edge_node_id: None,
                notes: record.notes.clone(),
            },
            now,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            "Calibration recorded for {}: {} until {} ({} alerts resolved)",
            asset.asset_code,
            status,
            record.valid_until,
            resolved
        );
        Ok(record)
    }
}

async fn suspend_for_calibration(
    conn: &mut sqlx::SqliteConnection,
    asset: &Asset,
    now: DateTime<Utc>,
) -> Result<bool, StoreError> {
    let cause = SuspensionCause::Calibration;
    if !items::compare_and_set_state(
        conn,
        ItemRef::asset(asset.id),
        ItemState::Available,
        ItemState::Suspended,
        Some(cause),
        now,
    )
    .await?
    {
        return Ok(false);
    }
    audit::append(
        conn,
        &NewAuditEntry {
            entity_type: "asset",
            entity_id: asset.id,
            event_type: CustodyEventType::Suspend,
            old_state: Some(json!({ "state": ItemState::Available })),
            new_state: Some(json!({ "state": ItemState::Suspended, "cause": cause })),
            changed_by: None,
            edge_node_id: None,
            notes: Some("Calibration expired".to_string()),
        },
        now,
    )
    .await?;
    tracing::warn!("{} suspended: calibration expired", asset.asset_code);
    Ok(true)
}

fn expired_alert(asset: &Asset, due: DateTime<Utc>) -> NewAlert {
    NewAlert {
        kind: AlertKind::CalibrationExpired,
        severity: AlertSeverity::Critical,
        subject_key: asset.id.to_string(),
        asset_id: Some(asset.id),
        kit_id: None,
        custody_record_id: None,
        worker_id: None,
        title: format!("CRITICAL: {} calibration expired", asset.name),
        message: format!(
            "{} ({}) calibration expired on {}. Asset SUSPENDED. Schedule recalibration immediately.",
            asset.asset_code,
            asset.name,
            due.date_naive()
        ),
    }
}

fn due_soon_alert(asset: &Asset, due: DateTime<Utc>, now: DateTime<Utc>) -> NewAlert {
    let days = (due - now).num_days();
    NewAlert {
        kind: AlertKind::CalibrationDueSoon,
        severity: AlertSeverity::Warning,
        subject_key: asset.id.to_string(),
        asset_id: Some(asset.id),
        kit_id: None,
        custody_record_id: None,
        worker_id: None,
        title: format!("WARNING: {} calibration due in {} days", asset.name, days),
        message: format!(
            "{} ({}) is due for calibration in {} days (due {}). Schedule with NABL lab.",
            asset.asset_code,
            asset.name,
            days,
            due.date_naive()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AlertStatus, WorkerRole};
    use crate::testing::{fixed_now, Fixture};
    use proptest::prelude::*;

    #[test]
    fn classify_bands() {
        let config = RulesConfig::default();
        let now = fixed_now();
        assert_eq!(
            classify(now - Duration::seconds(1), now, &config),
            Classification::Expired
        );
        assert_eq!(classify(now, now, &config), Classification::DueSoonAlert);
        assert_eq!(
            classify(now + Duration::days(5), now, &config),
            Classification::DueSoonAlert
        );
        assert_eq!(
            classify(now + Duration::days(7), now, &config),
            Classification::DueSoon
        );
        assert_eq!(
            classify(now + Duration::days(20), now, &config),
            Classification::DueSoon
        );
        assert_eq!(
            classify(now + Duration::days(30), now, &config),
            Classification::Valid
        );
        assert_eq!(
            classify(now + Duration::days(90), now, &config),
            Classification::Valid
        );
    }

    proptest! {
        #[test]
        fn status_never_improves_as_time_passes(
            due_offset_hours in -2_000i64..2_000,
            step_hours in 0i64..2_000,
        ) {
            let config = RulesConfig::default();
            let now = fixed_now();
            let due = now + Duration::hours(due_offset_hours);
            let rank = |c: Classification| match c {
                Classification::Valid => 0,
                Classification::DueSoon => 1,
                Classification::DueSoonAlert => 2,
                Classification::Expired => 3,
            };
            let before = classify(due, now, &config);
            let after = classify(due, now + Duration::hours(step_hours), &config);
            prop_assert!(rank(after) >= rank(before));
        }
    }

    #[tokio::test]
    async fn expired_asset_on_the_shelf_is_suspended_once() {
        let fx = Fixture::new().await;
        let asset = fx.asset("TW-001", Some(fixed_now() - Duration::days(1))).await;
        let engine = fx.engine();

        let first = engine.run_calibration_check().await.unwrap();
        assert_eq!(
            first,
            CalibrationSummary {
                assets_checked: 1,
                statuses_updated: 1,
                assets_suspended: 1,
                alerts_created: 1,
            }
        );

        let stored = fx.repo.asset(asset.id).await.unwrap().unwrap();
        assert_eq!(stored.state, ItemState::Suspended);
        assert_eq!(stored.suspension_cause, Some(SuspensionCause::Calibration));
        assert_eq!(stored.calibration_status, CalibrationStatus::Overdue);

        let open = fx
            .repo
            .list_alerts(Some(AlertStatus::Open), None, 10)
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].kind, AlertKind::CalibrationExpired);
        assert_eq!(open[0].severity, AlertSeverity::Critical);
        assert_eq!(open[0].title, "CRITICAL: Torque Wrench TW-001 calibration expired");

        let second = engine.run_calibration_check().await.unwrap();
        assert_eq!(
            second,
            CalibrationSummary {
                assets_checked: 1,
                ..CalibrationSummary::default()
            }
        );
        let again = fx.repo.asset(asset.id).await.unwrap().unwrap();
        assert_eq!(again.updated_at, stored.updated_at);
    }

    #[tokio::test]
    async fn expired_asset_in_custody_stays_with_the_worker() {
        let fx = Fixture::new().await;
        fx.worker("W-1", WorkerRole::Operator).await;
        let asset = fx.asset("TW-001", Some(fixed_now() + Duration::hours(2))).await;
        let service = fx.service();
        service.checkout("QR-W-1", "QR-TW-001", None, None).await.unwrap();

        fx.clock.advance(Duration::hours(3));
        let summary = fx.engine().run_calibration_check().await.unwrap();
        assert_eq!(summary.assets_suspended, 0);
        assert_eq!(summary.alerts_created, 1);

        let stored = fx.repo.asset(asset.id).await.unwrap().unwrap();
        assert_eq!(stored.state, ItemState::InCustody);
        assert_eq!(stored.calibration_status, CalibrationStatus::Overdue);

        service.return_item("QR-W-1", "QR-TW-001", None, None).await.unwrap();
        let stored = fx.repo.asset(asset.id).await.unwrap().unwrap();
        assert_eq!(stored.state, ItemState::Suspended);
        assert_eq!(stored.suspension_cause, Some(SuspensionCause::Calibration));
    }

    #[tokio::test]
    async fn due_soon_window_alerts_inside_a_week_only() {
        let fx = Fixture::new().await;
        let near = fx.asset("TW-001", Some(fixed_now() + Duration::days(5))).await;
        let far = fx.asset("TW-002", Some(fixed_now() + Duration::days(20))).await;
        let valid = fx.asset("TW-003", Some(fixed_now() + Duration::days(60))).await;

        let summary = fx.engine().run_calibration_check().await.unwrap();
        assert_eq!(summary.assets_checked, 3);
        assert_eq!(summary.statuses_updated, 3);
        assert_eq!(summary.alerts_created, 1);

        let near = fx.repo.asset(near.id).await.unwrap().unwrap();
        let far = fx.repo.asset(far.id).await.unwrap().unwrap();
        let valid = fx.repo.asset(valid.id).await.unwrap().unwrap();
        assert_eq!(near.calibration_status, CalibrationStatus::DueSoon);
        assert_eq!(far.calibration_status, CalibrationStatus::DueSoon);
        assert_eq!(valid.calibration_status, CalibrationStatus::Valid);
        assert_eq!(near.state, ItemState::Available);

        let open = fx
            .repo
            .list_alerts(Some(AlertStatus::Open), None, 10)
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].kind, AlertKind::CalibrationDueSoon);
        assert_eq!(open[0].asset_id, Some(near.id));
        assert_eq!(
            open[0].title,
            "WARNING: Torque Wrench TW-001 calibration due in 5 days"
        );
    }

    #[tokio::test]
    async fn recording_a_calibration_lifts_the_suspension() {
        let fx = Fixture::new().await;
        let inspector = fx.worker("QA-1", WorkerRole::Supervisor).await;
        let asset = fx.asset("TW-001", Some(fixed_now() - Duration::days(1))).await;
        let engine = fx.engine();
        engine.run_calibration_check().await.unwrap();

        let record = engine
            .record_calibration(
                asset.id,
                RecordCalibration {
                    calibrated_at: fixed_now(),
                    valid_until: fixed_now() + Duration::days(365),
                    calibrated_by: Some("Metrology Lab".into()),
                    certificate_number: Some("CERT-2024-118".into()),
                    result: Some("PASS".into()),
                    notes: None,
                    recorded_by: Some(inspector.id),
                },
            )
            .await
            .unwrap();

        let stored = fx.repo.asset(asset.id).await.unwrap().unwrap();
        assert_eq!(stored.state, ItemState::Available);
        assert_eq!(stored.suspension_cause, None);
        assert_eq!(stored.calibration_status, CalibrationStatus::Valid);
        assert_eq!(stored.calibration_due_at, Some(fixed_now() + Duration::days(365)));
        assert_eq!(stored.calibration_certificate.as_deref(), Some("CERT-2024-118"));

        let open = fx
            .repo
            .list_alerts(Some(AlertStatus::Open), None, 10)
            .await
            .unwrap();
        assert!(open.is_empty());
        let resolved = fx
            .repo
            .list_alerts(Some(AlertStatus::Resolved), None, 10)
            .await
            .unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].resolved_by, Some(inspector.id));

        let history = fx.repo.calibration_history(asset.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, record.id);
    }

    #[tokio::test]
    async fn manual_suspension_survives_a_new_calibration() {
        let fx = Fixture::new().await;
        fx.worker("SUP-1", WorkerRole::Supervisor).await;
        let asset = fx.asset("TW-001", Some(fixed_now() + Duration::days(90))).await;
        fx.service()
            .suspend("QR-TW-001", "QR-SUP-1", Some("bent handle"))
            .await
            .unwrap();

        fx.engine()
            .record_calibration(
                asset.id,
                RecordCalibration {
                    calibrated_at: fixed_now(),
                    valid_until: fixed_now() + Duration::days(365),
                    calibrated_by: None,
                    certificate_number: None,
                    result: None,
                    notes: None,
                    recorded_by: None,
                },
            )
            .await
            .unwrap();

        let stored = fx.repo.asset(asset.id).await.unwrap().unwrap();
        assert_eq!(stored.state, ItemState::Suspended);
        assert_eq!(stored.suspension_cause, Some(SuspensionCause::Manual));
        assert_eq!(stored.calibration_status, CalibrationStatus::Valid);
    }

    #[tokio::test]
    async fn recording_against_an_unknown_asset_is_not_found() {
        let fx = Fixture::new().await;
        let err = fx
            .engine()
            .record_calibration(
                Uuid::new_v4(),
                RecordCalibration {
                    calibrated_at: fixed_now(),
                    valid_until: fixed_now() + Duration::days(365),
                    calibrated_by: None,
                    certificate_number: None,
                    result: None,
                    notes: None,
                    recorded_by: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CustodyError::NotFound(Missing::Asset(_))));
    }
}
