//! Overdue pass over open custody records.

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use super::{OverdueSummary, RulesConfig, RulesEngine};
use crate::alerts::ensure_open_alert;
use crate::custody::machine;
use crate::error::StoreError;
use crate::model::{
    AlertKind, AlertSeverity, CustodialItem, CustodyEventType, CustodyRecord,
};
use crate::repository::{audit, custody, items, NewAlert, NewAuditEntry};

#[derive(Debug, Default)]
struct RecordOutcome {
    newly_flagged: bool,
    alert_created: bool,
}

impl RulesEngine {
    /// Flag every open record past its deadline, escalate held items to
    /// OVERDUE and raise one OVERDUE_RETURN alert per record.
    ///
    /// Re-running at the same instant writes nothing new apart from the
    /// refreshed hour count on each flagged record.
    pub async fn run_overdue_check(&self) -> Result<OverdueSummary, StoreError> {
        let now = self.clock.now();
        let ids = {
            let mut conn = self.repo.pool().acquire().await?;
            custody::list_open_record_ids_with_deadline(&mut conn).await?
        };

        let mut summary = OverdueSummary {
            overdue_records_processed: ids.len(),
            ..OverdueSummary::default()
        };
        for id in ids {
            let outcome = self.evaluate_record(id, now).await?;
            if outcome.newly_flagged {
                summary.records_flagged += 1;
            }
            if outcome.alert_created {
                summary.alerts_created += 1;
            }
        }

        if summary.records_flagged > 0 || summary.alerts_created > 0 {
            tracing::info!(
                "Overdue check: {} open records, {} newly flagged, {} alerts raised",
                summary.overdue_records_processed,
                summary.records_flagged,
                summary.alerts_created
            );
        } else {
            tracing::debug!(
                "Overdue check: {} open records, nothing new",
                summary.overdue_records_processed
            );
        }
        Ok(summary)
    }

    async fn evaluate_record(
        &self,
        record_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<RecordOutcome, StoreError> {
        let mut tx = self.repo.begin().await?;

        let record = match custody::fetch_record(&mut tx, record_id).await? {
            Some(record) if record.returned_at.is_none() => record,
            // Returned since the pass started.
            _ => return Ok(RecordOutcome::default()),
        };
        let Some(hours) = record
            .expected_return_at
            .and_then(|deadline| machine::lateness_hours(deadline, now))
        else {
            return Ok(RecordOutcome::default());
        };

        let mut outcome = RecordOutcome {
            newly_flagged: !record.is_overdue,
            alert_created: false,
        };
        custody::mark_overdue(&mut tx, record.id, now, hours).await?;

        let Some(item) = items::fetch_item(&mut tx, record.item).await? else {
            tracing::warn!(
                record_id = %record.id,
                "Open record points at a missing {}",
                record.item.kind
            );
            tx.commit().await?;
            return Ok(outcome);
        };

        let from = item.state();
        if let Some(to) = machine::overdue_escalation(from) {
            if !items::compare_and_set_state(&mut tx, record.item, from, to, None, now).await? {
                tracing::warn!(
                    record_id = %record.id,
                    "{} changed state during overdue check",
                    item.display_code()
                );
            }
        }

        if outcome.newly_flagged {
            audit::append(
                &mut tx,
                &NewAuditEntry {
                    entity_type: item.kind().entity_type(),
                    entity_id: item.id(),
                    event_type: CustodyEventType::OverdueFlagged,
                    old_state: Some(json!({ "state": from })),
                    new_state: Some(json!({
                        "state": machine::overdue_escalation(from).unwrap_or(from),
                        "custody_record_id": record.id,
                        "overdue_hours": hours,
                    })),
                    changed_by: None,
                    edge_node_id: record.edge_node_id,
                    notes: None,
                },
                now,
            )
            .await?;
        }

        let alert = overdue_alert(&record, &item, hours, &self.config);
        outcome.alert_created = ensure_open_alert(&mut tx, &alert, now).await?;
        tx.commit().await?;

        if outcome.newly_flagged {
            tracing::warn!(
                record_id = %record.id,
                "{} overdue by {:.1}h",
                item.display_code(),
                hours
            );
        }
        Ok(outcome)
    }
}

/// Severity for a record `hours` past its deadline.
pub fn overdue_severity(hours: f64, config: &RulesConfig) -> AlertSeverity {
    if hours >= config.critical_overdue_hours {
        AlertSeverity::Critical
    } else {
        AlertSeverity::Warning
    }
}

fn overdue_alert(
    record: &CustodyRecord,
    item: &CustodialItem,
    hours: f64,
    config: &RulesConfig,
) -> NewAlert {
    let severity = overdue_severity(hours, config);
    NewAlert {
        kind: AlertKind::OverdueReturn,
        severity,
        subject_key: record.id.to_string(),
        asset_id: record.item.asset_id(),
        kit_id: record.item.kit_id(),
        custody_record_id: Some(record.id),
        worker_id: Some(record.worker_id),
        title: format!("{}: {} overdue by {:.1}h", severity, item.name(), hours),
        message: format!(
            "{} '{}' was expected back {:.1} hours ago. Worker ID: {}. Please follow up immediately.",
            item.kind(),
            item.display_code(),
            hours,
            record.worker_id
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::model::{AlertStatus, ItemState, WorkerRole};
    use crate::testing::{fixed_now, Fixture};

    #[test]
    fn severity_turns_critical_at_threshold() {
        let config = RulesConfig::default();
        assert_eq!(overdue_severity(0.5, &config), AlertSeverity::Warning);
        assert_eq!(overdue_severity(7.99, &config), AlertSeverity::Warning);
        assert_eq!(overdue_severity(8.0, &config), AlertSeverity::Critical);
        assert_eq!(overdue_severity(30.0, &config), AlertSeverity::Critical);
    }

    #[tokio::test]
    async fn nothing_happens_before_the_deadline() {
        let fx = Fixture::new().await;
        fx.worker("W-1", WorkerRole::Operator).await;
        fx.asset("TW-001", None).await;
        let service = fx.service();
        service.checkout("QR-W-1", "QR-TW-001", None, None).await.unwrap();

        fx.clock.advance(Duration::hours(7));
        let summary = fx.engine().run_overdue_check().await.unwrap();
        assert_eq!(summary.overdue_records_processed, 1);
        assert_eq!(summary.records_flagged, 0);
        assert_eq!(summary.alerts_created, 0);
    }

    #[tokio::test]
    async fn one_hour_late_raises_a_warning_once() {
        let fx = Fixture::new().await;
        let worker = fx.worker("W-1", WorkerRole::Operator).await;
        let asset = fx.asset("TW-001", None).await;
        let service = fx.service();
        let record = service.checkout("QR-W-1", "QR-TW-001", None, None).await.unwrap();

        fx.clock.advance(Duration::hours(9));
        let engine = fx.engine();
        let first = engine.run_overdue_check().await.unwrap();
        assert_eq!(first.records_flagged, 1);
        assert_eq!(first.alerts_created, 1);

        let asset = fx.repo.asset(asset.id).await.unwrap().unwrap();
        assert_eq!(asset.state, ItemState::Overdue);

        let open = fx
            .repo
            .list_alerts(Some(AlertStatus::Open), None, 10)
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].kind, AlertKind::OverdueReturn);
        assert_eq!(open[0].severity, AlertSeverity::Warning);
        assert_eq!(open[0].subject_key, record.id.to_string());
        assert_eq!(open[0].worker_id, Some(worker.id));
        assert_eq!(open[0].title, "WARNING: Torque Wrench TW-001 overdue by 1.0h");

        let mut conn = fx.repo.pool().acquire().await.unwrap();
        let stored = custody::fetch_record(&mut conn, record.id).await.unwrap().unwrap();
        drop(conn);
        assert!(stored.is_overdue);
        assert_eq!(stored.overdue_flagged_at, Some(fixed_now() + Duration::hours(9)));
        assert_eq!(stored.overdue_hours, Some(1.0));

        let second = engine.run_overdue_check().await.unwrap();
        assert_eq!(second.records_flagged, 0);
        assert_eq!(second.alerts_created, 0);
        let open = fx
            .repo
            .list_alerts(Some(AlertStatus::Open), None, 10)
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
    }

    #[tokio::test]
    async fn seconds_past_the_deadline_is_flagged() {
        let fx = Fixture::new().await;
        fx.worker("W-1", WorkerRole::Operator).await;
        let asset = fx.asset("TW-001", None).await;
        let service = fx.service();
        let record = service.checkout("QR-W-1", "QR-TW-001", None, None).await.unwrap();

        fx.clock.advance(Duration::hours(8) + Duration::seconds(10));
        let summary = fx.engine().run_overdue_check().await.unwrap();
        assert_eq!(summary.records_flagged, 1);
        assert_eq!(summary.alerts_created, 1);

        let mut conn = fx.repo.pool().acquire().await.unwrap();
        let stored = custody::fetch_record(&mut conn, record.id).await.unwrap().unwrap();
        drop(conn);
        assert!(stored.is_overdue);
        assert_eq!(stored.overdue_hours, Some(0.0));

        let asset = fx.repo.asset(asset.id).await.unwrap().unwrap();
        assert_eq!(asset.state, ItemState::Overdue);
        let open = fx
            .repo
            .list_alerts(Some(AlertStatus::Open), None, 10)
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].severity, AlertSeverity::Warning);
        assert_eq!(open[0].title, "WARNING: Torque Wrench TW-001 overdue by 0.0h");
    }

    #[tokio::test]
    async fn twelve_hours_late_is_critical() {
        let fx = Fixture::new().await;
        fx.worker("W-1", WorkerRole::Operator).await;
        fx.asset("TW-001", None).await;
        let service = fx.service();
        service.checkout("QR-W-1", "QR-TW-001", None, None).await.unwrap();

        fx.clock.advance(Duration::hours(20));
        let engine = fx.engine();
        engine.run_overdue_check().await.unwrap();
        engine.run_overdue_check().await.unwrap();

        let open = fx
            .repo
            .list_alerts(Some(AlertStatus::Open), None, 10)
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].severity, AlertSeverity::Critical);
        assert!(open[0].title.contains("overdue by 12.0h"));
    }

    #[tokio::test]
    async fn later_passes_refresh_hours_but_keep_first_flag_time() {
        let fx = Fixture::new().await;
        fx.worker("W-1", WorkerRole::Operator).await;
        fx.asset("TW-001", None).await;
        let service = fx.service();
        let record = service.checkout("QR-W-1", "QR-TW-001", None, None).await.unwrap();
        let engine = fx.engine();

        fx.clock.advance(Duration::hours(9));
        engine.run_overdue_check().await.unwrap();
        fx.clock.advance(Duration::hours(2));
        engine.run_overdue_check().await.unwrap();

        let mut conn = fx.repo.pool().acquire().await.unwrap();
        let stored = custody::fetch_record(&mut conn, record.id).await.unwrap().unwrap();
        assert_eq!(stored.overdue_flagged_at, Some(fixed_now() + Duration::hours(9)));
        assert_eq!(stored.overdue_hours, Some(3.0));
    }

    #[tokio::test]
    async fn override_custody_is_flagged_but_not_escalated() {
        let fx = Fixture::new().await;
        fx.worker("W-1", WorkerRole::Operator).await;
        fx.worker("SUP-1", WorkerRole::Supervisor).await;
        let asset = fx.asset("TW-001", None).await;
        let service = fx.service();
        service
            .override_checkout("QR-W-1", "QR-TW-001", "QR-SUP-1", "line down", None)
            .await
            .unwrap();

        fx.clock.advance(Duration::hours(10));
        let summary = fx.engine().run_overdue_check().await.unwrap();
        assert_eq!(summary.records_flagged, 1);
        assert_eq!(summary.alerts_created, 1);

        let asset = fx.repo.asset(asset.id).await.unwrap().unwrap();
        assert_eq!(asset.state, ItemState::OverrideCustody);
    }

    #[tokio::test]
    async fn overdue_kit_alert_names_the_kit() {
        let fx = Fixture::new().await;
        fx.worker("W-1", WorkerRole::Operator).await;
        let kit = fx.kit("KIT-001").await;
        let service = fx.service();
        service.checkout("QR-W-1", "QR-KIT-001", None, None).await.unwrap();

        fx.clock.advance(Duration::hours(9));
        fx.engine().run_overdue_check().await.unwrap();

        let kit = fx.repo.kit(kit.id).await.unwrap().unwrap();
        assert_eq!(kit.state, ItemState::Overdue);
        let open = fx
            .repo
            .list_alerts(Some(AlertStatus::Open), None, 10)
            .await
            .unwrap();
        assert_eq!(open[0].kit_id, Some(kit.id));
        assert_eq!(open[0].asset_id, None);
        assert!(open[0].message.starts_with("Kit 'KIT-001'"));
    }
}
