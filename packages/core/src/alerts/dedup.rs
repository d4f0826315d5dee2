//! At most one OPEN alert per (kind, subject).
//!
//! Both evaluators raise alerts through [`ensure_open_alert`]. The partial
//! unique index on `alerts(alert_type, subject_key) WHERE status = 'OPEN'`
//! backs the check, so a racing writer gets a no-op insert rather than a
//! second open alert.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::error::StoreError;
use crate::repository::{alerts, NewAlert};

/// Raise `alert` unless an OPEN alert with the same kind and subject exists.
///
/// An existing alert is left untouched: its severity, title and message are
/// not refreshed. Returns whether a new alert was written.
pub async fn ensure_open_alert(
    conn: &mut SqliteConnection,
    alert: &NewAlert,
    now: DateTime<Utc>,
) -> Result<bool, StoreError> {
    if alerts::find_open_alert_id(conn, alert.kind, &alert.subject_key)
        .await?
        .is_some()
    {
        return Ok(false);
    }
    let created = alerts::insert_open_alert(conn, alert, now).await?;
    if created {
        tracing::debug!(
            "Raised {} {} alert for {}",
            alert.severity,
            alert.kind,
            alert.subject_key
        );
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AlertKind, AlertSeverity, AlertStatus};
    use crate::testing::{fixed_now, Fixture};

    fn overdue_alert(subject: &str, severity: AlertSeverity, title: &str) -> NewAlert {
        NewAlert {
            kind: AlertKind::OverdueReturn,
            severity,
            subject_key: subject.to_string(),
            asset_id: None,
            kit_id: None,
            custody_record_id: None,
            worker_id: None,
            title: title.to_string(),
            message: "late".to_string(),
        }
    }

    #[tokio::test]
    async fn second_raise_is_a_no_op_and_does_not_refresh() {
        let fx = Fixture::new().await;
        let mut conn = fx.repo.pool().acquire().await.unwrap();

        let first = overdue_alert("rec-1", AlertSeverity::Warning, "first");
        let second = overdue_alert("rec-1", AlertSeverity::Critical, "second");
        assert!(ensure_open_alert(&mut conn, &first, fixed_now()).await.unwrap());
        assert!(!ensure_open_alert(&mut conn, &second, fixed_now()).await.unwrap());

        let open = alerts::list_alerts(&mut conn, Some(AlertStatus::Open), None, 10)
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].title, "first");
        assert_eq!(open[0].severity, AlertSeverity::Warning);
    }

    #[tokio::test]
    async fn different_subjects_and_kinds_are_independent() {
        let fx = Fixture::new().await;
        let mut conn = fx.repo.pool().acquire().await.unwrap();

        let a = overdue_alert("rec-1", AlertSeverity::Warning, "a");
        let b = overdue_alert("rec-2", AlertSeverity::Warning, "b");
        let mut c = overdue_alert("rec-1", AlertSeverity::Warning, "c");
        c.kind = AlertKind::CheckoutAnomaly;

        assert!(ensure_open_alert(&mut conn, &a, fixed_now()).await.unwrap());
        assert!(ensure_open_alert(&mut conn, &b, fixed_now()).await.unwrap());
        assert!(ensure_open_alert(&mut conn, &c, fixed_now()).await.unwrap());
    }

    #[tokio::test]
    async fn acknowledged_alert_does_not_block_a_new_one() {
        let fx = Fixture::new().await;
        let mut conn = fx.repo.pool().acquire().await.unwrap();

        let alert = overdue_alert("rec-9", AlertSeverity::Warning, "x");
        assert!(ensure_open_alert(&mut conn, &alert, fixed_now()).await.unwrap());
        let id = alerts::find_open_alert_id(&mut conn, alert.kind, "rec-9")
            .await
            .unwrap()
            .unwrap();
        assert!(alerts::acknowledge(&mut conn, id, None, fixed_now()).await.unwrap());

        assert!(ensure_open_alert(&mut conn, &alert, fixed_now()).await.unwrap());
    }
}
