//! Aggregate counts for the dashboard header.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;

use super::rows::ts;
use crate::error::StoreError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub total_assets: i64,
    pub available: i64,
    /// Includes override custody.
    pub in_custody: i64,
    pub overdue: i64,
    pub suspended: i64,
    pub withdrawn: i64,
    pub total_kits: i64,
    pub kits_in_custody: i64,
    pub open_alerts: i64,
    pub critical_alerts: i64,
    pub calibration_overdue: i64,
    pub calibration_due_soon: i64,
    pub active_workers_today: i64,
}

/// Counts over active assets, kits, alerts and today's checkouts.
///
/// "Today" starts at midnight UTC of `now`.
pub async fn summary(
    conn: &mut SqliteConnection,
    now: DateTime<Utc>,
) -> Result<DashboardSummary, StoreError> {
    let (
        total_assets,
        available,
        in_custody,
        overdue,
        suspended,
        withdrawn,
        calibration_overdue,
        calibration_due_soon,
    ): (i64, i64, i64, i64, i64, i64, i64, i64) = sqlx::query_as(
        "SELECT
            COUNT(*),
            COALESCE(SUM(state = 'AVAILABLE'), 0),
            COALESCE(SUM(state IN ('IN_CUSTODY', 'OVERRIDE_CUSTODY')), 0),
            COALESCE(SUM(state = 'OVERDUE'), 0),
            COALESCE(SUM(state = 'SUSPENDED'), 0),
            COALESCE(SUM(state = 'WITHDRAWN'), 0),
            COALESCE(SUM(calibration_status = 'OVERDUE'), 0),
            COALESCE(SUM(calibration_status = 'DUE_SOON'), 0)
         FROM assets WHERE is_active = 1",
    )
    .fetch_one(&mut *conn)
    .await?;

    let (total_kits, kits_in_custody): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*),
                COALESCE(SUM(state IN ('IN_CUSTODY', 'OVERRIDE_CUSTODY', 'OVERDUE')), 0)
         FROM kits",
    )
    .fetch_one(&mut *conn)
    .await?;

    let (open_alerts, critical_alerts): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(severity = 'CRITICAL'), 0)
         FROM alerts WHERE status = 'OPEN'",
    )
    .fetch_one(&mut *conn)
    .await?;

    let today_start = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now);
    let (active_workers_today,): (i64,) = sqlx::query_as(
        "SELECT COUNT(DISTINCT worker_id) FROM custody_records WHERE checked_out_at >= ?",
    )
    .bind(ts(today_start))
    .fetch_one(&mut *conn)
    .await?;

    Ok(DashboardSummary {
        total_assets,
        available,
        in_custody,
        overdue,
        suspended,
        withdrawn,
        total_kits,
        kits_in_custody,
        open_alerts,
        critical_alerts,
        calibration_overdue,
        calibration_due_soon,
        active_workers_today,
    })
}
