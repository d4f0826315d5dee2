//! Operator handling of raised alerts.

use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{ConflictReason, CustodyError, CustodyResult, Missing};
use crate::model::{Alert, AlertStatus};
use crate::repository::{alerts, people, ToolroomRepository};

/// OPEN → ACKNOWLEDGED.
pub async fn acknowledge(
    repo: &ToolroomRepository,
    clock: &dyn Clock,
    alert_id: Uuid,
    worker_id: Option<Uuid>,
) -> CustodyResult<Alert> {
    let mut tx = repo.begin().await?;
    check_worker(&mut tx, worker_id).await?;
    let alert = alerts::fetch_alert(&mut tx, alert_id)
        .await?
        .ok_or_else(|| CustodyError::NotFound(Missing::Alert(alert_id.to_string())))?;
    if alert.status != AlertStatus::Open
        || !alerts::acknowledge(&mut tx, alert_id, worker_id, clock.now()).await?
    {
        return Err(CustodyError::Conflict(ConflictReason::AlertNotOpen));
    }
    let updated = fetch_existing(&mut tx, alert_id).await?;
    tx.commit().await?;

    tracing::info!("Alert {} acknowledged", alert_id);
    Ok(updated)
}

/// OPEN or ACKNOWLEDGED → RESOLVED.
pub async fn resolve(
    repo: &ToolroomRepository,
    clock: &dyn Clock,
    alert_id: Uuid,
    worker_id: Option<Uuid>,
    note: Option<&str>,
) -> CustodyResult<Alert> {
    let mut tx = repo.begin().await?;
    check_worker(&mut tx, worker_id).await?;
    if alerts::fetch_alert(&mut tx, alert_id).await?.is_none() {
        return Err(CustodyError::NotFound(Missing::Alert(alert_id.to_string())));
    }
    if !alerts::resolve(&mut tx, alert_id, worker_id, note, clock.now()).await? {
        return Err(CustodyError::Conflict(ConflictReason::AlertNotOpen));
    }
    let updated = fetch_existing(&mut tx, alert_id).await?;
    tx.commit().await?;

    tracing::info!("Alert {} resolved", alert_id);
    Ok(updated)
}

async fn check_worker(
    conn: &mut sqlx::SqliteConnection,
    worker_id: Option<Uuid>,
) -> CustodyResult<()> {
    if let Some(id) = worker_id {
        if people::fetch_worker(conn, id).await?.is_none() {
            return Err(CustodyError::NotFound(Missing::Worker(id.to_string())));
        }
    }
    Ok(())
}

async fn fetch_existing(
    conn: &mut sqlx::SqliteConnection,
    alert_id: Uuid,
) -> CustodyResult<Alert> {
    alerts::fetch_alert(conn, alert_id)
        .await?
        .ok_or_else(|| CustodyError::NotFound(Missing::Alert(alert_id.to_string())))
}
