//! Custody operations.
//!
//! Each operation resolves the scanned codes first, then opens one
//! transaction in which it re-reads the item, applies the gate from
//! [`machine`](super::machine), writes the state with compare-and-set,
//! persists the custody record and appends the audit entry.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::machine::{self, ScanAction, ScanKind};
use crate::clock::Clock;
use crate::error::{ConflictReason, CustodyError, CustodyResult, Missing};
use crate::model::{
    CustodialItem, CustodyEventType, CustodyRecord, ItemRef, ItemState, SuspensionCause,
};
use crate::repository::{audit, custody, items, NewAuditEntry, ToolroomRepository};
use crate::resolver::IdentityResolver;

/// Note written on a record closed because an override replaced it.
pub const SUPERSEDED_NOTE: &str = "Superseded by override checkout";

/// What a universal scan turned into.
#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub action: ScanAction,
    pub record: CustodyRecord,
}

#[derive(Clone)]
pub struct CustodyService {
    repo: ToolroomRepository,
    resolver: Arc<dyn IdentityResolver>,
    clock: Arc<dyn Clock>,
    default_edge_node: String,
}

impl CustodyService {
    pub fn new(
        repo: ToolroomRepository,
        resolver: Arc<dyn IdentityResolver>,
        clock: Arc<dyn Clock>,
        default_edge_node: impl Into<String>,
    ) -> Self {
        Self {
            repo,
            resolver,
            clock,
            default_edge_node: default_edge_node.into(),
        }
    }

    /// Issue an item to a worker.
    pub async fn checkout(
        &self,
        worker_code: &str,
        item_code: &str,
        origin_node: Option<&str>,
        notes: Option<&str>,
    ) -> CustodyResult<CustodyRecord> {
        let worker = self.resolver.resolve_worker(worker_code).await?;
        let item = self.resolver.resolve_item(item_code).await?;
        let edge_node_id = self.origin(origin_node).await;
        let now = self.clock.now();

        let mut tx = self.repo.begin().await?;
        let current = reload(&mut tx, &item).await?;
        let from = current.state();
        machine::check_checkout(current.kind(), from).map_err(CustodyError::Conflict)?;

        let record = CustodyRecord {
            id: Uuid::new_v4(),
            item: current.item_ref(),
            worker_id: worker.id,
            edge_node_id,
            event_type: CustodyEventType::Checkout,
            checked_out_at: now,
            expected_return_at: Some(now + Duration::hours(current.max_checkout_hours())),
            returned_at: None,
            is_overdue: false,
            overdue_flagged_at: None,
            overdue_hours: None,
            is_override: false,
            override_by: None,
            override_reason: None,
            notes: notes.map(str::to_string),
            created_at: now,
        };

        transition(&mut tx, record.item, from, ItemState::InCustody, None, now).await?;
        custody::insert_record(&mut tx, &record).await?;
        audit::append(
            &mut tx,
            &NewAuditEntry {
                entity_type: record.item.kind.entity_type(),
                entity_id: record.item.id,
                event_type: CustodyEventType::Checkout,
                old_state: Some(json!({ "state": from })),
                new_state: Some(json!({
                    "state": ItemState::InCustody,
                    "worker_id": worker.id,
                })),
                changed_by: Some(worker.id),
                edge_node_id,
                notes: record.notes.clone(),
            },
            now,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            record_id = %record.id,
            "{} checked out {} (due back {:?})",
            worker.employee_id,
            current.display_code(),
            record.expected_return_at,
        );
        Ok(record)
    }

    /// Take an item back and close its open record.
    pub async fn return_item(
        &self,
        worker_code: &str,
        item_code: &str,
        origin_node: Option<&str>,
        notes: Option<&str>,
    ) -> CustodyResult<CustodyRecord> {
        let worker = self.resolver.resolve_worker(worker_code).await?;
        let item = self.resolver.resolve_item(item_code).await?;
        let edge_node_id = self.origin(origin_node).await;
        let now = self.clock.now();

        let mut tx = self.repo.begin().await?;
        let current = reload(&mut tx, &item).await?;
        let from = current.state();
        machine::check_return(from).map_err(CustodyError::Conflict)?;

        let mut record = custody::find_open_record(&mut tx, current.item_ref())
            .await?
            .ok_or_else(|| {
                CustodyError::NotFound(Missing::OpenCustodyRecord(item_code.to_string()))
            })?;

        let overdue_hours = record
            .expected_return_at
            .and_then(|deadline| machine::overdue_hours(deadline, now));
        if !custody::close_record(&mut tx, record.id, now, overdue_hours, notes).await? {
            return Err(CustodyError::Conflict(ConflictReason::ConcurrentUpdate));
        }

        let (to, cause) = machine::state_after_return(
            from,
            current.suspension_cause(),
            current.calibration_status(),
        );
        transition(&mut tx, record.item, from, to, cause, now).await?;
        audit::append(
            &mut tx,
            &NewAuditEntry {
                entity_type: record.item.kind.entity_type(),
                entity_id: record.item.id,
                event_type: CustodyEventType::Return,
                old_state: Some(json!({ "state": from })),
                new_state: Some(json!({ "state": to, "overdue_hours": overdue_hours })),
                changed_by: Some(worker.id),
                edge_node_id,
                notes: notes.map(str::to_string),
            },
            now,
        )
        .await?;
        tx.commit().await?;

        record.returned_at = Some(now);
        if overdue_hours.is_some() {
            record.overdue_hours = overdue_hours;
        }
        if let Some(notes) = notes {
            record.notes = Some(notes.to_string());
        }

        tracing::info!(
            record_id = %record.id,
            "{} returned {} -> {} (overdue hours: {:?})",
            worker.employee_id,
            current.display_code(),
            to,
            overdue_hours,
        );
        Ok(record)
    }

    /// Supervisor-authorised checkout that bypasses suspension and custody.
    ///
    /// An open record held by someone else is closed first so the item never
    /// carries two open records.
    pub async fn override_checkout(
        &self,
        worker_code: &str,
        item_code: &str,
        supervisor_code: &str,
        reason: &str,
        origin_node: Option<&str>,
    ) -> CustodyResult<CustodyRecord> {
        let worker = self.resolver.resolve_worker(worker_code).await?;
        let supervisor = self.resolver.resolve_worker(supervisor_code).await?;
        let item = self.resolver.resolve_item(item_code).await?;
        let edge_node_id = self.origin(origin_node).await;
        let now = self.clock.now();

        let mut tx = self.repo.begin().await?;
        let current = reload(&mut tx, &item).await?;
        let from = current.state();
        machine::check_override(&supervisor, from)?;

        if let Some(previous) = custody::find_open_record(&mut tx, current.item_ref()).await? {
            let hours = previous
                .expected_return_at
                .and_then(|deadline| machine::overdue_hours(deadline, now));
            custody::close_record(&mut tx, previous.id, now, hours, Some(SUPERSEDED_NOTE)).await?;
            tracing::warn!(
                record_id = %previous.id,
                "Open record on {} closed by override",
                current.display_code()
            );
        }

        let record = CustodyRecord {
            id: Uuid::new_v4(),
            item: current.item_ref(),
            worker_id: worker.id,
            edge_node_id,
            event_type: CustodyEventType::OverrideCheckout,
            checked_out_at: now,
            expected_return_at: Some(now + Duration::hours(current.max_checkout_hours())),
            returned_at: None,
            is_overdue: false,
            overdue_flagged_at: None,
            overdue_hours: None,
            is_override: true,
            override_by: Some(supervisor.id),
            override_reason: Some(reason.to_string()),
            notes: None,
            created_at: now,
        };

        transition(&mut tx, record.item, from, ItemState::OverrideCustody, None, now).await?;
        custody::insert_record(&mut tx, &record).await?;
        audit::append(
            &mut tx,
            &NewAuditEntry {
                entity_type: record.item.kind.entity_type(),
                entity_id: record.item.id,
                event_type: CustodyEventType::OverrideCheckout,
                old_state: Some(json!({ "state": from })),
                new_state: Some(json!({
                    "state": ItemState::OverrideCustody,
                    "worker_id": worker.id,
                    "supervisor": supervisor.id,
                    "reason": reason,
                })),
                changed_by: Some(supervisor.id),
                edge_node_id,
                notes: None,
            },
            now,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            record_id = %record.id,
            "{} override-issued {} to {} ({})",
            supervisor.employee_id,
            current.display_code(),
            worker.employee_id,
            reason,
        );
        Ok(record)
    }

    /// Decide between checkout and return from the item's state.
    pub async fn resolve_by_scan(
        &self,
        worker_code: &str,
        item_code: &str,
        explicit: Option<ScanKind>,
        origin_node: Option<&str>,
        notes: Option<&str>,
    ) -> CustodyResult<ScanOutcome> {
        let item = self.resolver.resolve_item(item_code).await?;
        let action = machine::scan_action(explicit, item.state());
        let record = match action {
            ScanAction::Return => {
                self.return_item(worker_code, item_code, origin_node, notes)
                    .await?
            }
            ScanAction::Checkout => {
                self.checkout(worker_code, item_code, origin_node, notes)
                    .await?
            }
        };
        Ok(ScanOutcome { action, record })
    }

    /// Withhold an item on the shelf.
    pub async fn suspend(
        &self,
        item_code: &str,
        actor_code: &str,
        reason: Option<&str>,
    ) -> CustodyResult<CustodialItem> {
        let actor = self.resolver.resolve_worker(actor_code).await?;
        machine::check_authority(&actor)?;
        let item = self.resolver.resolve_item(item_code).await?;
        let now = self.clock.now();

        let mut tx = self.repo.begin().await?;
        let current = reload(&mut tx, &item).await?;
        let from = current.state();
        machine::check_suspend(current.kind(), from).map_err(CustodyError::Conflict)?;

        let cause = SuspensionCause::Manual;
        transition(&mut tx, current.item_ref(), from, ItemState::Suspended, Some(cause), now)
            .await?;
        audit::append(
            &mut tx,
            &NewAuditEntry {
                entity_type: current.kind().entity_type(),
                entity_id: current.id(),
                event_type: CustodyEventType::Suspend,
                old_state: Some(json!({ "state": from })),
                new_state: Some(json!({
                    "state": ItemState::Suspended,
                    "cause": cause,
                    "reason": reason,
                })),
                changed_by: Some(actor.id),
                edge_node_id: None,
                notes: reason.map(str::to_string),
            },
            now,
        )
        .await?;
        let updated = reload(&mut tx, &current).await?;
        tx.commit().await?;

        tracing::info!("{} suspended {}", actor.employee_id, current.display_code());
        Ok(updated)
    }

    /// Return a suspended item to service.
    pub async fn reinstate(
        &self,
        item_code: &str,
        actor_code: &str,
    ) -> CustodyResult<CustodialItem> {
        let actor = self.resolver.resolve_worker(actor_code).await?;
        machine::check_authority(&actor)?;
        let item = self.resolver.resolve_item(item_code).await?;
        let now = self.clock.now();

        let mut tx = self.repo.begin().await?;
        let current = reload(&mut tx, &item).await?;
        machine::check_reinstate(&current).map_err(CustodyError::Conflict)?;

        transition(
            &mut tx,
            current.item_ref(),
            ItemState::Suspended,
            ItemState::Available,
            None,
            now,
        )
        .await?;
        audit::append(
            &mut tx,
            &NewAuditEntry {
                entity_type: current.kind().entity_type(),
                entity_id: current.id(),
                event_type: CustodyEventType::Reinstate,
                old_state: Some(json!({
                    "state": ItemState::Suspended,
                    "cause": current.suspension_cause(),
                })),
                new_state: Some(json!({ "state": ItemState::Available })),
                changed_by: Some(actor.id),
                edge_node_id: None,
                notes: None,
            },
            now,
        )
        .await?;
        let updated = reload(&mut tx, &current).await?;
        tx.commit().await?;

        tracing::info!("{} reinstated {}", actor.employee_id, current.display_code());
        Ok(updated)
    }

    /// Retire an item for good.
    pub async fn withdraw(
        &self,
        item_code: &str,
        actor_code: &str,
        reason: Option<&str>,
    ) -> CustodyResult<CustodialItem> {
        let actor = self.resolver.resolve_worker(actor_code).await?;
        machine::check_authority(&actor)?;
        let item = self.resolver.resolve_item(item_code).await?;
        let now = self.clock.now();

        let mut tx = self.repo.begin().await?;
        let current = reload(&mut tx, &item).await?;
        let from = current.state();
        machine::check_withdraw(current.kind(), from).map_err(CustodyError::Conflict)?;

        transition(&mut tx, current.item_ref(), from, ItemState::Withdrawn, None, now).await?;
        audit::append(
            &mut tx,
            &NewAuditEntry {
                entity_type: current.kind().entity_type(),
                entity_id: current.id(),
                event_type: CustodyEventType::Withdraw,
                old_state: Some(json!({ "state": from })),
                new_state: Some(json!({ "state": ItemState::Withdrawn, "reason": reason })),
                changed_by: Some(actor.id),
                edge_node_id: None,
                notes: reason.map(str::to_string),
            },
            now,
        )
        .await?;
        let updated = reload(&mut tx, &current).await?;
        tx.commit().await?;

        tracing::info!("{} withdrew {}", actor.employee_id, current.display_code());
        Ok(updated)
    }

    async fn origin(&self, origin_node: Option<&str>) -> Option<Uuid> {
        let node_id = origin_node.unwrap_or(self.default_edge_node.as_str());
        self.resolver
            .resolve_origin_node(node_id)
            .await
            .map(|node| node.id)
    }
}

/// Fresh copy of an item read inside the transaction.
async fn reload(
    conn: &mut SqliteConnection,
    item: &CustodialItem,
) -> CustodyResult<CustodialItem> {
    items::fetch_item(conn, item.item_ref())
        .await?
        .ok_or_else(|| CustodyError::NotFound(Missing::Item(item.display_code().to_string())))
}

/// Compare-and-set the item state, failing on a lost race.
async fn transition(
    conn: &mut SqliteConnection,
    item: ItemRef,
    from: ItemState,
    to: ItemState,
    cause: Option<SuspensionCause>,
    now: DateTime<Utc>,
) -> CustodyResult<()> {
    if items::compare_and_set_state(conn, item, from, to, cause, now).await? {
        Ok(())
    } else {
        Err(CustodyError::Conflict(ConflictReason::ConcurrentUpdate))
    }
}
