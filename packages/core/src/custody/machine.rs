//! The custody lifecycle transition rules.
//!
//! Pure functions over item state; the service applies their verdicts
//! inside a transaction. Every match is exhaustive over [`ItemState`] so a
//! new state cannot slip through unhandled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConflictReason, CustodyError};
use crate::model::{
    CalibrationStatus, CustodialItem, ItemKind, ItemState, SuspensionCause, Worker,
};

/// Gate a normal checkout.
pub fn check_checkout(kind: ItemKind, state: ItemState) -> Result<(), ConflictReason> {
    match state {
        ItemState::Available => Ok(()),
        ItemState::Suspended => Err(ConflictReason::Suspended(kind)),
        ItemState::Withdrawn => Err(ConflictReason::Withdrawn),
        ItemState::InCustody | ItemState::OverrideCustody | ItemState::Overdue => {
            Err(ConflictReason::AlreadyHeld(kind))
        }
    }
}

/// Gate a return. Anything that might carry an open record is allowed.
pub fn check_return(state: ItemState) -> Result<(), ConflictReason> {
    match state {
        ItemState::Available => Err(ConflictReason::NotHeld),
        ItemState::Withdrawn => Err(ConflictReason::Withdrawn),
        ItemState::InCustody
        | ItemState::Overdue
        | ItemState::OverrideCustody
        | ItemState::Suspended => Ok(()),
    }
}

/// Gate an override checkout. Authority is checked before item state.
pub fn check_override(supervisor: &Worker, state: ItemState) -> Result<(), CustodyError> {
    check_authority(supervisor)?;
    match state {
        ItemState::Withdrawn => Err(CustodyError::Conflict(ConflictReason::Withdrawn)),
        ItemState::Available
        | ItemState::InCustody
        | ItemState::Overdue
        | ItemState::Suspended
        | ItemState::OverrideCustody => Ok(()),
    }
}

pub fn check_authority(actor: &Worker) -> Result<(), CustodyError> {
    if actor.role.can_override() {
        Ok(())
    } else {
        Err(CustodyError::Forbidden {
            role: actor.role.to_string(),
        })
    }
}

/// Manual suspension is only possible from the shelf.
pub fn check_suspend(kind: ItemKind, state: ItemState) -> Result<(), ConflictReason> {
    match state {
        ItemState::Available => Ok(()),
        ItemState::Withdrawn => Err(ConflictReason::Withdrawn),
        ItemState::Suspended => Err(ConflictReason::Suspended(kind)),
        ItemState::InCustody | ItemState::Overdue | ItemState::OverrideCustody => {
            Err(ConflictReason::AlreadyHeld(kind))
        }
    }
}

/// Reinstatement lifts a suspension unless calibration has lapsed.
pub fn check_reinstate(item: &CustodialItem) -> Result<(), ConflictReason> {
    match item.state() {
        ItemState::Suspended => {}
        ItemState::Withdrawn => return Err(ConflictReason::Withdrawn),
        ItemState::Available
        | ItemState::InCustody
        | ItemState::Overdue
        | ItemState::OverrideCustody => return Err(ConflictReason::NotSuspended),
    }
    if item.calibration_status() == Some(CalibrationStatus::Overdue) {
        return Err(ConflictReason::CalibrationOverdue);
    }
    Ok(())
}

/// Withdrawal needs the item back on the shelf first.
pub fn check_withdraw(kind: ItemKind, state: ItemState) -> Result<(), ConflictReason> {
    match state {
        ItemState::Available | ItemState::Suspended => Ok(()),
        ItemState::Withdrawn => Err(ConflictReason::Withdrawn),
        ItemState::InCustody | ItemState::Overdue | ItemState::OverrideCustody => {
            Err(ConflictReason::AlreadyHeld(kind))
        }
    }
}

/// State (and suspension cause) an item lands in when it comes back.
pub fn state_after_return(
    current: ItemState,
    current_cause: Option<SuspensionCause>,
    calibration: Option<CalibrationStatus>,
) -> (ItemState, Option<SuspensionCause>) {
    if current == ItemState::Suspended {
        return (ItemState::Suspended, current_cause);
    }
    match calibration {
        Some(CalibrationStatus::Overdue) => {
            (ItemState::Suspended, Some(SuspensionCause::Calibration))
        }
        Some(CalibrationStatus::Valid)
        | Some(CalibrationStatus::DueSoon)
        | Some(CalibrationStatus::NotRequired)
        | Some(CalibrationStatus::Unknown)
        | None => (ItemState::Available, None),
    }
}

/// Where the overdue evaluator moves a held item, if anywhere.
///
/// Override custody is left alone; only a normal checkout
/// escalates to `OVERDUE`.
pub fn overdue_escalation(state: ItemState) -> Option<ItemState> {
    match state {
        ItemState::InCustody => Some(ItemState::Overdue),
        ItemState::Available
        | ItemState::Overdue
        | ItemState::Suspended
        | ItemState::OverrideCustody
        | ItemState::Withdrawn => None,
    }
}

/// Hours past `deadline` at `now`, rounded to 2 decimals, for any `now`
/// strictly after the deadline. A few seconds late yields `Some(0.0)`.
pub fn lateness_hours(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Option<f64> {
    (now > deadline).then(|| round2(hours_between(deadline, now)))
}

/// Overdue hours recorded on return: [`lateness_hours`] when it rounds to a
/// positive value, otherwise `None`.
pub fn overdue_hours(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Option<f64> {
    lateness_hours(deadline, now).filter(|hours| *hours > 0.0)
}

pub(crate) fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 3_600_000_000.0,
        None => delta.num_seconds() as f64 / 3600.0,
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Event kind a capture station may attach to a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanKind {
    Checkout,
    Return,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanAction {
    Checkout,
    Return,
}

/// An explicit RETURN, or any held item, means return; everything else is
/// a checkout attempt (which the checkout gate may then refuse).
pub fn scan_action(explicit: Option<ScanKind>, state: ItemState) -> ScanAction {
    if explicit == Some(ScanKind::Return) || state.is_held() {
        ScanAction::Return
    } else {
        ScanAction::Checkout
    }
}
