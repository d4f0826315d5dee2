use thiserror::Error;

use crate::model::ItemKind;

/// Process-level failure (startup, wiring, serving).
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),
}

/// Failure inside the entity store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),
    #[error("corrupt {entity} row: {message}")]
    Corrupt { entity: &'static str, message: String },
}

impl StoreError {
    pub fn corrupt(entity: &'static str, message: impl Into<String>) -> Self {
        Self::Corrupt {
            entity,
            message: message.into(),
        }
    }
}

/// What could not be found when resolving a custody request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Missing {
    Worker(String),
    Item(String),
    Asset(String),
    Alert(String),
    Category(String),
    OpenCustodyRecord(String),
}

impl std::fmt::Display for Missing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Missing::Worker(code) => write!(f, "Worker '{code}' not found or inactive"),
            Missing::Item(code) => write!(f, "Asset/Kit '{code}' not found"),
            Missing::Asset(id) => write!(f, "Asset {id} not found"),
            Missing::Alert(id) => write!(f, "Alert {id} not found"),
            Missing::Category(code) => write!(f, "Category '{code}' not found"),
            Missing::OpenCustodyRecord(code) => {
                write!(f, "No open custody record found for '{code}'")
            }
        }
    }
}

/// Why a request is inapplicable to the item's current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictReason {
    Suspended(ItemKind),
    Withdrawn,
    AlreadyHeld(ItemKind),
    NotHeld,
    NotSuspended,
    CalibrationOverdue,
    AlertNotOpen,
    /// A registration collided with an existing unique code.
    Duplicate(String),
    /// The item's state moved between the read and the write.
    ConcurrentUpdate,
}

impl std::fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictReason::Suspended(kind) => write!(
                f,
                "{kind} is SUSPENDED (calibration expired or withheld). Cannot issue."
            ),
            ConflictReason::Withdrawn => write!(f, "Item has been WITHDRAWN from service."),
            ConflictReason::AlreadyHeld(kind) => {
                write!(f, "{kind} is already IN CUSTODY. Return it first.")
            }
            ConflictReason::NotHeld => write!(f, "Item is already AVAILABLE (not checked out)."),
            ConflictReason::NotSuspended => write!(f, "Item is not SUSPENDED."),
            ConflictReason::CalibrationOverdue => {
                write!(f, "Calibration is OVERDUE. Record a calibration first.")
            }
            ConflictReason::AlertNotOpen => write!(f, "Alert is no longer open."),
            ConflictReason::Duplicate(what) => write!(f, "{what} already exists."),
            ConflictReason::ConcurrentUpdate => {
                write!(f, "Item state changed concurrently. Scan again.")
            }
        }
    }
}

/// Errors surfaced by custody and calibration operations.
///
/// None of these are retried; each is terminal for the request.
#[derive(Debug, Error)]
pub enum CustodyError {
    #[error("{0}")]
    NotFound(Missing),
    #[error("{0}")]
    Conflict(ConflictReason),
    #[error("Scanned supervisor does not have override authority (role {role}).")]
    Forbidden { role: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CustodyError {
    /// Map a unique-constraint failure on insert to a conflict.
    pub fn from_insert(err: StoreError, what: impl Into<String>) -> Self {
        match err {
            StoreError::Query(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                CustodyError::Conflict(ConflictReason::Duplicate(what.into()))
            }
            other => CustodyError::Store(other),
        }
    }
}

impl From<sqlx::Error> for CustodyError {
    fn from(err: sqlx::Error) -> Self {
        CustodyError::Store(StoreError::Query(err))
    }
}

pub type CustodyResult<T> = Result<T, CustodyError>;
