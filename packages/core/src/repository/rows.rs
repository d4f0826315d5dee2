//! Column decoding shared by every table.
//!
//! Identifiers and timestamps are stored as TEXT, enums as their
//! SCREAMING_SNAKE_CASE names. A value that fails to parse is reported as
//! [`StoreError::Corrupt`] rather than skipped.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::ParseEnumError;

/// Timestamp encoding used for every stored instant.
///
/// Fixed nanosecond precision with a `Z` suffix keeps lexicographic order
/// equal to chronological order, which the range queries rely on.
pub(crate) fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn parse_ts(
    entity: &'static str,
    raw: &str,
) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::corrupt(entity, format!("bad timestamp '{raw}': {e}")))
}

pub(crate) fn uuid(
    row: &SqliteRow,
    entity: &'static str,
    column: &str,
) -> Result<Uuid, StoreError> {
    let raw: String = row.try_get(column)?;
    Uuid::parse_str(&raw)
        .map_err(|e| StoreError::corrupt(entity, format!("bad {column} '{raw}': {e}")))
}

pub(crate) fn opt_uuid(
    row: &SqliteRow,
    entity: &'static str,
    column: &str,
) -> Result<Option<Uuid>, StoreError> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|raw| {
        Uuid::parse_str(&raw)
            .map_err(|e| StoreError::corrupt(entity, format!("bad {column} '{raw}': {e}")))
    })
    .transpose()
}

pub(crate) fn time(
    row: &SqliteRow,
    entity: &'static str,
    column: &str,
) -> Result<DateTime<Utc>, StoreError> {
    let raw: String = row.try_get(column)?;
    parse_ts(entity, &raw)
}

pub(crate) fn opt_time(
    row: &SqliteRow,
    entity: &'static str,
    column: &str,
) -> Result<Option<DateTime<Utc>>, StoreError> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|raw| parse_ts(entity, &raw)).transpose()
}

pub(crate) fn flag(row: &SqliteRow, column: &str) -> Result<bool, StoreError> {
    let raw: i64 = row.try_get(column)?;
    Ok(raw != 0)
}

pub(crate) fn enum_col<T>(
    row: &SqliteRow,
    entity: &'static str,
    column: &str,
) -> Result<T, StoreError>
where
    T: FromStr<Err = ParseEnumError>,
{
    let raw: String = row.try_get(column)?;
    raw.parse()
        .map_err(|e: ParseEnumError| StoreError::corrupt(entity, e.to_string()))
}

pub(crate) fn opt_enum_col<T>(
    row: &SqliteRow,
    entity: &'static str,
    column: &str,
) -> Result<Option<T>, StoreError>
where
    T: FromStr<Err = ParseEnumError>,
{
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|raw| {
        raw.parse()
            .map_err(|e: ParseEnumError| StoreError::corrupt(entity, e.to_string()))
    })
    .transpose()
}
