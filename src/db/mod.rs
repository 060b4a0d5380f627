pub mod repository;
pub mod sqlite;

pub use repository::*;
pub use sqlite::*;

use chrono::NaiveDateTime;
use thiserror::Error;

/// Storage format for every timestamp column. Fixed-width, so text order
/// matches chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("bad timestamp {raw:?}: {e}")))
}

/// Current UTC time truncated to storage precision.
pub fn now_utc() -> NaiveDateTime {
    let now = chrono::Utc::now().naive_utc();
    parse_timestamp(&format_timestamp(&now)).unwrap_or(now)
}

pub(crate) fn parse_uuid(raw: &str) -> Result<uuid::Uuid, DatabaseError> {
    uuid::Uuid::parse_str(raw).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_round_trips_at_storage_precision() {
        let now = now_utc();
        assert_eq!(parse_timestamp(&format_timestamp(&now)).unwrap(), now);
    }

    #[test]
    fn timestamps_sort_lexicographically() {
        let earlier = parse_timestamp("2024-01-05 09:00:00.000001").unwrap();
        let later = parse_timestamp("2024-01-05 10:00:00.000000").unwrap();
        assert!(format_timestamp(&earlier) < format_timestamp(&later));
    }

    #[test]
    fn malformed_timestamp_is_constraint_violation() {
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(DatabaseError::ConstraintViolation(_))
        ));
    }
}
