use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{format_timestamp, parse_timestamp, DatabaseError};
use crate::models::Doctor;

use super::doctor::doctor_from_joined_row;

pub fn insert_auth_session(
    conn: &Connection,
    token_hash: &str,
    doctor_id: &Uuid,
    created_at: &NaiveDateTime,
    expires_at: &NaiveDateTime,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO auth_sessions (token_hash, doctor_id, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            token_hash,
            doctor_id.to_string(),
            format_timestamp(created_at),
            format_timestamp(expires_at),
        ],
    )?;
    Ok(())
}

/// Resolve a token hash to its doctor, ignoring sessions that expired before `now`.
pub fn find_session_doctor(
    conn: &Connection,
    token_hash: &str,
    now: &NaiveDateTime,
) -> Result<Option<(Doctor, NaiveDateTime)>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT d.id, d.email, d.first_name, d.last_name, d.created_at, s.expires_at
             FROM auth_sessions s JOIN doctors d ON d.id = s.doctor_id
             WHERE s.token_hash = ?1 AND s.expires_at > ?2",
            params![token_hash, format_timestamp(now)],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((id, email, first_name, last_name, created_at, expires_at)) => Ok(Some((
            doctor_from_joined_row(id, email, first_name, last_name, created_at)?,
            parse_timestamp(&expires_at)?,
        ))),
        None => Ok(None),
    }
}

/// Delete a session. Returns `true` if a row was removed.
pub fn delete_auth_session(conn: &Connection, token_hash: &str) -> Result<bool, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM auth_sessions WHERE token_hash = ?1",
        params![token_hash],
    )?;
    Ok(deleted > 0)
}

pub fn purge_expired_sessions(conn: &Connection, now: &NaiveDateTime) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM auth_sessions WHERE expires_at <= ?1",
        params![format_timestamp(now)],
    )?;
    Ok(deleted)
}
