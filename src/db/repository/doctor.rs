use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use uuid::Uuid;

use crate::db::{format_timestamp, parse_timestamp, parse_uuid, DatabaseError};
use crate::models::*;

struct DoctorRow {
    id: String,
    email: String,
    first_name: String,
    last_name: String,
    created_at: String,
}

const DOCTOR_COLUMNS: &str = "id, email, first_name, last_name, created_at";

fn read_doctor_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DoctorRow> {
    Ok(DoctorRow {
        id: row.get(0)?,
        email: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn doctor_from_row(row: DoctorRow) -> Result<Doctor, DatabaseError> {
    Ok(Doctor {
        id: parse_uuid(&row.id)?,
        email: row.email,
        first_name: row.first_name,
        last_name: row.last_name,
        created_at: parse_timestamp(&row.created_at)?,
    })
}

/// Insert a doctor. A duplicate email (case-insensitive) is a `ConstraintViolation`.
pub fn insert_doctor(
    conn: &Connection,
    doctor: &Doctor,
    password_hash: &str,
) -> Result<(), DatabaseError> {
    let result = conn.execute(
        "INSERT INTO doctors (id, email, password_hash, first_name, last_name, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            doctor.id.to_string(),
            doctor.email,
            password_hash,
            doctor.first_name,
            doctor.last_name,
            format_timestamp(&doctor.created_at),
        ],
    );

    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(err, _)) if err.code == ErrorCode::ConstraintViolation => {
            Err(DatabaseError::ConstraintViolation(format!(
                "email already registered: {}",
                doctor.email
            )))
        }
        Err(e) => Err(e.into()),
    }
}

pub fn get_doctor(conn: &Connection, id: &Uuid) -> Result<Option<Doctor>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {DOCTOR_COLUMNS} FROM doctors WHERE id = ?1"),
            params![id.to_string()],
            read_doctor_row,
        )
        .optional()?;
    row.map(doctor_from_row).transpose()
}

/// Look up a doctor and the stored password hash by email, ignoring case.
pub fn get_doctor_credentials(
    conn: &Connection,
    email: &str,
) -> Result<Option<DoctorCredentials>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {DOCTOR_COLUMNS}, password_hash FROM doctors WHERE email = ?1"),
            params![email],
            |row| Ok((read_doctor_row(row)?, row.get::<_, String>(5)?)),
        )
        .optional()?;

    match row {
        Some((doctor_row, password_hash)) => Ok(Some(DoctorCredentials {
            doctor: doctor_from_row(doctor_row)?,
            password_hash,
        })),
        None => Ok(None),
    }
}

pub fn doctor_email_exists(conn: &Connection, email: &str) -> Result<bool, DatabaseError> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM doctors WHERE email = ?1)",
        params![email],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub(crate) fn doctor_from_joined_row(
    id: String,
    email: String,
    first_name: String,
    last_name: String,
    created_at: String,
) -> Result<Doctor, DatabaseError> {
    doctor_from_row(DoctorRow {
        id,
        email,
        first_name,
        last_name,
        created_at,
    })
}
