use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{format_timestamp, parse_timestamp, parse_uuid, DatabaseError};
use crate::models::*;

const PATIENT_COLUMNS: &str = "id, doctor_id, name, email, date_of_birth, created_at";

struct PatientRow {
    id: String,
    doctor_id: String,
    name: String,
    email: String,
    date_of_birth: Option<String>,
    created_at: String,
}

fn read_patient_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PatientRow> {
    Ok(PatientRow {
        id: row.get(0)?,
        doctor_id: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        date_of_birth: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn parse_date(raw: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| DatabaseError::ConstraintViolation(format!("bad date {raw:?}: {e}")))
}

fn patient_from_row(row: PatientRow) -> Result<Patient, DatabaseError> {
    Ok(Patient {
        id: parse_uuid(&row.id)?,
        doctor_id: parse_uuid(&row.doctor_id)?,
        name: row.name,
        email: row.email,
        date_of_birth: row.date_of_birth.as_deref().map(parse_date).transpose()?,
        created_at: parse_timestamp(&row.created_at)?,
    })
}

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, doctor_id, name, email, date_of_birth, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            patient.id.to_string(),
            patient.doctor_id.to_string(),
            patient.name,
            patient.email,
            patient.date_of_birth.map(|d| d.to_string()),
            format_timestamp(&patient.created_at),
        ],
    )?;
    Ok(())
}

/// Fetch a patient owned by `doctor_id`. Another doctor's patient reads as `None`.
pub fn get_patient(
    conn: &Connection,
    doctor_id: &Uuid,
    id: &Uuid,
) -> Result<Option<Patient>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1 AND doctor_id = ?2"),
            params![id.to_string(), doctor_id.to_string()],
            read_patient_row,
        )
        .optional()?;
    row.map(patient_from_row).transpose()
}

/// Newest first.
pub fn list_patients(
    conn: &Connection,
    doctor_id: &Uuid,
    limit: Option<u32>,
) -> Result<Vec<Patient>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patients WHERE doctor_id = ?1
         ORDER BY created_at DESC, rowid DESC LIMIT ?2"
    ))?;

    // SQLite treats a negative LIMIT as unbounded.
    let limit = limit.map(i64::from).unwrap_or(-1);
    let rows = stmt.query_map(params![doctor_id.to_string(), limit], read_patient_row)?;

    let mut patients = Vec::new();
    for row in rows {
        patients.push(patient_from_row(row?)?);
    }
    Ok(patients)
}

/// Update the editable fields. Returns the updated patient, or `None` if the
/// doctor does not own a patient with this id.
pub fn update_patient(
    conn: &Connection,
    doctor_id: &Uuid,
    id: &Uuid,
    fields: &PatientFields,
) -> Result<Option<Patient>, DatabaseError> {
    let updated = conn.execute(
        "UPDATE patients SET name = ?1, email = ?2, date_of_birth = ?3
         WHERE id = ?4 AND doctor_id = ?5",
        params![
            fields.name,
            fields.email,
            fields.date_of_birth.map(|d| d.to_string()),
            id.to_string(),
            doctor_id.to_string(),
        ],
    )?;
    if updated == 0 {
        return Ok(None);
    }
    get_patient(conn, doctor_id, id)
}

/// Delete a patient and, by cascade, their sessions and messages.
pub fn delete_patient(conn: &Connection, doctor_id: &Uuid, id: &Uuid) -> Result<bool, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM patients WHERE id = ?1 AND doctor_id = ?2",
        params![id.to_string(), doctor_id.to_string()],
    )?;
    Ok(deleted > 0)
}

pub fn count_patients(conn: &Connection, doctor_id: &Uuid) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM patients WHERE doctor_id = ?1",
        params![doctor_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn count_patients_since(
    conn: &Connection,
    doctor_id: &Uuid,
    since: &NaiveDateTime,
) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM patients WHERE doctor_id = ?1 AND created_at >= ?2",
        params![doctor_id.to_string(), format_timestamp(since)],
        |row| row.get(0),
    )?;
    Ok(count)
}
