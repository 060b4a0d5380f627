use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{format_timestamp, parse_timestamp, parse_uuid, DatabaseError};
use crate::models::*;

pub fn insert_therapy_session(conn: &Connection, session: &TherapySession) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO therapy_sessions (id, patient_id, doctor_id, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            session.id.to_string(),
            session.patient_id.to_string(),
            session.doctor_id.to_string(),
            format_timestamp(&session.created_at),
        ],
    )?;
    Ok(())
}

/// Fetch a session owned by `doctor_id`.
pub fn get_therapy_session(
    conn: &Connection,
    doctor_id: &Uuid,
    id: &Uuid,
) -> Result<Option<TherapySession>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, patient_id, doctor_id, created_at FROM therapy_sessions
             WHERE id = ?1 AND doctor_id = ?2",
            params![id.to_string(), doctor_id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((id, patient_id, doctor_id, created_at)) => Ok(Some(TherapySession {
            id: parse_uuid(&id)?,
            patient_id: parse_uuid(&patient_id)?,
            doctor_id: parse_uuid(&doctor_id)?,
            created_at: parse_timestamp(&created_at)?,
        })),
        None => Ok(None),
    }
}

struct SessionRow {
    id: String,
    patient_id: String,
    doctor_id: String,
    created_at: String,
    patient_name: String,
    patient_email: String,
}

/// Sessions for a doctor, newest first, each with its patient's identity.
pub fn list_therapy_sessions(
    conn: &Connection,
    doctor_id: &Uuid,
    patient_id: Option<&Uuid>,
) -> Result<Vec<TherapySessionWithPatient>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.patient_id, s.doctor_id, s.created_at, p.name, p.email
         FROM therapy_sessions s JOIN patients p ON p.id = s.patient_id
         WHERE s.doctor_id = ?1 AND (?2 IS NULL OR s.patient_id = ?2)
         ORDER BY s.created_at DESC, s.rowid DESC",
    )?;

    let rows = stmt.query_map(
        params![doctor_id.to_string(), patient_id.map(|id| id.to_string())],
        |row| {
            Ok(SessionRow {
                id: row.get(0)?,
                patient_id: row.get(1)?,
                doctor_id: row.get(2)?,
                created_at: row.get(3)?,
                patient_name: row.get(4)?,
                patient_email: row.get(5)?,
            })
        },
    )?;

    let mut sessions = Vec::new();
    for row in rows {
        let row = row?;
        let patient_id = parse_uuid(&row.patient_id)?;
        sessions.push(TherapySessionWithPatient {
            session: TherapySession {
                id: parse_uuid(&row.id)?,
                patient_id,
                doctor_id: parse_uuid(&row.doctor_id)?,
                created_at: parse_timestamp(&row.created_at)?,
            },
            patient: PatientBrief {
                id: patient_id,
                name: row.patient_name,
                email: row.patient_email,
            },
        });
    }
    Ok(sessions)
}
