use chrono::NaiveDateTime;
use rusqlite::{params, Connection};

use crate::db::{format_timestamp, DatabaseError};

/// A buffered access event, as written to `audit_log`.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub timestamp: NaiveDateTime,
    pub doctor_id: Option<String>,
    pub action: String,
    pub entity: String,
}

/// Insert a batch of audit entries in one transaction.
pub fn insert_audit_entries(conn: &mut Connection, entries: &[AuditRecord]) -> Result<(), DatabaseError> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO audit_log (timestamp, doctor_id, action, entity) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for entry in entries {
            stmt.execute(params![
                format_timestamp(&entry.timestamp),
                entry.doctor_id,
                entry.action,
                entry.entity,
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Prune audit entries older than the given number of days.
pub fn prune_audit_log(conn: &Connection, retention_days: i64) -> Result<usize, DatabaseError> {
    let cutoff = chrono::Utc::now().naive_utc() - chrono::Duration::days(retention_days);
    let deleted = conn.execute(
        "DELETE FROM audit_log WHERE timestamp < ?1",
        params![format_timestamp(&cutoff)],
    )?;
    Ok(deleted)
}

/// Audit entries for one doctor, newest first, as (timestamp, action, entity).
pub fn query_audit_by_doctor(
    conn: &Connection,
    doctor_id: &str,
) -> Result<Vec<(String, String, String)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT timestamp, action, entity FROM audit_log
         WHERE doctor_id = ?1 ORDER BY timestamp DESC, id DESC",
    )?;
    let rows = stmt
        .query_map(params![doctor_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
