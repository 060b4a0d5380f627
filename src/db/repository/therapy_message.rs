use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::{format_timestamp, parse_timestamp, parse_uuid, DatabaseError};
use crate::models::enums::SenderType;
use crate::models::*;

pub fn insert_therapy_message(conn: &Connection, msg: &TherapyMessage) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO therapy_messages (id, session_id, sender_type, content, ai_category, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            msg.id.to_string(),
            msg.session_id.to_string(),
            msg.sender_type.as_str(),
            msg.content,
            msg.ai_category,
            format_timestamp(&msg.created_at),
        ],
    )?;
    Ok(())
}

struct MessageRow {
    id: String,
    session_id: String,
    sender_type: String,
    content: String,
    ai_category: Option<String>,
    created_at: String,
}

/// Messages of a session, oldest first. Equal timestamps keep insertion order.
pub fn list_therapy_messages(
    conn: &Connection,
    session_id: &Uuid,
) -> Result<Vec<TherapyMessage>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, session_id, sender_type, content, ai_category, created_at
         FROM therapy_messages WHERE session_id = ?1
         ORDER BY created_at ASC, rowid ASC",
    )?;

    let rows = stmt.query_map(params![session_id.to_string()], |row| {
        Ok(MessageRow {
            id: row.get(0)?,
            session_id: row.get(1)?,
            sender_type: row.get(2)?,
            content: row.get(3)?,
            ai_category: row.get(4)?,
            created_at: row.get(5)?,
        })
    })?;

    let mut messages = Vec::new();
    for row in rows {
        messages.push(message_from_row(row?)?);
    }
    Ok(messages)
}

fn message_from_row(row: MessageRow) -> Result<TherapyMessage, DatabaseError> {
    Ok(TherapyMessage {
        id: parse_uuid(&row.id)?,
        session_id: parse_uuid(&row.session_id)?,
        sender_type: SenderType::from_str(&row.sender_type)?,
        content: row.content,
        ai_category: row.ai_category,
        created_at: parse_timestamp(&row.created_at)?,
    })
}
