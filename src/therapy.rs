//! Therapy sessions and the doctor → prediction → AI message relay.

use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::db::{self, DatabaseError};
use crate::models::enums::SenderType;
use crate::models::{Prediction, TherapyMessage, TherapySession};
use crate::prediction::{PredictionError, Predictor};
use crate::validation::{self, MAX_CATEGORY_LENGTH};

#[derive(Debug, thiserror::Error)]
pub enum TherapyError {
    #[error("Access denied to therapy session")]
    AccessDenied,
    #[error("Patient not found")]
    PatientNotFound,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Prediction(#[from] PredictionError),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// A message as submitted by a client, before validation.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub session_id: Uuid,
    pub content: String,
    pub sender_type: SenderType,
    pub ai_category: Option<String>,
}

/// Both halves of one relay round.
#[derive(Debug, Clone, Serialize)]
pub struct RelayOutcome {
    pub doctor_message: TherapyMessage,
    pub ai_message: TherapyMessage,
}

/// Open a session for one of the doctor's patients.
pub fn create_session(
    conn: &Connection,
    doctor_id: &Uuid,
    patient_id: &Uuid,
) -> Result<TherapySession, TherapyError> {
    if db::get_patient(conn, doctor_id, patient_id)?.is_none() {
        return Err(TherapyError::PatientNotFound);
    }

    let session = TherapySession {
        id: Uuid::new_v4(),
        patient_id: *patient_id,
        doctor_id: *doctor_id,
        created_at: db::now_utc(),
    };
    db::insert_therapy_session(conn, &session)?;

    tracing::info!(session_id = %session.id, doctor_id = %doctor_id, "Therapy session created");
    Ok(session)
}

/// Messages of a session the doctor owns, oldest first.
pub fn list_messages(
    conn: &Connection,
    doctor_id: &Uuid,
    session_id: &Uuid,
) -> Result<Vec<TherapyMessage>, TherapyError> {
    ensure_owned(conn, doctor_id, session_id)?;
    Ok(db::list_therapy_messages(conn, session_id)?)
}

/// Validate and store a single message.
pub fn add_message(
    conn: &Connection,
    doctor_id: &Uuid,
    new: &NewMessage,
) -> Result<TherapyMessage, TherapyError> {
    ensure_owned(conn, doctor_id, &new.session_id)?;

    let content = validation::message_content(&new.content).map_err(TherapyError::Validation)?;
    let ai_category = check_category(new.sender_type, new.ai_category.as_deref())?;

    let message = TherapyMessage {
        id: Uuid::new_v4(),
        session_id: new.session_id,
        sender_type: new.sender_type,
        content,
        ai_category,
        created_at: db::now_utc(),
    };
    db::insert_therapy_message(conn, &message)?;
    Ok(message)
}

/// Store the doctor's message, ask the predictor about it, store the answer.
///
/// The connection is reopened around the prediction call so none is held
/// while waiting on the network. A failed prediction leaves the doctor's
/// message in place and is returned as the error.
pub async fn relay_message<F>(
    open_db: F,
    predictor: &dyn Predictor,
    doctor_id: &Uuid,
    session_id: &Uuid,
    content: &str,
) -> Result<RelayOutcome, TherapyError>
where
    F: Fn() -> Result<Connection, DatabaseError>,
{
    let doctor_message = {
        let conn = open_db()?;
        add_message(
            &conn,
            doctor_id,
            &NewMessage {
                session_id: *session_id,
                content: content.to_string(),
                sender_type: SenderType::Doctor,
                ai_category: None,
            },
        )?
    };

    let prediction = match predictor.predict(&doctor_message.content).await {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(session_id = %session_id, "Prediction failed: {e}");
            return Err(e.into());
        }
    };

    if prediction.advice.trim().is_empty() {
        tracing::warn!(session_id = %session_id, "Prediction returned no advice");
        return Err(PredictionError::MalformedResponse("empty advice".into()).into());
    }

    let ai_message = {
        let conn = open_db()?;
        store_ai_reply(&conn, doctor_id, session_id, prediction)?
    };

    tracing::debug!(session_id = %session_id, "Relay round complete");
    Ok(RelayOutcome {
        doctor_message,
        ai_message,
    })
}

/// Service output is stored as-is: the client message bounds do not apply.
fn store_ai_reply(
    conn: &Connection,
    doctor_id: &Uuid,
    session_id: &Uuid,
    prediction: Prediction,
) -> Result<TherapyMessage, TherapyError> {
    ensure_owned(conn, doctor_id, session_id)?;
    let ai_category =
        check_category(SenderType::Ai, Some(&prediction.category)).map_err(|e| match e {
            TherapyError::Validation(msg) => PredictionError::MalformedResponse(msg).into(),
            other => other,
        })?;

    let message = TherapyMessage {
        id: Uuid::new_v4(),
        session_id: *session_id,
        sender_type: SenderType::Ai,
        content: prediction.advice.trim().to_string(),
        ai_category,
        created_at: db::now_utc(),
    };
    db::insert_therapy_message(conn, &message)?;
    Ok(message)
}

fn ensure_owned(conn: &Connection, doctor_id: &Uuid, session_id: &Uuid) -> Result<(), TherapyError> {
    match db::get_therapy_session(conn, doctor_id, session_id)? {
        Some(_) => Ok(()),
        None => Err(TherapyError::AccessDenied),
    }
}

fn check_category(sender: SenderType, raw: Option<&str>) -> Result<Option<String>, TherapyError> {
    let category = raw.map(str::trim).filter(|c| !c.is_empty());
    match (sender, category) {
        (_, None) => Ok(None),
        (SenderType::Ai, Some(c)) if c.chars().count() > MAX_CATEGORY_LENGTH => Err(
            TherapyError::Validation(format!("Category too long (max {MAX_CATEGORY_LENGTH} chars)")),
        ),
        (SenderType::Ai, Some(c)) => Ok(Some(c.to_string())),
        (other, Some(_)) => Err(TherapyError::Validation(format!(
            "Only AI messages carry a category, not {other} messages"
        ))),
    }
}
