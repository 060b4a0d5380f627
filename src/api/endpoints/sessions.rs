//! Therapy session endpoints.
//!
//! - `GET /api/therapy/sessions`: own sessions, newest first (`?patientId=`)
//! - `POST /api/therapy/sessions`: open a session for a patient
//! - `POST /api/therapy/sessions/:id/chat`: doctor message, prediction, AI reply

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext, DoctorContext};
use crate::db;
use crate::models::{TherapySession, TherapySessionWithPatient};
use crate::therapy::{self, RelayOutcome};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionListQuery {
    #[serde(alias = "patient_id")]
    pub patient_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[serde(alias = "patient_id")]
    pub patient_id: String,
}

#[derive(Deserialize)]
pub struct ChatRequest {
    #[serde(alias = "message")]
    pub content: String,
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<DoctorContext>,
    query: Result<Query<SessionListQuery>, QueryRejection>,
) -> Result<Json<Vec<TherapySessionWithPatient>>, ApiError> {
    let Query(query) = query?;
    let patient_id = query
        .patient_id
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .map(parse_id)
        .transpose()?;

    let conn = ctx.core.open_db()?;
    let sessions = db::list_therapy_sessions(&conn, session.id(), patient_id.as_ref())?;
    Ok(Json(sessions))
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<DoctorContext>,
    payload: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TherapySession>), ApiError> {
    let Json(request) = payload?;
    let patient_id = parse_id(&request.patient_id)?;
    let conn = ctx.core.open_db()?;
    let created = therapy::create_session(&conn, session.id(), &patient_id)?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Server-side relay. The doctor message is kept even when prediction fails.
pub async fn chat(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<DoctorContext>,
    Path(id): Path<String>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RelayOutcome>), ApiError> {
    let session_id = parse_id(&id)?;
    let Json(request) = payload?;

    let core = ctx.core.clone();
    let outcome = therapy::relay_message(
        || db::open_database(core.db_path()),
        core.predictor(),
        session.id(),
        &session_id,
        &request.content,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(outcome)))
}
