//! Therapy message endpoints.
//!
//! - `GET /api/therapy/messages?sessionId=`: messages of an owned session
//! - `POST /api/therapy/messages`: append a message

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext, DoctorContext};
use crate::models::enums::SenderType;
use crate::models::TherapyMessage;
use crate::therapy::{self, NewMessage};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageListQuery {
    #[serde(alias = "session_id")]
    pub session_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageRequest {
    #[serde(alias = "session_id")]
    pub session_id: String,
    pub content: String,
    #[serde(alias = "sender_type")]
    pub sender_type: SenderType,
    #[serde(default, alias = "ai_category")]
    pub ai_category: Option<String>,
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<DoctorContext>,
    query: Result<Query<MessageListQuery>, QueryRejection>,
) -> Result<Json<Vec<TherapyMessage>>, ApiError> {
    let Query(query) = query?;
    let raw = query
        .session_id
        .filter(|raw| !raw.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Session ID is required".into()))?;
    let session_id = parse_id(&raw)?;

    let conn = ctx.core.open_db()?;
    let messages = therapy::list_messages(&conn, session.id(), &session_id)?;
    Ok(Json(messages))
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<DoctorContext>,
    payload: Result<Json<CreateMessageRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TherapyMessage>), ApiError> {
    let Json(request) = payload?;
    let new = NewMessage {
        session_id: parse_id(&request.session_id)?,
        content: request.content,
        sender_type: request.sender_type,
        ai_category: request.ai_category,
    };

    let conn = ctx.core.open_db()?;
    let message = therapy::add_message(&conn, session.id(), &new)?;
    Ok((StatusCode::CREATED, Json(message)))
}
