//! `POST /api/therapy`: classify a message without storing anything.
//!
//! Response mirrors the prediction service: `{"message": category, "advice": …}`.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext, DoctorContext};
use crate::models::Prediction;
use crate::patients;
use crate::validation;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyRequest {
    #[serde(default, alias = "patient_id")]
    pub patient_id: Option<String>,
    pub message: String,
}

pub async fn classify(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<DoctorContext>,
    payload: Result<Json<ClassifyRequest>, JsonRejection>,
) -> Result<Json<Prediction>, ApiError> {
    let Json(request) = payload?;
    let text = validation::message_content(&request.message).map_err(ApiError::BadRequest)?;

    if let Some(raw) = request.patient_id.as_deref().filter(|r| !r.trim().is_empty()) {
        let patient_id = parse_id(raw)?;
        let conn = ctx.core.open_db()?;
        patients::get_patient(&conn, session.id(), &patient_id)?;
    }

    let prediction = ctx.core.predictor().predict(&text).await?;
    tracing::debug!(doctor_id = %session.id(), category = %prediction.category, "Message classified");
    Ok(Json(prediction))
}
