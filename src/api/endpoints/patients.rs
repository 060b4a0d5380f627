//! Patient endpoints.
//!
//! - `GET /api/patients`: own patients, newest first (`?limit=`)
//! - `POST /api/patients`: create
//! - `GET|PUT|DELETE /api/patients/:id`: single record, 404 unless owned

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext, DoctorContext};
use crate::db;
use crate::models::Patient;
use crate::patients::{self, PatientInput};

#[derive(Deserialize)]
pub struct PatientListQuery {
    pub limit: Option<u32>,
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<DoctorContext>,
    query: Result<Query<PatientListQuery>, QueryRejection>,
) -> Result<Json<Vec<Patient>>, ApiError> {
    let Query(query) = query?;
    let conn = ctx.core.open_db()?;
    let patients = db::list_patients(&conn, session.id(), query.limit)?;
    Ok(Json(patients))
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<DoctorContext>,
    payload: Result<Json<PatientInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    let Json(input) = payload?;
    let conn = ctx.core.open_db()?;
    let patient = patients::create_patient(&conn, session.id(), &input)?;
    Ok((StatusCode::CREATED, Json(patient)))
}

pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<DoctorContext>,
    Path(id): Path<String>,
) -> Result<Json<Patient>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(patients::get_patient(&conn, session.id(), &id)?))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<DoctorContext>,
    Path(id): Path<String>,
    payload: Result<Json<PatientInput>, JsonRejection>,
) -> Result<Json<Patient>, ApiError> {
    let id = parse_id(&id)?;
    let Json(input) = payload?;
    let conn = ctx.core.open_db()?;
    Ok(Json(patients::update_patient(&conn, session.id(), &id, &input)?))
}

pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<DoctorContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    patients::delete_patient(&conn, session.id(), &id)?;
    Ok(StatusCode::NO_CONTENT)
}
