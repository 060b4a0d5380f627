//! `GET /api/dashboard`: landing page summary for the signed-in doctor.

use axum::extract::State;
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, DoctorContext};
use crate::db;
use crate::patients::{self, DashboardSummary};

pub async fn summary(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<DoctorContext>,
) -> Result<Json<DashboardSummary>, ApiError> {
    let conn = ctx.core.open_db()?;
    let summary = patients::dashboard(&conn, &session.doctor, &db::now_utc())?;
    Ok(Json(summary))
}
