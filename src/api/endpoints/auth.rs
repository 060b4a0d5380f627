//! Account endpoints.
//!
//! `POST /api/auth/register` and `POST /api/auth/login` are unprotected;
//! `logout` and `me` require a bearer session.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, DoctorContext};
use crate::auth::{self, AuthError, RegisterDoctor};
use crate::models::Doctor;
use crate::validation;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: NaiveDateTime,
    pub doctor: Doctor,
}

/// `POST /api/auth/register`: create a doctor account.
pub async fn register(
    State(ctx): State<ApiContext>,
    payload: Result<Json<RegisterDoctor>, JsonRejection>,
) -> Result<(StatusCode, Json<Doctor>), ApiError> {
    let Json(request) = payload?;
    let core = ctx.core.clone();

    // PBKDF2 blocks for hundreds of milliseconds.
    let doctor = tokio::task::spawn_blocking(move || -> Result<Doctor, ApiError> {
        let conn = core.open_db()?;
        Ok(auth::register(&conn, &request, core.password_iterations)?)
    })
    .await??;

    Ok((StatusCode::CREATED, Json(doctor)))
}

/// `POST /api/auth/login`: exchange credentials for a bearer token.
pub async fn login(
    State(ctx): State<ApiContext>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(request) = payload?;
    let throttle_key = validation::normalize_email(&request.email)
        .unwrap_or_else(|_| request.email.trim().to_lowercase());

    ctx.core
        .login_throttle()?
        .begin_attempt(&throttle_key)
        .map_err(|retry_after| ApiError::from(AuthError::LockedOut { retry_after }))?;

    let core = ctx.core.clone();
    let result = tokio::task::spawn_blocking(move || -> Result<auth::LoginOutcome, ApiError> {
        let conn = core.open_db()?;
        Ok(auth::login(
            &conn,
            &request.email,
            &request.password,
            core.session_ttl,
            core.password_iterations,
        )?)
    })
    .await
    .map_err(ApiError::from)
    .and_then(|r| r);

    let mut throttle = ctx.core.login_throttle()?;
    match result {
        Ok(outcome) => {
            throttle.clear(&throttle_key);
            Ok(Json(LoginResponse {
                token: outcome.token,
                expires_at: outcome.expires_at,
                doctor: outcome.doctor,
            }))
        }
        Err(ApiError::InvalidCredentials) => {
            throttle.record_failure(&throttle_key);
            Err(ApiError::InvalidCredentials)
        }
        Err(e) => {
            throttle.release(&throttle_key);
            Err(e)
        }
    }
}

/// `POST /api/auth/logout`: end the current session.
pub async fn logout(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<DoctorContext>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    auth::logout(&conn, &session.token)?;
    tracing::info!(doctor_id = %session.id(), "Doctor logged out");
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/auth/me`: the authenticated doctor.
pub async fn me(Extension(session): Extension<DoctorContext>) -> Json<Doctor> {
    Json(session.doctor)
}
