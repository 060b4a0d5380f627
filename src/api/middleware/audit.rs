//! Audit logging middleware.
//!
//! Logs every API request with doctor_id, method, path, and response
//! status. Runs innermost, after auth has injected `DoctorContext`.

use axum::extract::OriginalUri;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::{ApiContext, DoctorContext};

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    // Nested routers strip their prefix; log the path the client sent.
    let path = req
        .extensions()
        .get::<OriginalUri>()
        .map(|OriginalUri(uri)| uri.path().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let ctx = req.extensions().get::<ApiContext>().cloned();
    let doctor_id = req.extensions().get::<DoctorContext>().map(|d| d.doctor.id);

    let response = next.run(req).await;

    if let Some(ctx) = ctx {
        let status = response.status().as_u16();
        ctx.core.log_access(
            doctor_id.as_ref(),
            &format!("{method} {path}"),
            &format!("status:{status}"),
        );
    }

    response
}
