//! Portal API router.
//!
//! Routes are nested under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! CORS → request tracing → rate limiter → auth validator → audit logger

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the portal router with the default rate limits.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn portal_router(core: Arc<CoreState>, cors_origin: &str) -> Router {
    build_router(ApiContext::new(core), cors_origin)
}

pub(crate) fn build_router(ctx: ApiContext, cors_origin: &str) -> Router {
    // Layers are applied from bottom (innermost) to top (outermost).
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route("/auth/logout", post(endpoints::auth::logout))
        .route("/auth/me", get(endpoints::auth::me))
        .route("/dashboard", get(endpoints::dashboard::summary))
        .route(
            "/patients",
            get(endpoints::patients::list).post(endpoints::patients::create),
        )
        .route(
            "/patients/:id",
            get(endpoints::patients::detail)
                .put(endpoints::patients::update)
                .delete(endpoints::patients::remove),
        )
        .route("/therapy", post(endpoints::therapy::classify))
        .route(
            "/therapy/sessions",
            get(endpoints::sessions::list).post(endpoints::sessions::create),
        )
        .route("/therapy/sessions/:id/chat", post(endpoints::sessions::chat))
        .route(
            "/therapy/messages",
            get(endpoints::messages::list).post(endpoints::messages::create),
        )
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx.clone()));

    // Rate-limited only, no auth required
    let unprotected = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/auth/register", post(endpoints::auth::register))
        .route("/auth/login", post(endpoints::auth::login))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx));

    let app = Router::new()
        .nest("/api", protected)
        .nest("/api", unprotected)
        .layer(TraceLayer::new_for_http());

    match cors_layer(cors_origin) {
        Some(cors) => app.layer(cors),
        None => app,
    }
}

/// `*` allows any origin; an unparsable origin disables CORS.
fn cors_layer(origin: &str) -> Option<CorsLayer> {
    let origin = origin.trim();
    if origin.is_empty() {
        return None;
    }
    let allow = if origin == "*" {
        AllowOrigin::any()
    } else {
        match HeaderValue::from_str(origin) {
            Ok(value) => AllowOrigin::exact(value),
            Err(_) => {
                tracing::warn!(origin, "Ignoring invalid CORS origin");
                return None;
            }
        }
    };

    Some(
        CorsLayer::new()
            .allow_origin(allow)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .max_age(std::time::Duration::from_secs(60 * 60)),
    )
}
