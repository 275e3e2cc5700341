//! Router assembly: JSON endpoints, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - JSON API under `/api/v1/...`
/// - CORS (allow any origin/method/headers); adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/subjects", get(http::http_get_subjects))
        .route("/api/v1/subjects/:subject_id/steps", get(http::http_get_steps))
        .route("/api/v1/steps/:step_id/exercises", get(http::http_get_exercises))
        .route("/api/v1/subjects/:subject_id/flash", get(http::http_get_flash))
        .route("/api/v1/steps/:step_id/test", get(http::http_get_test))
        .route("/api/v1/steps/submit", post(http::http_post_step_submit))
        .route("/api/v1/tests/submit", post(http::http_post_test_submit))
        .route("/api/v1/exercises/recipe", post(http::http_post_recipe))
        .route("/api/v1/admin/reload", post(http::http_post_reload))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}
