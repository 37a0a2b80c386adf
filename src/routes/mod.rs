pub mod authorize;
pub mod health;
pub mod token;
pub mod well_known;

use crate::state::AppState;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        // Discovery
        .route(
            "/.well-known/oauth-authorization-server",
            get(well_known::authorization_server),
        )
        // Consent and approval
        .route(
            "/mcp/authorize",
            get(authorize::authorize_get).post(authorize::authorize_post),
        )
        // Code redemption
        .route("/api/mcp/token", post(token::token))
        .route("/healthz", get(health::healthz))
        .with_state(state)
}

/// OAuth-style JSON error body.
pub(crate) fn oauth_error(status: StatusCode, error: &str, description: &str) -> Response {
    (
        status,
        Json(serde_json::json!({
            "error": error,
            "error_description": description,
        })),
    )
        .into_response()
}
