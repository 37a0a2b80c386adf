use super::oauth_error;
use crate::oauth::codes::{decrypt_auth_code, AuthorizationPayload};
use crate::oauth::unix_millis;
use crate::state::AppState;
use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub refresh_token: String,
}

/// Compares digests so timing doesn't reveal how much of the secret matched.
fn secrets_match(given: &str, expected: &str) -> bool {
    Sha256::digest(given.as_bytes()) == Sha256::digest(expected.as_bytes())
}

/// POST /api/mcp/token: redeem an authorization code
pub async fn token(State(state): State<AppState>, Form(req): Form<TokenRequest>) -> Response {
    let server = &state.config.server;

    if req.grant_type != "authorization_code" {
        return oauth_error(
            StatusCode::BAD_REQUEST,
            "unsupported_grant_type",
            "only authorization_code is supported",
        );
    }

    if req.client_id != server.client_id || !secrets_match(&req.client_secret, &server.api_secret)
    {
        tracing::warn!(client_id = %req.client_id, "Token request with invalid client credentials");
        return oauth_error(
            StatusCode::UNAUTHORIZED,
            "invalid_client",
            "client authentication failed",
        );
    }

    let payload: AuthorizationPayload = match decrypt_auth_code(&req.code, &server.api_secret) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected authorization code");
            return invalid_grant();
        }
    };

    let now = unix_millis();
    let age_ms = now.saturating_sub(payload.created_at);
    if age_ms > server.code_max_age.saturating_mul(1000) {
        tracing::warn!(age_ms, "Rejected expired authorization code");
        return invalid_grant();
    }

    if !state.redeemed.try_redeem(&req.code, payload.created_at, now) {
        tracing::warn!("Rejected replayed authorization code");
        return invalid_grant();
    }

    tracing::info!(expires_in = payload.expires_in, "Redeemed authorization code");
    Json(TokenResponse {
        access_token: payload.access_token,
        token_type: "bearer",
        expires_in: payload.expires_in,
        refresh_token: payload.refresh_token,
    })
    .into_response()
}

fn invalid_grant() -> Response {
    oauth_error(
        StatusCode::BAD_REQUEST,
        "invalid_grant",
        "authorization code is invalid",
    )
}
