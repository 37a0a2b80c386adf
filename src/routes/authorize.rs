use super::oauth_error;
use crate::oauth::authorize::{approve, ApprovalRequest, AuthorizeError};
use crate::state::AppState;
use axum::extract::{Form, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

const PERMISSIONS: [&str; 3] = [
    "Access your CoShip MCP tools and skills",
    "Act on your behalf within your subscription tier",
    "Read your account information",
];

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub redirect_uri: String,
    #[serde(default)]
    pub state: String,
    #[serde(default = "default_response_type")]
    pub response_type: String,
    pub scope: Option<String>,
}

fn default_response_type() -> String {
    "code".to_string()
}

impl AuthorizeQuery {
    /// `/mcp/authorize?...` with every parameter that was supplied.
    fn return_to(&self) -> String {
        let mut qs = url::form_urlencoded::Serializer::new(String::new());
        qs.append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("state", &self.state)
            .append_pair("response_type", &self.response_type);
        if let Some(scope) = &self.scope {
            qs.append_pair("scope", scope);
        }
        format!("/mcp/authorize?{}", qs.finish())
    }
}

fn login_redirect(login_url: &str, return_to: Option<&str>) -> Response {
    let target = match return_to {
        Some(rt) => {
            let sep = if login_url.contains('?') { '&' } else { '?' };
            format!("{login_url}{sep}returnTo={}", urlencoding::encode(rt))
        }
        None => login_url.to_string(),
    };
    Redirect::to(&target).into_response()
}

/// GET /mcp/authorize: consent summary, or a trip through sign-in first
pub async fn authorize_get(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<AuthorizeQuery>,
) -> Response {
    if query.response_type != "code" {
        return oauth_error(
            StatusCode::BAD_REQUEST,
            "unsupported_response_type",
            "only response_type=code is supported",
        );
    }

    let server = &state.config.server;
    if jar.get(&server.session_cookie).is_none() {
        return login_redirect(&server.login_url, Some(&query.return_to()));
    }

    Json(serde_json::json!({
        "client_id": query.client_id,
        "redirect_uri": query.redirect_uri,
        "scope": query.scope,
        "permissions": PERMISSIONS,
    }))
    .into_response()
}

/// POST /mcp/authorize: user approved; redirect back with a code
pub async fn authorize_post(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(request): Form<ApprovalRequest>,
) -> Response {
    let server = &state.config.server;
    let refresh_token = jar.get(&server.session_cookie).map(|c| c.value());

    match approve(
        state.sessions.as_ref(),
        refresh_token,
        &server.api_secret,
        &server.allowed_redirect_prefixes,
        &request,
    )
    .await
    {
        Ok(url) => Redirect::to(&url).into_response(),
        Err(AuthorizeError::NoSession) => {
            tracing::warn!("Authorization approval without a valid session");
            login_redirect(&server.login_url, None)
        }
        Err(e @ AuthorizeError::InvalidRedirect) => {
            tracing::warn!(error = %e, "Authorization approval rejected");
            oauth_error(StatusCode::BAD_REQUEST, "invalid_request", e.user_message())
        }
        Err(e) => {
            tracing::warn!(error = %e, "Authorization approval failed");
            oauth_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                e.user_message(),
            )
        }
    }
}
