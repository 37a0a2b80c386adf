//! Approval step of the MCP authorize flow.
//!
//! When the signed-in user approves the agent, their session is refreshed,
//! sealed into an authorization code and handed back to the client through
//! its redirect URI together with the `state` it sent us.

use super::codes::{encrypt_auth_code, AuthorizationPayload, CodeError};
use super::unix_millis;
use crate::session::{SessionError, SessionProvider};
use serde::Deserialize;
use url::Url;

pub const GENERIC_FAILURE: &str = "Failed to authorize. Please try again.";

/// Form submitted when the user clicks "Authorize".
#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalRequest {
    pub redirect_uri: String,
    pub state: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthorizeError {
    #[error("API secret is not configured")]
    MissingSecret,
    #[error("redirect_uri is not allowed")]
    InvalidRedirect,
    #[error("no active session")]
    NoSession,
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("failed to encode authorization code: {0}")]
    Encode(#[from] CodeError),
}

impl AuthorizeError {
    /// What the end user gets to see. Identical for every failure.
    pub fn user_message(&self) -> &'static str {
        GENERIC_FAILURE
    }
}

/// Refresh the user's session, seal it into a code and build the redirect.
pub async fn approve(
    sessions: &dyn SessionProvider,
    refresh_token: Option<&str>,
    secret: &str,
    allowed_redirects: &[String],
    request: &ApprovalRequest,
) -> Result<String, AuthorizeError> {
    if secret.is_empty() {
        return Err(AuthorizeError::MissingSecret);
    }
    if !redirect_allowed(&request.redirect_uri, allowed_redirects) {
        return Err(AuthorizeError::InvalidRedirect);
    }

    let refresh_token = refresh_token
        .filter(|t| !t.is_empty())
        .ok_or(AuthorizeError::NoSession)?;
    let session = sessions
        .refresh_session(refresh_token)
        .await?
        .ok_or(AuthorizeError::NoSession)?;

    let payload = AuthorizationPayload {
        access_token: session.access_token,
        refresh_token: session.refresh_token,
        expires_in: session.expires_in,
        created_at: unix_millis(),
    };
    let code = encrypt_auth_code(&payload, secret)?;

    tracing::info!(expires_in = payload.expires_in, "Issued authorization code");
    Ok(build_redirect_url(&request.redirect_uri, &code, &request.state))
}

/// Append `code` and `state` to `redirect_uri`, keeping any existing query.
pub fn build_redirect_url(redirect_uri: &str, code: &str, state: &str) -> String {
    let sep = if redirect_uri.contains('?') { '&' } else { '?' };
    format!(
        "{redirect_uri}{sep}code={}&state={}",
        urlencoding::encode(code),
        urlencoding::encode(state)
    )
}

/// The redirect must be an absolute http(s) URL and, when prefixes are
/// configured, fall under one of them.
fn redirect_allowed(redirect_uri: &str, allowed: &[String]) -> bool {
    let target = match Url::parse(redirect_uri) {
        Ok(u) if u.scheme() == "http" || u.scheme() == "https" => u,
        _ => return false,
    };
    allowed.is_empty() || allowed.iter().any(|p| under_prefix(&target, p))
}

/// Same origin as `prefix`, and a path equal to the prefix path or below it
/// at a `/` boundary.
fn under_prefix(target: &Url, prefix: &str) -> bool {
    let Ok(prefix) = Url::parse(prefix) else {
        return false;
    };
    if target.scheme() != prefix.scheme()
        || target.host_str() != prefix.host_str()
        || target.port_or_known_default() != prefix.port_or_known_default()
    {
        return false;
    }

    let base = prefix.path().trim_end_matches('/');
    let path = target.path();
    base.is_empty()
        || path == base
        || path
            .strip_prefix(base)
            .is_some_and(|rest| rest.starts_with('/'))
}
