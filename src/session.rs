//! Identity-provider session refresh.
//!
//! The approval flow always asks the provider for a fresh session right before
//! sealing a code, so the agent never receives an access token that is already
//! close to expiry or a refresh token the browser has since rotated.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Tokens returned by a successful refresh.
#[derive(Clone, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &"[redacted]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session refresh request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("session refresh returned {0}")]
    Status(StatusCode),
}

#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Exchange `refresh_token` for a new session.
    ///
    /// `Ok(None)` means the provider rejected the token and the user has to sign in again.
    async fn refresh_session(&self, refresh_token: &str) -> Result<Option<Session>, SessionError>;
}

/// Supabase Auth (GoTrue) refresh-token grant.
#[derive(Debug, Clone)]
pub struct SupabaseSessionProvider {
    http: reqwest::Client,
    url: String,
    anon_key: String,
}

impl SupabaseSessionProvider {
    pub fn new(url: &str, anon_key: &str, timeout: Duration) -> Result<Self, SessionError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        })
    }
}

#[async_trait]
impl SessionProvider for SupabaseSessionProvider {
    async fn refresh_session(&self, refresh_token: &str) -> Result<Option<Session>, SessionError> {
        let resp = self
            .http
            .post(format!("{}/auth/v1/token?grant_type=refresh_token", self.url))
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        let status = resp.status();
        if matches!(
            status,
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            tracing::debug!(%status, "Session refresh rejected by provider");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SessionError::Status(status));
        }

        Ok(Some(resp.json::<Session>().await?))
    }
}

/// Provider that answers every refresh with the same result.
#[cfg(test)]
pub(crate) struct FixedSession(pub Option<Session>);

#[cfg(test)]
#[async_trait]
impl SessionProvider for FixedSession {
    async fn refresh_session(&self, _: &str) -> Result<Option<Session>, SessionError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn provider(url: &str) -> SupabaseSessionProvider {
        SupabaseSessionProvider::new(url, "anon-key", Duration::from_secs(10)).unwrap()
    }

    #[tokio::test]
    async fn test_refresh_returns_session() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/v1/token")
            .match_query(Matcher::UrlEncoded(
                "grant_type".into(),
                "refresh_token".into(),
            ))
            .match_header("apikey", "anon-key")
            .match_body(Matcher::Json(serde_json::json!({ "refresh_token": "rt-old" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"access_token":"at-new","refresh_token":"rt-new","expires_in":3600,"token_type":"bearer","user":{"id":"u1"}}"#,
            )
            .create_async()
            .await;

        let provider = provider(&server.url());
        let session = provider.refresh_session("rt-old").await.unwrap().unwrap();
        assert_eq!(session.access_token, "at-new");
        assert_eq!(session.refresh_token, "rt-new");
        assert_eq!(session.expires_in, 3600);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_refresh_is_no_session() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/auth/v1/token")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let provider = provider(&server.url());
        assert!(provider.refresh_session("rt-used").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_server_error_is_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/auth/v1/token")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let provider = provider(&server.url());
        let err = provider.refresh_session("rt").await.unwrap_err();
        assert!(matches!(err, SessionError::Status(StatusCode::SERVICE_UNAVAILABLE)));
    }
}
