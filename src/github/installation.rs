//! GitHub App installation tokens.
//!
//! The App authenticates with a short RS256 JWT signed by its private key and
//! trades it for an installation token scoped to one account/organization.

use super::token_cache::{CachedToken, TokenSource};
use super::GitHubError;
use crate::config::GitHubConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_VERSION: &str = "2022-11-28";

#[derive(Debug, Serialize)]
struct AppClaims<'a> {
    iat: i64,
    exp: i64,
    iss: &'a str,
}

#[derive(Debug, Deserialize)]
struct InstallationTokenResponse {
    token: String,
    expires_at: DateTime<Utc>,
}

pub struct GitHubAppSource {
    http: reqwest::Client,
    api_url: String,
    app_id: String,
    installation_id: String,
    key: EncodingKey,
}

impl GitHubAppSource {
    pub fn new(config: &GitHubConfig) -> Result<Self, GitHubError> {
        let pem = normalize_pem(&config.private_key);
        let key = EncodingKey::from_rsa_pem(pem.as_bytes()).map_err(GitHubError::InvalidKey)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            app_id: config.app_id.clone(),
            installation_id: config.installation_id.clone(),
            key,
        })
    }

    fn app_jwt(&self) -> Result<String, GitHubError> {
        let claims = app_claims(&self.app_id, Utc::now().timestamp());
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(GitHubError::Jwt)
    }
}

#[async_trait]
impl TokenSource for GitHubAppSource {
    async fn fetch(&self) -> Result<CachedToken, GitHubError> {
        let jwt = self.app_jwt()?;
        let resp = self
            .http
            .post(format!(
                "{}/app/installations/{}/access_tokens",
                self.api_url, self.installation_id
            ))
            .bearer_auth(jwt)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("User-Agent", "coship-mcp-auth")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GitHubError::Status { status, body });
        }

        let data: InstallationTokenResponse = resp.json().await?;
        Ok(CachedToken {
            token: data.token,
            expires_at: data.expires_at,
        })
    }
}

/// Backdated by a minute for clock drift; GitHub caps App JWTs at ten minutes.
fn app_claims(app_id: &str, now: i64) -> AppClaims<'_> {
    AppClaims {
        iat: now - 60,
        exp: now + 10 * 60,
        iss: app_id,
    }
}

/// Keys pasted into env vars often arrive quoted and with literal `\n`.
fn normalize_pem(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .replace("\\n", "\n")
}
