//! Memoized short-lived access token.

use super::GitHubError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::Mutex;

/// A cached token is replaced this long before its literal expiry.
pub const REFRESH_BUFFER: Duration = Duration::from_secs(5 * 60);

#[derive(Clone)]
pub struct CachedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedToken")
            .field("token", &"[redacted]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl CachedToken {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        let buffer = chrono::Duration::seconds(REFRESH_BUFFER.as_secs() as i64);
        now < self.expires_at - buffer
    }
}

#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(&self) -> Result<CachedToken, GitHubError>;
}

/// Single-entry cache in front of a [`TokenSource`].
///
/// The lock is held across a refresh, so concurrent callers wait for one fetch
/// instead of each minting their own token.
pub struct TokenCache<S> {
    source: S,
    entry: Mutex<Option<CachedToken>>,
}

impl<S: TokenSource> TokenCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            entry: Mutex::new(None),
        }
    }

    pub async fn get(&self) -> Result<String, GitHubError> {
        let mut entry = self.entry.lock().await;
        if let Some(cached) = entry.as_ref() {
            if cached.is_fresh(Utc::now()) {
                return Ok(cached.token.clone());
            }
        }

        let fresh = self.source.fetch().await?;
        tracing::debug!(expires_at = %fresh.expires_at, "Refreshed installation token");
        let token = fresh.token.clone();
        *entry = Some(fresh);
        Ok(token)
    }
}
