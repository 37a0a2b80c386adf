pub mod installation;
pub mod token_cache;

pub use installation::GitHubAppSource;
pub use token_cache::TokenCache;

#[derive(Debug, thiserror::Error)]
pub enum GitHubError {
    #[error("invalid GitHub App private key: {0}")]
    InvalidKey(#[source] jsonwebtoken::errors::Error),
    #[error("failed to sign GitHub App JWT: {0}")]
    Jwt(#[source] jsonwebtoken::errors::Error),
    #[error("GitHub request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to get installation token: {status} {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}
