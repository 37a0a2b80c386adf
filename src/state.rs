use crate::config::Config;
use crate::github::{GitHubAppSource, TokenCache};
use crate::oauth::replay::RedeemedCodes;
use crate::session::SessionProvider;
use std::sync::Arc;
use std::time::Duration;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<dyn SessionProvider>,
    pub redeemed: Arc<RedeemedCodes>,
    pub github: Option<Arc<TokenCache<GitHubAppSource>>>,
}

impl AppState {
    pub fn new(
        config: Config,
        sessions: Arc<dyn SessionProvider>,
        github: Option<TokenCache<GitHubAppSource>>,
    ) -> Self {
        let max_age = Duration::from_secs(config.server.code_max_age);
        Self {
            config: Arc::new(config),
            sessions,
            redeemed: Arc::new(RedeemedCodes::new(max_age)),
            github: github.map(Arc::new),
        }
    }
}
