use serde::Deserialize;
use std::path::Path;

/// Top-level configuration parsed from TOML.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub supabase: SupabaseConfig,
    #[serde(default)]
    pub github: Option<GitHubConfig>,
}

/// Server-level configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub public_url: String,
    /// Where unauthenticated users are sent to sign in.
    #[serde(default = "default_login_url")]
    pub login_url: String,
    /// Shared secret for sealing authorization codes. The token endpoint also
    /// accepts it as the internal client's secret.
    #[serde(default)]
    pub api_secret: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Oldest authorization code (seconds since `created_at`) the token endpoint redeems.
    #[serde(default = "default_code_max_age")]
    pub code_max_age: u64,
    /// When non-empty, redirect URIs must start with one of these.
    #[serde(default)]
    pub allowed_redirect_prefixes: Vec<String>,
    /// Cookie holding the user's identity-provider refresh token.
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_login_url() -> String {
    "/login".to_string()
}

fn default_client_id() -> String {
    "coship-internal".to_string()
}

fn default_code_max_age() -> u64 {
    300
}

fn default_session_cookie() -> String {
    "sb-refresh-token".to_string()
}

#[derive(Debug, Deserialize)]
pub struct SupabaseConfig {
    pub url: String,
    #[serde(default)]
    pub anon_key: String,
    /// Per-request timeout for session refresh calls (seconds).
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

/// GitHub App used for installation tokens.
#[derive(Debug, Deserialize)]
pub struct GitHubConfig {
    pub app_id: String,
    pub installation_id: String,
    #[serde(default)]
    pub private_key: String,
    #[serde(default = "default_github_api_url")]
    pub api_url: String,
    /// Per-request timeout for GitHub API calls (seconds).
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_http_timeout() -> u64 {
    10
}

/// Load and validate config from a TOML file, applying environment variable overrides.
pub fn load_config(path: &Path) -> Result<Config, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

    let mut config: Config =
        toml::from_str(&content).map_err(|e| format!("Failed to parse TOML config: {e}"))?;

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    validate(&config)?;

    Ok(config)
}

/// Apply environment variable overrides.
fn apply_env_overrides(config: &mut Config, env: impl Fn(&str) -> Option<String>) {
    if let Some(val) = env("COSHIP_API_SECRET") {
        config.server.api_secret = val;
    }
    if let Some(val) = env("COSHIP_SUPABASE_ANON_KEY") {
        config.supabase.anon_key = val;
    }
    if let Some(github) = config.github.as_mut() {
        if let Some(val) = env("COSHIP_GITHUB_APP_PRIVATE_KEY") {
            github.private_key = val;
        }
    }
}

/// Validate the entire configuration. Returns an error string on failure.
fn validate(config: &Config) -> Result<(), String> {
    validate_server(&config.server)?;
    validate_supabase(&config.supabase)?;
    if let Some(github) = &config.github {
        validate_github(github)?;
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), String> {
    if server.public_url.is_empty() {
        return Err("server.public_url is required".to_string());
    }

    if server.public_url.ends_with('/') {
        return Err("server.public_url must not have a trailing slash".to_string());
    }

    // Warn (but allow) http:// for local dev; require https:// otherwise
    if server.public_url.starts_with("http://") {
        tracing::warn!(
            "server.public_url uses http://; HTTPS is required for production deployments"
        );
    } else if !server.public_url.starts_with("https://") {
        return Err(
            "server.public_url must start with https:// (or http:// for local dev)".to_string(),
        );
    }

    // Any string works as a key source, but short ones are easy to guess.
    if server.api_secret.is_empty() {
        return Err(
            "server.api_secret is required (or set COSHIP_API_SECRET). Generate with: openssl rand -base64 32"
                .to_string(),
        );
    }
    if server.api_secret.len() < 32 {
        tracing::warn!(
            len = server.api_secret.len(),
            "server.api_secret is shorter than 32 characters"
        );
    }

    if server.client_id.is_empty() {
        return Err("server.client_id must not be empty".to_string());
    }

    if server.code_max_age == 0 {
        return Err("server.code_max_age must be greater than 0".to_string());
    }

    if server.session_cookie.is_empty() {
        return Err("server.session_cookie must not be empty".to_string());
    }

    for prefix in &server.allowed_redirect_prefixes {
        if !prefix.starts_with("http://") && !prefix.starts_with("https://") {
            return Err(format!(
                "server.allowed_redirect_prefixes: '{prefix}' must be an HTTP(S) URL prefix"
            ));
        }
    }

    Ok(())
}

fn validate_supabase(supabase: &SupabaseConfig) -> Result<(), String> {
    if !supabase.url.starts_with("http://") && !supabase.url.starts_with("https://") {
        return Err("supabase.url must be a valid HTTP(S) URL".to_string());
    }
    if supabase.anon_key.is_empty() {
        return Err(
            "supabase.anon_key is required (or set COSHIP_SUPABASE_ANON_KEY)".to_string(),
        );
    }
    if supabase.timeout_secs == 0 {
        return Err("supabase.timeout_secs must be greater than 0".to_string());
    }
    Ok(())
}

fn validate_github(github: &GitHubConfig) -> Result<(), String> {
    let missing: Vec<&str> = [
        ("app_id", github.app_id.as_str()),
        ("installation_id", github.installation_id.as_str()),
        ("private_key", github.private_key.as_str()),
    ]
    .iter()
    .filter(|(_, v)| v.is_empty())
    .map(|(k, _)| *k)
    .collect();

    if !missing.is_empty() {
        return Err(format!("[github] requires: {}", missing.join(", ")));
    }
    if github.timeout_secs == 0 {
        return Err("github.timeout_secs must be greater than 0".to_string());
    }
    Ok(())
}
