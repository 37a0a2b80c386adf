mod config;
mod github;
mod oauth;
mod routes;
mod session;
mod state;

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// CoShip MCP authorization service: issues encrypted authorization codes
/// for approved MCP clients and redeems them for session tokens.
#[derive(Parser, Debug)]
#[command(name = "coship-mcp-auth", version, about)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Port to listen on (overrides config file)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut cfg = match config::load_config(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    // CLI --port overrides config
    if let Some(port) = cli.port {
        cfg.server.port = port;
    }

    let github = match cfg.github.as_ref().map(github::GitHubAppSource::new) {
        None => None,
        Some(Ok(source)) => Some(github::TokenCache::new(source)),
        Some(Err(e)) => {
            tracing::error!("GitHub App configuration error: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        supabase_url = %cfg.supabase.url,
        github = github.is_some(),
        code_max_age = cfg.server.code_max_age,
        "Configuration loaded successfully"
    );

    let sessions = match session::SupabaseSessionProvider::new(
        &cfg.supabase.url,
        &cfg.supabase.anon_key,
        Duration::from_secs(cfg.supabase.timeout_secs),
    ) {
        Ok(p) => Arc::new(p),
        Err(e) => {
            tracing::error!("Failed to build session client: {e}");
            std::process::exit(1);
        }
    };

    let bind_addr = format!("{}:{}", cfg.server.host, cfg.server.port);
    tracing::info!("Listening on {bind_addr}");
    tracing::info!("Public URL: {}", cfg.server.public_url);

    let app = routes::router(state::AppState::new(cfg, sessions, github));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to bind to {bind_addr}: {e}");
            std::process::exit(1);
        });

    axum::serve(listener, app).await.unwrap_or_else(|e| {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    });
}
