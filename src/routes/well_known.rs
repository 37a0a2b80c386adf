use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

/// GET /.well-known/oauth-authorization-server
pub async fn authorization_server(State(state): State<AppState>) -> Json<Value> {
    let base = &state.config.server.public_url;
    Json(json!({
        "issuer": base,
        "authorization_endpoint": format!("{base}/mcp/authorize"),
        "token_endpoint": format!("{base}/api/mcp/token"),
        "response_types_supported": ["code"],
        "grant_types_supported": ["authorization_code"],
        "token_endpoint_auth_methods_supported": ["client_secret_post"],
    }))
}
