use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

/// GET /healthz
pub async fn healthz(State(state): State<AppState>) -> Json<Value> {
    let github = match &state.github {
        None => "unconfigured",
        Some(cache) => match cache.get().await {
            Ok(_) => "ok",
            Err(e) => {
                tracing::warn!(error = %e, "GitHub installation token unavailable");
                "error"
            }
        },
    };

    Json(json!({
        "status": "ok",
        "github": github,
        "redeemed_codes": state.redeemed.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support;

    #[tokio::test]
    async fn test_reports_unconfigured_github() {
        let Json(body) = healthz(State(test_support::state())).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["github"], "unconfigured");
        assert_eq!(body["redeemed_codes"], 0);
    }
}
