//! Settings document routes: read (redacted) and save + reconcile.

use {
    axum::{
        extract::State,
        http::StatusCode,
        response::{IntoResponse, Json},
        routing::get,
        Router,
    },
    tracing::{error, info},
};

use hikari_config::Settings;

use crate::state::{mcp_config_from, AppState};

const REDACTED: &str = "********";

pub fn settings_router() -> Router<AppState> {
    Router::new().route("/", get(get_settings_handler).post(save_settings_handler))
}

/// Current settings with the API key redacted. The real key never leaves the
/// process through this route.
async fn get_settings_handler(State(state): State<AppState>) -> impl IntoResponse {
    let settings = state.settings.read().await;
    match serde_json::to_value(&*settings) {
        Ok(mut value) => {
            if value.get("apiKey").is_some() {
                value["apiKey"] = serde_json::Value::String(REDACTED.into());
            }
            Json(value).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": "failed to serialize settings", "detail": e.to_string() })),
        )
            .into_response(),
    }
}

/// Replace the settings document, persist it, and reconcile the MCP manager
/// against the new desired state.
///
/// A redacted API key in the incoming document means "keep the stored key";
/// the UI round-trips what GET returned.
async fn save_settings_handler(
    State(state): State<AppState>,
    Json(mut incoming): Json<Settings>,
) -> impl IntoResponse {
    {
        let current = state.settings.read().await;
        let redacted = incoming
            .api_key_value()
            .is_some_and(|k| k == REDACTED);
        if redacted {
            incoming.api_key = current.api_key.clone();
        }
    }

    if let Err(e) = hikari_config::save_settings(&state.settings_path, &incoming) {
        error!(path = %state.settings_path.display(), error = %e, "failed to save settings");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": "failed to save settings", "detail": e.to_string() })),
        )
            .into_response();
    }

    let config = mcp_config_from(&incoming);
    let timeout = std::time::Duration::from_secs(incoming.mcp_call_timeout_secs());
    {
        let mut settings = state.settings.write().await;
        *settings = incoming;
    }

    info!(
        enabled = config.enabled,
        servers = config.servers.len(),
        "settings saved, reconciling MCP servers"
    );
    // New timeout applies to servers started by this reconciliation.
    state.manager.set_call_timeout(timeout).await;
    state.manager.reconcile(&config).await;

    Json(serde_json::json!({ "ok": true, "mcp": state.manager.status().await })).into_response()
}
