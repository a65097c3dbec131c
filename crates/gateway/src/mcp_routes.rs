//! MCP tool routes: catalog listing, execution, manager status.

use {
    axum::{
        extract::State,
        http::StatusCode,
        response::{IntoResponse, Json},
        routing::{get, post},
        Router,
    },
    serde::Deserialize,
    tracing::{info, warn},
};

use crate::state::AppState;

pub fn mcp_router() -> Router<AppState> {
    Router::new()
        .route("/tools", get(list_tools_handler))
        .route("/execute", post(execute_handler))
        .route("/status", get(status_handler))
}

/// Aggregated catalog of all running servers, under namespaced names.
async fn list_tools_handler(State(state): State<AppState>) -> impl IntoResponse {
    let tools = state.manager.list_all_tools().await;
    Json(serde_json::json!({ "tools": tools }))
}

async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.manager.status().await)
}

#[derive(Debug, Deserialize)]
struct ExecuteRequest {
    /// Namespaced tool name, `{server}_{tool}`.
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

/// Execute one tool call and return its result.
///
/// Client mistakes (bad name, unknown server) are 400; everything that went
/// wrong past the facade (launch, timeout, server error) is 500.
async fn execute_handler(
    State(state): State<AppState>,
    Json(req): Json<ExecuteRequest>,
) -> impl IntoResponse {
    let arguments = if req.arguments.is_null() {
        serde_json::json!({})
    } else {
        req.arguments
    };

    info!(tool = %req.name, "executing MCP tool");
    match state.manager.dispatch(&req.name, arguments).await {
        Ok(result) => {
            let content = result.first_text().map(str::to_string);
            Json(serde_json::json!({
                "success": !result.is_error,
                "content": content,
                "result": result,
            }))
            .into_response()
        }
        Err(e) => {
            warn!(tool = %req.name, error = %e, "MCP tool execution failed");
            let status = if e.is_validation() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (
                status,
                Json(serde_json::json!({
                    "error": "tool execution failed",
                    "detail": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}
