use std::net::SocketAddr;

use {
    axum::{
        extract::State,
        response::{IntoResponse, Json},
        routing::get,
        Router,
    },
    tower_http::cors::{Any, CorsLayer},
    tracing::info,
};

use crate::{
    mcp_routes::mcp_router,
    settings_routes::settings_router,
    state::AppState,
};

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the facade router (shared between production startup and tests).
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api/mcp", mcp_router())
        .nest("/api/settings", settings_router())
        .layer(cors)
        .with_state(state)
}

/// Start the loopback HTTP server and serve until ctrl-c.
///
/// Binds 127.0.0.1 only. On shutdown every MCP server is stopped before this
/// returns, so no child process outlives the facade.
pub async fn start_server(state: AppState, port: u16) -> anyhow::Result<()> {
    let manager = state.manager.clone();
    let app = build_app(state);

    let addr: SocketAddr = ([127, 0, 0, 1], port).into();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "hikari facade listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    manager.shutdown_all().await;
    info!("all MCP servers stopped");
    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mcp = state.manager.status().await;
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "mcp": mcp,
    }))
}
