//! HTTP facade tests: settings round-trip, catalog, execution, error mapping.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    path::PathBuf,
    sync::{Arc, OnceLock},
};

use {
    hikari_config::Settings,
    hikari_gateway::{build_app, state::mcp_config_from, AppState},
    hikari_mcp::McpManager,
};

/// The stub MCP server binary from the mcp crate. A workspace-wide
/// `cargo test` builds it as a side effect; a standalone
/// `cargo test -p hikari-gateway` does not, so build it if it is missing.
fn stub_path() -> String {
    static STUB: OnceLock<String> = OnceLock::new();
    STUB.get_or_init(|| {
        let mut dir = std::env::current_exe().unwrap();
        dir.pop();
        if dir.ends_with("deps") {
            dir.pop();
        }
        let path: PathBuf = dir.join("mcp-stub-server");
        if !path.exists() {
            let status = std::process::Command::new(env!("CARGO"))
                .args(["build", "-p", "hikari-mcp", "--bin", "mcp-stub-server"])
                .status()
                .expect("failed to run cargo build for mcp-stub-server");
            assert!(status.success(), "building mcp-stub-server failed");
        }
        assert!(
            path.exists(),
            "mcp-stub-server not built at {}",
            path.display()
        );
        path.display().to_string()
    })
    .clone()
}

fn settings_json(enabled: bool, servers: &[(&str, &[(&str, &str)])]) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (name, env) in servers {
        let env: serde_json::Map<String, serde_json::Value> = env
            .iter()
            .map(|(k, v)| ((*k).to_string(), serde_json::json!(v)))
            .collect();
        map.insert(
            (*name).to_string(),
            serde_json::json!({ "command": stub_path(), "env": env }),
        );
    }
    serde_json::json!({ "mcpEnabled": enabled, "mcpServers": map })
}

/// Spawn the facade on an ephemeral port. Returns the base URL and the state
/// (kept so tests can inspect the manager directly).
async fn spawn_app(settings: Settings) -> (String, AppState, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let settings_path = dir.path().join("settings.json");

    let manager = Arc::new(McpManager::default());
    manager.reconcile(&mcp_config_from(&settings)).await;

    let state = AppState::new(Arc::clone(&manager), settings, settings_path);
    let app = build_app(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), state, dir)
}

#[tokio::test]
async fn health_reports_mcp_status() {
    let (base, _state, _dir) = spawn_app(Settings::default()).await;

    let body: serde_json::Value = reqwest::get(format!("{base}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["mcp"]["active"], 0);
}

#[tokio::test]
async fn tools_catalog_is_empty_without_servers() {
    let (base, _state, _dir) = spawn_app(Settings::default()).await;

    let body: serde_json::Value = reqwest::get(format!("{base}/api/mcp/tools"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["tools"], serde_json::json!([]));
}

#[tokio::test]
async fn saving_settings_starts_servers_and_serves_tools() {
    let (base, _state, _dir) = spawn_app(Settings::default()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/api/settings"))
        .json(&settings_json(true, &[("echo", &[])]))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(body["mcp"]["active"], 1);

    let body: serde_json::Value = client
        .get(format!("{base}/api/mcp/tools"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = body["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["echo_echo_env", "echo_ping"]);
}

#[tokio::test]
async fn execute_runs_a_tool() {
    let (base, state, _dir) = spawn_app(Settings::default()).await;
    let client = reqwest::Client::new();

    client
        .post(format!("{base}/api/settings"))
        .json(&settings_json(true, &[("echo", &[])]))
        .send()
        .await
        .unwrap();

    let resp = client
        .post(format!("{base}/api/mcp/execute"))
        .json(&serde_json::json!({ "name": "echo_ping", "arguments": {} }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["content"], "pong");
    assert_eq!(body["result"]["content"][0]["text"], "pong");

    state.manager.shutdown_all().await;
}

#[tokio::test]
async fn execute_maps_validation_errors_to_400() {
    let (base, _state, _dir) = spawn_app(Settings::default()).await;
    let client = reqwest::Client::new();

    // No separator at all.
    let resp = client
        .post(format!("{base}/api/mcp/execute"))
        .json(&serde_json::json!({ "name": "ping" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "tool execution failed");
    assert!(body["detail"].as_str().unwrap().contains("ping"));

    // Separator present but no such server running.
    let resp = client
        .post(format!("{base}/api/mcp/execute"))
        .json(&serde_json::json!({ "name": "ghost_ping" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn execute_maps_server_errors_to_500() {
    let (base, state, _dir) = spawn_app(Settings::default()).await;
    let client = reqwest::Client::new();

    client
        .post(format!("{base}/api/settings"))
        .json(&settings_json(true, &[("echo", &[])]))
        .send()
        .await
        .unwrap();

    // Resolves to the echo server, but the tool does not exist there.
    let resp = client
        .post(format!("{base}/api/mcp/execute"))
        .json(&serde_json::json!({ "name": "echo_no_such_tool" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["detail"].as_str().unwrap().contains("unknown tool"));

    state.manager.shutdown_all().await;
}

#[tokio::test]
async fn saved_call_timeout_applies_to_new_servers() {
    let (base, state, _dir) = spawn_app(Settings::default()).await;
    let client = reqwest::Client::new();

    // A 1s timeout saved together with a server that never answers calls.
    let mut settings = settings_json(true, &[("mute", &[("STUB_MUTE_CALLS", "1")])]);
    settings["mcpCallTimeoutSecs"] = serde_json::json!(1);
    client
        .post(format!("{base}/api/settings"))
        .json(&settings)
        .send()
        .await
        .unwrap();

    let resp = client
        .post(format!("{base}/api/mcp/execute"))
        .json(&serde_json::json!({ "name": "mute_ping" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["detail"].as_str().unwrap().contains("within 1s"));

    state.manager.shutdown_all().await;
}

#[tokio::test]
async fn settings_round_trip_redacts_api_key() {
    let mut settings = Settings::default();
    settings.api_key = Some(secrecy_key("sk-secret"));
    let (base, _state, _dir) = spawn_app(settings).await;

    let body: serde_json::Value = reqwest::get(format!("{base}/api/settings"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["apiKey"], "********");
}

fn secrecy_key(value: &str) -> secrecy::Secret<String> {
    secrecy::Secret::new(value.to_string())
}

#[tokio::test]
async fn disabling_mcp_stops_servers() {
    let (base, state, _dir) = spawn_app(Settings::default()).await;
    let client = reqwest::Client::new();

    client
        .post(format!("{base}/api/settings"))
        .json(&settings_json(true, &[("echo", &[])]))
        .send()
        .await
        .unwrap();
    assert_eq!(state.manager.status().await.active, 1);

    let body: serde_json::Value = client
        .post(format!("{base}/api/settings"))
        .json(&settings_json(false, &[("echo", &[])]))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["mcp"]["active"], 0);

    let body: serde_json::Value = client
        .get(format!("{base}/api/mcp/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["enabled"], false);
    assert_eq!(body["active"], 0);
}
