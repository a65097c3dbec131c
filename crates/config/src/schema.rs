//! Settings schema: provider selection, loopback server, and MCP servers.
//!
//! Field names use camelCase on disk to stay compatible with the settings
//! file the desktop UI writes.

use std::collections::HashMap;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root persisted settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Base URL of the chat-completions endpoint the UI talks to.
    pub api_endpoint: Option<String>,
    /// Provider API key. Redacted in debug output and API responses.
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<Secret<String>>,
    /// Selected model identifier.
    pub model: Option<String>,
    pub server: ServerSettings,
    /// Global MCP on/off switch. When false no tool servers are spawned.
    pub mcp_enabled: bool,
    /// Configured MCP servers, keyed by server name.
    pub mcp_servers: HashMap<String, McpServerEntry>,
    /// Per-call timeout for MCP requests, in seconds. Defaults to 30.
    /// A changed value applies to servers started after the change; running
    /// connections keep the timeout they were spawned with.
    pub mcp_call_timeout_secs: Option<u64>,
}

/// Loopback HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerSettings {
    /// Port to bind on 127.0.0.1.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { port: 8793 }
    }
}

/// Connection kind for an MCP server.
///
/// Only `stdio` is implemented; `sse` is accepted by the schema but rejected
/// when a connection is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Stdio,
    Sse,
}

/// Configuration for a single MCP server.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct McpServerEntry {
    /// Command to spawn the server process.
    pub command: String,
    /// Arguments to the command.
    pub args: Vec<String>,
    /// Environment variables merged over the inherited environment.
    pub env: HashMap<String, String>,
    pub transport: TransportKind,
}

impl Settings {
    /// Effective per-call MCP timeout in seconds.
    pub fn mcp_call_timeout_secs(&self) -> u64 {
        self.mcp_call_timeout_secs.unwrap_or(30)
    }

    /// Exposed API key, if configured.
    pub fn api_key_value(&self) -> Option<&str> {
        self.api_key.as_ref().map(|k| k.expose_secret().as_str())
    }
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn defaults_are_sane() {
        let s = Settings::default();
        assert!(!s.mcp_enabled);
        assert!(s.mcp_servers.is_empty());
        assert_eq!(s.server.port, 8793);
        assert_eq!(s.mcp_call_timeout_secs(), 30);
    }

    #[test]
    fn parses_camel_case_settings() {
        let json = r#"{
            "apiEndpoint": "https://api.openai.com/v1",
            "apiKey": "sk-test",
            "model": "gpt-4o",
            "mcpEnabled": true,
            "mcpServers": {
                "fs": { "command": "mcp-server-filesystem", "args": ["/tmp"],
                        "env": { "LOG": "1" } }
            },
            "mcpCallTimeoutSecs": 60
        }"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert!(s.mcp_enabled);
        assert_eq!(s.api_key_value(), Some("sk-test"));
        assert_eq!(s.mcp_servers["fs"].command, "mcp-server-filesystem");
        assert_eq!(s.mcp_servers["fs"].args, vec!["/tmp"]);
        assert_eq!(s.mcp_servers["fs"].env["LOG"], "1");
        assert_eq!(s.mcp_servers["fs"].transport, TransportKind::Stdio);
        assert_eq!(s.mcp_call_timeout_secs(), 60);
    }

    #[test]
    fn api_key_survives_roundtrip() {
        let mut s = Settings::default();
        s.api_key = Some(Secret::new("sk-roundtrip".into()));
        let json = serde_json::to_string(&s).unwrap();
        let parsed: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.api_key_value(), Some("sk-roundtrip"));
    }

    #[test]
    fn transport_kind_parses_sse() {
        let entry: McpServerEntry =
            serde_json::from_str(r#"{ "command": "x", "transport": "sse" }"#).unwrap();
        assert_eq!(entry.transport, TransportKind::Sse);
    }
}
