use std::{path::PathBuf, sync::Arc};

use {
    hikari_config::{env_subst::substitute_env, Settings, TransportKind as ConfigTransport},
    hikari_mcp::{McpConfig, McpManager, ServerSpec, TransportKind},
    tokio::sync::RwLock,
};

// ── Shared app state ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<McpManager>,
    pub settings: Arc<RwLock<Settings>>,
    /// Where settings are persisted on save.
    pub settings_path: PathBuf,
}

impl AppState {
    pub fn new(manager: Arc<McpManager>, settings: Settings, settings_path: PathBuf) -> Self {
        Self {
            manager,
            settings: Arc::new(RwLock::new(settings)),
            settings_path,
        }
    }
}

/// Desired MCP state derived from settings. `${VAR}` references in commands,
/// arguments and environment values are substituted here, so placeholders
/// never reach a child process.
pub fn mcp_config_from(settings: &Settings) -> McpConfig {
    let servers = settings
        .mcp_servers
        .iter()
        .map(|(name, entry)| {
            let spec = ServerSpec {
                command: substitute_env(&entry.command),
                args: entry.args.iter().map(|a| substitute_env(a)).collect(),
                env: entry
                    .env
                    .iter()
                    .map(|(k, v)| (k.clone(), substitute_env(v)))
                    .collect(),
                transport: match entry.transport {
                    ConfigTransport::Stdio => TransportKind::Stdio,
                    ConfigTransport::Sse => TransportKind::Sse,
                },
            };
            (name.clone(), spec)
        })
        .collect();

    McpConfig {
        enabled: settings.mcp_enabled,
        servers,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn config_derivation_substitutes_env() {
        std::env::set_var("HIKARI_TEST_STATE_HOME", "/data");
        let settings: Settings = serde_json::from_str(
            r#"{
                "mcpEnabled": true,
                "mcpServers": {
                    "fs": {
                        "command": "mcp-server-filesystem",
                        "args": ["${HIKARI_TEST_STATE_HOME}/docs"],
                        "env": { "ROOT": "${HIKARI_TEST_STATE_HOME}" }
                    }
                }
            }"#,
        )
        .unwrap();

        let config = mcp_config_from(&settings);
        assert!(config.enabled);
        let spec = &config.servers["fs"];
        assert_eq!(spec.args, vec!["/data/docs"]);
        assert_eq!(spec.env["ROOT"], "/data");
        assert_eq!(spec.transport, TransportKind::Stdio);
    }
}
