//! MCP client: protocol handshake and tool interactions with a single server.

use std::{sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    tracing::{debug, info, warn},
};

use crate::{
    error::{Context, Error, Result},
    manager::{ServerSpec, TransportKind},
    traits::{McpClientTrait, McpTransport},
    transport::StdioTransport,
    types::{
        ClientCapabilities, ClientInfo, InitializeParams, InitializeResult, ToolDescriptor,
        ToolsCallParams, ToolsCallResult, ToolsListResult, PROTOCOL_VERSION,
    },
};

/// State of an MCP client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpClientState {
    /// Transport spawned, not yet initialized.
    Connected,
    /// `initialize` completed, `initialized` notification sent.
    Ready,
    /// Server process exited or was shut down.
    Closed,
}

/// An MCP client connected to a single server.
///
/// Connection state sits behind a lock so `shutdown` can flip it to `Closed`
/// through a shared reference while other tasks have calls in flight.
pub struct McpClient {
    server_name: String,
    transport: Arc<dyn McpTransport>,
    state: std::sync::Mutex<McpClientState>,
    server_info: Option<InitializeResult>,
}

impl McpClient {
    /// Spawn the server process and perform the MCP handshake
    /// (initialize request + initialized notification).
    ///
    /// A handshake failure kills the freshly spawned process before the
    /// error is returned, so a failed connect never leaks a child.
    pub async fn connect(
        server_name: &str,
        spec: &ServerSpec,
        call_timeout: Duration,
    ) -> Result<Self> {
        match spec.transport {
            TransportKind::Stdio => {}
            // Declared in the settings schema, not implemented.
            TransportKind::Sse => {
                return Err(Error::message(format!(
                    "MCP server '{server_name}' uses the 'sse' transport, which is not supported"
                )));
            }
        }

        info!(
            server = %server_name,
            command = %spec.command,
            args = ?spec.args,
            "connecting to MCP server"
        );
        let transport =
            StdioTransport::spawn(&spec.command, &spec.args, &spec.env, call_timeout).await?;

        let mut client = Self {
            server_name: server_name.into(),
            transport,
            state: std::sync::Mutex::new(McpClientState::Connected),
            server_info: None,
        };

        if let Err(e) = client.initialize().await {
            warn!(server = %server_name, error = %e, "MCP initialize handshake failed");
            client.transport.shutdown().await;
            client.set_state(McpClientState::Closed);
            return Err(Error::Handshake {
                server: server_name.into(),
                reason: e.to_string(),
            });
        }
        Ok(client)
    }

    fn set_state(&self, next: McpClientState) {
        match self.state.lock() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    async fn initialize(&mut self) -> Result<()> {
        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.into(),
            capabilities: ClientCapabilities::default(),
            client_info: ClientInfo {
                name: "hikari".into(),
                version: env!("CARGO_PKG_VERSION").into(),
            },
        };

        let resp = self
            .transport
            .request("initialize", Some(serde_json::to_value(&params)?))
            .await?;

        let result: InitializeResult =
            serde_json::from_value(resp.result.context("initialize returned no result")?)
                .context("failed to parse initialize result")?;

        info!(
            server = %self.server_name,
            protocol = %result.protocol_version,
            server_name = %result.server_info.name,
            "MCP server initialized"
        );

        self.server_info = Some(result);

        // Completes the handshake; the server expects no reply to this.
        self.transport
            .notify("notifications/initialized", None)
            .await?;
        self.set_state(McpClientState::Ready);

        Ok(())
    }

    /// Server identity reported during initialize.
    pub fn server_info(&self) -> Option<&InitializeResult> {
        self.server_info.as_ref()
    }

    fn ensure_ready(&self) -> Result<()> {
        let state = self.current_state();
        if state != McpClientState::Ready {
            return Err(Error::message(format!(
                "MCP client for '{}' is not ready (state: {state:?})",
                self.server_name
            )));
        }
        Ok(())
    }

    fn current_state(&self) -> McpClientState {
        match self.state.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl McpClientTrait for McpClient {
    fn server_name(&self) -> &str {
        &self.server_name
    }

    fn state(&self) -> McpClientState {
        self.current_state()
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        self.ensure_ready()?;

        let resp = self.transport.request("tools/list", None).await?;
        let result: ToolsListResult =
            serde_json::from_value(resp.result.context("tools/list returned no result")?)?;

        debug!(
            server = %self.server_name,
            count = result.tools.len(),
            "fetched MCP tools"
        );

        Ok(result.tools)
    }

    async fn call_tool(&self, name: &str, arguments: serde_json::Value) -> Result<ToolsCallResult> {
        self.ensure_ready()?;

        let params = ToolsCallParams {
            name: name.into(),
            arguments,
        };

        let resp = self
            .transport
            .request("tools/call", Some(serde_json::to_value(&params)?))
            .await?;

        let result: ToolsCallResult =
            serde_json::from_value(resp.result.context("tools/call returned no result")?)?;

        Ok(result)
    }

    async fn is_alive(&self) -> bool {
        self.transport.is_alive().await
    }

    async fn pid(&self) -> Option<u32> {
        self.transport.pid().await
    }

    async fn shutdown(&self) {
        self.set_state(McpClientState::Closed);
        self.transport.shutdown().await;
    }
}
