//! Trait abstractions for the MCP transport and client layers.
//!
//! These are the direct typed seams between the manager and a connection:
//! connect, list tools, call tool, shut down. `StdioTransport` is the only
//! transport today; a network transport would implement `McpTransport`
//! without touching call sites in `manager.rs`.

use {async_trait::async_trait, serde_json::Value};

use crate::{
    client::McpClientState,
    error::Result,
    types::{JsonRpcResponse, ToolDescriptor, ToolsCallResult},
};

/// Transport layer for MCP communication (JSON-RPC).
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Send a JSON-RPC request and wait for the correlated response.
    async fn request(&self, method: &str, params: Option<Value>) -> Result<JsonRpcResponse>;

    /// Send a JSON-RPC notification (no id, no response expected).
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()>;

    /// Check if the underlying process is still alive.
    async fn is_alive(&self) -> bool;

    /// OS process id of the underlying process, while it runs.
    async fn pid(&self) -> Option<u32>;

    /// Kill the process and join the reader tasks. Every pending request is
    /// resolved or rejected before this returns.
    async fn shutdown(&self);
}

/// Client-level abstraction for one connected MCP server.
#[async_trait]
pub trait McpClientTrait: Send + Sync {
    /// The configured name of the connected server.
    fn server_name(&self) -> &str;

    /// Current connection state.
    fn state(&self) -> McpClientState;

    /// Fetch the list of tools from the server.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>>;

    /// Call a tool on the server with the given arguments.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolsCallResult>;

    /// Check if the server process is still alive.
    async fn is_alive(&self) -> bool;

    /// OS process id of the server process, while it runs.
    async fn pid(&self) -> Option<u32>;

    /// Shut down the server connection. Takes `&self` so a shutdown can
    /// interrupt calls that are still in flight on other tasks.
    async fn shutdown(&self);
}
