//! MCP (Model Context Protocol) client support for hikari.
//!
//! This crate provides:
//! - JSON-RPC 2.0 over stdio transport with request correlation (`transport`)
//! - MCP client for protocol handshake and tool interactions (`client`)
//! - Tool catalog aggregation and name spacing (`catalog`)
//! - Declarative server lifecycle management (`manager`)

pub mod catalog;
pub mod client;
pub mod error;
pub mod manager;
pub mod traits;
pub mod transport;
pub mod types;

pub use {
    catalog::{namespaced_name, NamespacedTool},
    client::{McpClient, McpClientState},
    error::{Error, Result},
    manager::{McpConfig, McpManager, McpStatus, ServerSpec, TransportKind},
    traits::{McpClientTrait, McpTransport},
    transport::StdioTransport,
    types::ToolDescriptor,
};

/// Default per-call timeout when settings don't override it.
pub const DEFAULT_CALL_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);
