//! Loopback HTTP facade over the MCP subsystem.
//!
//! Serves the tool catalog, tool execution, manager status and the settings
//! document to the local UI. Binds to 127.0.0.1 only; there is no auth layer
//! because the socket is never exposed off-host.

pub mod mcp_routes;
pub mod server;
pub mod settings_routes;
pub mod state;

pub use {
    server::{build_app, start_server},
    state::AppState,
};
