//! Tool name spacing and the aggregated catalog view.
//!
//! Tools are exposed to the chat loop as `{server}_{tool}`. Dispatch resolves
//! the server by longest matching running-server prefix, falling back to a
//! leftmost-`_` split. Server names containing `_` are accepted but can
//! shadow tools of a shorter-named server while both run; the settings UI
//! discourages them.

use serde::Serialize;

use crate::{
    error::{Error, Result},
    types::ToolDescriptor,
};

/// Separator between server name and tool name in exposed tool names.
pub const SEPARATOR: char = '_';

/// The externally visible name for a tool: `{server}_{tool}`.
pub fn namespaced_name(server: &str, tool: &str) -> String {
    format!("{server}{SEPARATOR}{tool}")
}

/// Split a namespaced name at the leftmost separator.
pub fn split_leftmost(name: &str) -> Option<(&str, &str)> {
    name.split_once(SEPARATOR)
}

/// Resolve a namespaced tool name against the set of running server names.
///
/// Longest prefix wins: with servers `fs` and `fs_extra` both running,
/// `fs_extra_read` resolves to (`fs_extra`, `read`). A name without any
/// separator is invalid; an unmatched prefix is an unknown server.
pub fn resolve<'a>(
    running: impl IntoIterator<Item = &'a str>,
    namespaced: &str,
) -> Result<(String, String)> {
    // A missing separator or an empty server prefix ("_tool") is a malformed
    // name, not a lookup miss.
    let head = match split_leftmost(namespaced) {
        Some((head, _)) if !head.is_empty() => head,
        _ => {
            return Err(Error::InvalidToolName {
                name: namespaced.to_string(),
            });
        }
    };

    let mut best: Option<&str> = None;
    for server in running {
        let is_prefix = namespaced.len() > server.len() + 1
            && namespaced.starts_with(server)
            && namespaced[server.len()..].starts_with(SEPARATOR);
        if is_prefix && best.is_none_or(|b| server.len() > b.len()) {
            best = Some(server);
        }
    }

    match best {
        Some(server) => {
            let tool = &namespaced[server.len() + 1..];
            Ok((server.to_string(), tool.to_string()))
        }
        None => Err(Error::ServerNotFound {
            server: head.to_string(),
        }),
    }
}

/// One entry of the aggregated catalog: a tool under its exposed name.
///
/// Derived from live `tools/list` results, never persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespacedTool {
    /// Exposed name: `{server}_{tool}`.
    pub name: String,
    /// Owning server.
    pub server: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: serde_json::Value,
}

impl NamespacedTool {
    pub fn new(server: &str, tool: ToolDescriptor) -> Self {
        Self {
            name: namespaced_name(server, &tool.name),
            server: server.to_string(),
            description: tool.description,
            input_schema: tool.input_schema,
        }
    }
}
