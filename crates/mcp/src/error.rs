use hikari_common::FromMessage;

/// Failure modes of the MCP subsystem.
///
/// Startup failures (`Launch`, `Handshake`) are isolated per server and
/// surface as a skipped server; per-call failures (`Rpc`, `CallTimeout`,
/// `ConnectionClosed`) propagate to the caller of the tool invocation;
/// `InvalidToolName` / `ServerNotFound` are dispatch-time validation errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to launch '{command}': {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("initialize handshake with '{server}' failed: {reason}")]
    Handshake { server: String, reason: String },
    #[error("server returned JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("no response to '{method}' within {timeout_secs}s")]
    CallTimeout { method: String, timeout_secs: u64 },
    #[error("connection closed while a call was outstanding")]
    ConnectionClosed,
    #[error("tool name '{name}' has no server prefix")]
    InvalidToolName { name: String },
    #[error("no running MCP server named '{server}'")]
    ServerNotFound { server: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    /// True for dispatch-time validation failures (bad tool name or unknown
    /// server) as opposed to runtime call failures.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidToolName { .. } | Self::ServerNotFound { .. }
        )
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

hikari_common::impl_context!();
