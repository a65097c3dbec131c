//! Stdio transport: spawn a child process and speak JSON-RPC over its pipes.
//!
//! One transport owns one child process, a stdout reader task that resolves
//! pending requests by id, and a stderr reader task that forwards diagnostics
//! to logging. Outbound writes are serialized through a single stdin lock so
//! request framing is never interleaved.

use std::{
    collections::HashMap,
    process::Stdio,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    tokio::{
        io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
        process::{Child, ChildStdin, Command},
        sync::{oneshot, Mutex},
        task::JoinHandle,
    },
    tracing::{debug, info, trace, warn},
};

use crate::{
    error::{Error, Result},
    traits::McpTransport,
    types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse},
};

type PendingMap = HashMap<u64, oneshot::Sender<JsonRpcResponse>>;

/// Stdio-based transport for an MCP server process.
pub struct StdioTransport {
    child: Mutex<Child>,
    stdin: Mutex<ChildStdin>,
    pending: Arc<Mutex<PendingMap>>,
    next_id: AtomicU64,
    call_timeout: Duration,
    /// Reader task handles, joined during shutdown so teardown is
    /// deterministic rather than best-effort.
    stdout_task: Mutex<Option<JoinHandle<()>>>,
    stderr_task: Mutex<Option<JoinHandle<()>>>,
}

impl StdioTransport {
    /// Spawn the server process and start the reader loops.
    pub async fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        call_timeout: Duration,
    ) -> Result<Arc<Self>> {
        info!(command = %command, args = ?args, "spawning MCP server process");

        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| Error::Launch {
            command: command.to_string(),
            source,
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::message(format!("failed to capture stdin of '{command}'")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::message(format!("failed to capture stdout of '{command}'")))?;
        let stderr = child.stderr.take();

        let pending: Arc<Mutex<PendingMap>> = Arc::new(Mutex::new(HashMap::new()));

        // Stderr reader: forward server diagnostics to logging, nothing else.
        let stderr_task = stderr.map(|stderr| {
            tokio::spawn(async move {
                let mut reader = BufReader::new(stderr);
                let mut line = String::new();
                loop {
                    line.clear();
                    match reader.read_line(&mut line).await {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {
                            let trimmed = line.trim();
                            if !trimmed.is_empty() {
                                warn!(stderr = %trimmed, "MCP server stderr");
                            }
                        }
                    }
                }
            })
        });

        // Stdout reader: dispatch each line to the matching pending request.
        let pending_clone = Arc::clone(&pending);
        let stdout_task = tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        debug!("MCP server stdout closed");
                        break;
                    }
                    Ok(_) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        trace!(raw = %trimmed, "MCP server -> client");
                        dispatch_line(trimmed, &pending_clone).await;
                    }
                    Err(e) => {
                        warn!(error = %e, "error reading from MCP server stdout");
                        break;
                    }
                }
            }
            // Stream is gone; reject everything still outstanding. Dropping
            // the senders wakes each waiting call with `ConnectionClosed`.
            let outstanding = pending_clone.lock().await.drain().count();
            if outstanding > 0 {
                warn!(outstanding, "MCP server closed with calls outstanding");
            }
        });

        Ok(Arc::new(Self {
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            pending,
            next_id: AtomicU64::new(1),
            call_timeout,
            stdout_task: Mutex::new(Some(stdout_task)),
            stderr_task: Mutex::new(stderr_task),
        }))
    }

    /// Number of requests currently awaiting a response. Diagnostic only.
    pub async fn pending_requests(&self) -> usize {
        self.pending.lock().await.len()
    }

    async fn write_line(&self, mut payload: String) -> Result<()> {
        payload.push('\n');
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(payload.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }
}

/// Best-effort parse of one stdout line and resolution of the pending entry.
///
/// Malformed lines and unsolicited notifications are logged and skipped;
/// nothing a server prints can take the reader loop down.
async fn dispatch_line(line: &str, pending: &Mutex<PendingMap>) {
    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, line = %line, "skipping non-JSON line from MCP server");
            return;
        }
    };

    // A `method` without an id we recognize is a server notification; no
    // notification handlers are registered, so it is only logged.
    let id = value.get("id").and_then(serde_json::Value::as_u64);
    if id.is_none() {
        if let Some(method) = value.get("method").and_then(serde_json::Value::as_str) {
            debug!(method = %method, "ignoring MCP server notification");
        } else {
            debug!(line = %line, "skipping JSON-RPC object without id or method");
        }
        return;
    }

    let resp: JsonRpcResponse = match serde_json::from_value(value) {
        Ok(r) => r,
        Err(e) => {
            debug!(error = %e, line = %line, "skipping malformed JSON-RPC response");
            return;
        }
    };

    // `id` checked above; unwrap-free re-extraction for the map key.
    let Some(key) = resp.id.as_u64() else { return };
    let mut map = pending.lock().await;
    match map.remove(&key) {
        // A dropped receiver means the call already timed out; the late
        // reply is discarded as an orphan.
        Some(tx) => {
            if tx.send(resp).is_err() {
                debug!(id = key, "dropping reply for timed-out request");
            }
        }
        None => warn!(id = key, "received response for unknown request id"),
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<JsonRpcResponse> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let req = JsonRpcRequest::new(id, method, params);

        let (tx, rx) = oneshot::channel();
        {
            let mut map = self.pending.lock().await;
            map.insert(id, tx);
        }

        debug!(method = %method, id, "client -> MCP server");
        if let Err(e) = self.write_line(serde_json::to_string(&req)?).await {
            // The request never hit the wire; drop the bookkeeping too.
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let resp = match tokio::time::timeout(self.call_timeout, rx).await {
            Ok(Ok(resp)) => resp,
            // Reader loop dropped the sender: process exited or transport
            // was shut down while we were waiting.
            Ok(Err(_)) => return Err(Error::ConnectionClosed),
            Err(_) => {
                // The remote is not signalled; if it ever replies, the reader
                // finds no pending entry and drops the orphan.
                self.pending.lock().await.remove(&id);
                return Err(Error::CallTimeout {
                    method: method.to_string(),
                    timeout_secs: self.call_timeout.as_secs(),
                });
            }
        };

        if let Some(err) = resp.error {
            return Err(Error::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        Ok(resp)
    }

    async fn notify(&self, method: &str, params: Option<serde_json::Value>) -> Result<()> {
        let notif = JsonRpcNotification {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params,
        };
        trace!(method = %method, "client -> MCP server (notification)");
        self.write_line(serde_json::to_string(&notif)?).await
    }

    async fn is_alive(&self) -> bool {
        let mut child = self.child.lock().await;
        matches!(child.try_wait(), Ok(None))
    }

    async fn pid(&self) -> Option<u32> {
        self.child.lock().await.id()
    }

    async fn shutdown(&self) {
        {
            let mut child = self.child.lock().await;
            let _ = child.kill().await;
        }
        // The kill closes the pipes; both loops observe EOF and exit, and the
        // stdout loop drains the pending table on its way out. Joining here
        // makes teardown deterministic.
        if let Some(handle) = self.stdout_task.lock().await.take() {
            let _ = handle.await;
        }
        if let Some(handle) = self.stderr_task.lock().await.take() {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn spawn_and_shutdown() {
        // `cat` reads stdin forever and echoes nothing JSON-RPC shaped.
        let transport = StdioTransport::spawn("cat", &[], &HashMap::new(), TIMEOUT)
            .await
            .unwrap();
        assert!(transport.is_alive().await);
        assert!(transport.pid().await.is_some());
        transport.shutdown().await;
        assert!(!transport.is_alive().await);
    }

    #[tokio::test]
    async fn spawn_nonexistent_command_is_launch_failure() {
        let err = StdioTransport::spawn("nonexistent_command_xyz_42", &[], &HashMap::new(), TIMEOUT)
            .await
            .err()
            .expect("spawn should fail");
        assert!(matches!(err, Error::Launch { .. }));
    }

    #[tokio::test]
    async fn timeout_removes_pending_entry() {
        // `sleep` accepts stdin but never writes a response.
        let transport = StdioTransport::spawn(
            "sleep",
            &["30".to_string()],
            &HashMap::new(),
            Duration::from_millis(200),
        )
        .await
        .unwrap();

        let err = transport.request("tools/call", None).await.err().unwrap();
        assert!(matches!(err, Error::CallTimeout { .. }));
        assert_eq!(transport.pending_requests().await, 0);
        transport.shutdown().await;
    }

    #[tokio::test]
    async fn process_exit_rejects_pending_call() {
        // `true` exits immediately; the request can never be answered.
        let transport = StdioTransport::spawn("true", &[], &HashMap::new(), TIMEOUT)
            .await
            .unwrap();
        let err = transport.request("initialize", None).await.err().unwrap();
        assert!(matches!(err, Error::ConnectionClosed | Error::Io(_)));
        assert_eq!(transport.pending_requests().await, 0);
        transport.shutdown().await;
    }

    #[tokio::test]
    async fn dispatch_line_ignores_garbage_and_notifications() {
        let pending: Mutex<PendingMap> = Mutex::new(HashMap::new());
        dispatch_line("not json at all", &pending).await;
        dispatch_line(r#"{"jsonrpc":"2.0","method":"notifications/message"}"#, &pending).await;
        dispatch_line(r#"{"jsonrpc":"2.0","id":99,"result":{}}"#, &pending).await;
        assert!(pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn dispatch_line_resolves_exactly_once() {
        let pending: Mutex<PendingMap> = Mutex::new(HashMap::new());
        let (tx, rx) = oneshot::channel();
        pending.lock().await.insert(5, tx);

        dispatch_line(r#"{"jsonrpc":"2.0","id":5,"result":{"ok":true}}"#, &pending).await;
        let resp = rx.await.unwrap();
        assert!(resp.result.is_some());

        // A duplicate reply for the same id finds no entry and is dropped.
        dispatch_line(r#"{"jsonrpc":"2.0","id":5,"result":{"ok":false}}"#, &pending).await;
        assert!(pending.lock().await.is_empty());
    }
}
