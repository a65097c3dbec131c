//! McpManager: declarative lifecycle management for MCP server connections.
//!
//! The manager reconciles a desired configuration (enabled flag + server
//! specs) against the set of currently running clients: removed servers are
//! stopped, new ones started, and everything is stopped when the subsystem
//! is disabled. Reconciliation is serialized, so two concurrent settings
//! saves cannot race each other into duplicate clients.

use std::{
    collections::HashMap,
    sync::Arc,
    time::Duration,
};

use {
    serde::{Deserialize, Serialize},
    tokio::sync::{Mutex, RwLock},
    tracing::{info, warn},
};

use crate::{
    catalog::{self, NamespacedTool},
    client::McpClient,
    error::{Error, Result},
    traits::McpClientTrait,
    types::ToolsCallResult,
    DEFAULT_CALL_TIMEOUT,
};

/// Connection kind for an MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Stdio,
    /// Declared for forward compatibility; rejected at connect time.
    Sse,
}

/// Declarative description of one tool server.
///
/// Immutable once a client is started from it: a changed spec for the same
/// name makes reconciliation stop the old client and start a fresh one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServerSpec {
    pub command: String,
    pub args: Vec<String>,
    /// Environment variables merged over the inherited environment.
    pub env: HashMap<String, String>,
    pub transport: TransportKind,
}

/// Desired state consumed by [`McpManager::reconcile`].
#[derive(Debug, Clone, Default)]
pub struct McpConfig {
    pub enabled: bool,
    pub servers: HashMap<String, ServerSpec>,
}

/// Snapshot of manager state for UI display. No consistency guarantee
/// beyond "as of this call".
#[derive(Debug, Clone, Copy, Serialize)]
pub struct McpStatus {
    pub enabled: bool,
    /// Connected servers.
    pub active: usize,
    /// Configured servers as of the last reconciliation.
    pub total: usize,
}

struct Managed {
    spec: ServerSpec,
    client: Arc<dyn McpClientTrait>,
}

struct Inner {
    enabled: bool,
    total: usize,
    clients: HashMap<String, Managed>,
}

/// Manages the lifecycle of multiple MCP server connections.
pub struct McpManager {
    inner: RwLock<Inner>,
    /// Serializes reconciliation; never held across the `inner` lock in the
    /// other order.
    reconcile_lock: Mutex<()>,
    call_timeout: RwLock<Duration>,
}

impl Default for McpManager {
    fn default() -> Self {
        Self::new(DEFAULT_CALL_TIMEOUT)
    }
}

impl McpManager {
    pub fn new(call_timeout: Duration) -> Self {
        Self {
            inner: RwLock::new(Inner {
                enabled: false,
                total: 0,
                clients: HashMap::new(),
            }),
            reconcile_lock: Mutex::new(()),
            call_timeout: RwLock::new(call_timeout),
        }
    }

    /// Change the per-call timeout for servers started from now on. Running
    /// connections keep the timeout they were spawned with until their spec
    /// changes or they are restarted.
    pub async fn set_call_timeout(&self, timeout: Duration) {
        *self.call_timeout.write().await = timeout;
    }

    /// Bring running clients in line with `config`.
    ///
    /// 1. Stop every running server that is absent from the new config (or
    ///    whose spec changed — specs are immutable per connection).
    /// 2. When the subsystem is disabled, stop everything that remains.
    /// 3. Start every configured server that is not yet running; a failed
    ///    start is logged and skipped, never aborts the rest.
    ///
    /// Idempotent: reconciling the same config twice leaves every running
    /// client untouched.
    pub async fn reconcile(&self, config: &McpConfig) {
        let _guard = self.reconcile_lock.lock().await;

        // Phase 1+2: figure out what has to go.
        let to_stop: Vec<String> = {
            let inner = self.inner.read().await;
            inner
                .clients
                .iter()
                .filter(|(name, managed)| {
                    !config.enabled
                        || config
                            .servers
                            .get(*name)
                            .is_none_or(|spec| *spec != managed.spec)
                })
                .map(|(name, _)| name.clone())
                .collect()
        };
        for name in &to_stop {
            self.stop_client(name).await;
        }

        // Phase 3: start what is configured but not running.
        if config.enabled {
            let missing: Vec<(String, ServerSpec)> = {
                let inner = self.inner.read().await;
                config
                    .servers
                    .iter()
                    .filter(|(name, _)| !inner.clients.contains_key(*name))
                    .map(|(name, spec)| (name.clone(), spec.clone()))
                    .collect()
            };
            let call_timeout = *self.call_timeout.read().await;
            for (name, spec) in missing {
                match McpClient::connect(&name, &spec, call_timeout).await {
                    Ok(client) => {
                        let mut inner = self.inner.write().await;
                        inner.clients.insert(name, Managed {
                            spec,
                            client: Arc::new(client),
                        });
                    }
                    Err(e) => warn!(server = %name, error = %e, "failed to start MCP server"),
                }
            }
        }

        let mut inner = self.inner.write().await;
        inner.enabled = config.enabled;
        inner.total = config.servers.len();
        info!(
            enabled = config.enabled,
            active = inner.clients.len(),
            total = inner.total,
            "MCP reconciliation complete"
        );
    }

    /// Stop one client and drop it from the running set. In-flight calls on
    /// that connection resolve with `ConnectionClosed` before this returns.
    async fn stop_client(&self, name: &str) {
        let managed = {
            let mut inner = self.inner.write().await;
            inner.clients.remove(name)
        };
        if let Some(managed) = managed {
            info!(server = %name, "stopping MCP server");
            managed.client.shutdown().await;
        }
    }

    /// Execute a namespaced tool call: resolve the owning server, forward
    /// `tools/call` with the original tool name, and return its result.
    pub async fn dispatch(
        &self,
        namespaced: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolsCallResult> {
        let (client, tool) = {
            let inner = self.inner.read().await;
            let (server, tool) =
                catalog::resolve(inner.clients.keys().map(String::as_str), namespaced)?;
            let managed = inner
                .clients
                .get(&server)
                .ok_or(Error::ServerNotFound { server })?;
            (Arc::clone(&managed.client), tool)
        };
        client.call_tool(&tool, arguments).await
    }

    /// Aggregate the tool catalogs of all running servers under namespaced
    /// names. A misbehaving server shrinks the catalog but never aborts
    /// listing for the others.
    pub async fn list_all_tools(&self) -> Vec<NamespacedTool> {
        let clients: Vec<(String, Arc<dyn McpClientTrait>)> = {
            let inner = self.inner.read().await;
            inner
                .clients
                .iter()
                .map(|(name, managed)| (name.clone(), Arc::clone(&managed.client)))
                .collect()
        };

        let mut all = Vec::new();
        for (name, client) in clients {
            match client.list_tools().await {
                Ok(tools) => {
                    all.extend(tools.into_iter().map(|t| NamespacedTool::new(&name, t)));
                }
                Err(e) => warn!(server = %name, error = %e, "failed to list MCP tools"),
            }
        }
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Current enabled flag and client counts.
    pub async fn status(&self) -> McpStatus {
        let inner = self.inner.read().await;
        McpStatus {
            enabled: inner.enabled,
            active: inner.clients.len(),
            total: inner.total,
        }
    }

    /// Names and process ids of the running servers.
    pub async fn running_servers(&self) -> Vec<(String, Option<u32>)> {
        let clients: Vec<(String, Arc<dyn McpClientTrait>)> = {
            let inner = self.inner.read().await;
            inner
                .clients
                .iter()
                .map(|(name, managed)| (name.clone(), Arc::clone(&managed.client)))
                .collect()
        };
        let mut out = Vec::with_capacity(clients.len());
        for (name, client) in clients {
            out.push((name, client.pid().await));
        }
        out.sort();
        out
    }

    /// Stop every running server. All child processes are dead and every
    /// pending call is resolved before this returns.
    pub async fn shutdown_all(&self) {
        let _guard = self.reconcile_lock.lock().await;
        let names: Vec<String> = self.inner.read().await.clients.keys().cloned().collect();
        for name in names {
            self.stop_client(&name).await;
        }
    }
}
