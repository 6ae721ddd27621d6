//! Reference host: one TCP listener per connection.
//!
//! Accepted sockets are logged and closed; routing is left to plugins.

use std::net::SocketAddr;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use kindling_core::config::BootConfig;
use kindling_core::error::BootError;
use kindling_core::result::BootResult;
use kindling_plugin::Registration;

use super::HostRuntime;
use super::catalog::PluginCatalog;
use crate::context::{BootContext, ConnectionSpec};

/// Runtime option naming the address listeners bind to. Takes precedence
/// over `server.host`.
pub const BIND_HOST_OPTION: &str = "bind_host";

struct BoundListener {
    spec: ConnectionSpec,
    addr: SocketAddr,
    listener: TcpListener,
}

/// A host that binds plain TCP listeners.
#[derive(Debug)]
pub struct TcpHost {
    catalog: PluginCatalog,
    pending: Mutex<Vec<BoundListener>>,
    bound: Mutex<Vec<(ConnectionSpec, SocketAddr)>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
}

impl std::fmt::Debug for BoundListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundListener")
            .field("spec", &self.spec)
            .field("addr", &self.addr)
            .finish()
    }
}

impl Default for TcpHost {
    fn default() -> Self {
        Self::new(PluginCatalog::with_builtins())
    }
}

impl TcpHost {
    /// Creates a host resolving framework plugins from `catalog`.
    pub fn new(catalog: PluginCatalog) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            catalog,
            pending: Mutex::new(Vec::new()),
            bound: Mutex::new(Vec::new()),
            tasks: Mutex::new(Vec::new()),
            shutdown,
        }
    }

    /// Framework plugins this host can install.
    pub fn catalog(&self) -> &PluginCatalog {
        &self.catalog
    }

    /// Addresses of every bound connection, in opening order.
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.bound.lock().iter().map(|(_, addr)| *addr).collect()
    }

    /// Address of the first connection carrying `label`.
    pub fn addr_for(&self, label: &str) -> Option<SocketAddr> {
        self.bound
            .lock()
            .iter()
            .find(|(spec, _)| spec.has_label(label))
            .map(|(_, addr)| *addr)
    }

    /// Stops every accept loop and waits for them to finish.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);
        let tasks = std::mem::take(&mut *self.tasks.lock());
        info!(listeners = tasks.len(), "Shutting down listeners");
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Listener task ended abnormally");
            }
        }
    }

    /// Address to bind: the `bind_host` runtime option, then `server.host`,
    /// then every interface.
    fn bind_host(ctx: &BootContext) -> String {
        if let Some(host) = ctx
            .runtime_options()
            .get(BIND_HOST_OPTION)
            .and_then(Value::as_str)
        {
            return host.to_string();
        }
        ctx.config()
            .map(|config| config.server.host.clone())
            .unwrap_or_else(|| "0.0.0.0".to_string())
    }

    async fn accept_loop(
        listener: TcpListener,
        addr: SocketAddr,
        labels: Vec<String>,
        mut cancel: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        debug!(%addr, "Listener received shutdown signal");
                        break;
                    }
                }
                accepted = listener.accept() => match accepted {
                    Ok((socket, peer)) => {
                        debug!(%addr, %peer, labels = ?labels, "Connection accepted");
                        drop(socket);
                    }
                    Err(e) => warn!(%addr, error = %e, "Accept failed"),
                },
            }
        }
    }
}

#[async_trait]
impl HostRuntime for TcpHost {
    async fn open_connection(&self, ctx: &BootContext, spec: &ConnectionSpec) -> BootResult<()> {
        let host = Self::bind_host(ctx);

        let listener = TcpListener::bind((host.as_str(), spec.port))
            .await
            .map_err(|e| BootError::internal(format!("Failed to bind {host}:{}: {e}", spec.port)))?;
        let addr = listener
            .local_addr()
            .map_err(|e| BootError::internal(format!("Failed to read bound address: {e}")))?;

        info!(%addr, labels = ?spec.labels, "Connection bound");
        self.bound.lock().push((spec.clone(), addr));
        self.pending.lock().push(BoundListener {
            spec: spec.clone(),
            addr,
            listener,
        });
        Ok(())
    }

    async fn framework_plugins(&self, config: &BootConfig) -> BootResult<Vec<Registration>> {
        info!(plugins = ?config.plugins.framework, "Loading framework plugins");
        self.catalog.resolve(&config.plugins.framework)
    }

    async fn start(&self, ctx: &BootContext) -> BootResult<Value> {
        let listeners = std::mem::take(&mut *self.pending.lock());
        let mut tasks = Vec::with_capacity(listeners.len());
        for bound in listeners {
            let cancel = self.shutdown.subscribe();
            tasks.push(tokio::spawn(Self::accept_loop(
                bound.listener,
                bound.addr,
                bound.spec.labels,
                cancel,
            )));
        }
        self.tasks.lock().extend(tasks);

        let connections: Vec<Value> = self
            .bound
            .lock()
            .iter()
            .map(|(spec, addr)| json!({ "address": addr.to_string(), "labels": spec.labels }))
            .collect();
        info!(boot_id = %ctx.boot_id(), listeners = connections.len(), "Server started");
        Ok(json!({ "boot_id": ctx.boot_id(), "connections": connections }))
    }

    async fn on_started(&self, info: &Value) -> BootResult<()> {
        debug!(info = %info, "Server was successfully started");
        Ok(())
    }
}
