//! The storage node: one guarded `Vec<String>` plus the lifecycle of the TCP
//! server that exposes it.
//!
//! All access to the held data goes through [`StorageNode::get`] and
//! [`StorageNode::set`]. The reader-writer lock is a private detail; Tokio's
//! `RwLock` is fair, so a write that has started waiting is granted before any
//! read that arrives after it, and such reads observe the new value.

use std::{io, net::SocketAddr, sync::Arc};

use thiserror::Error;
use tokio::{
    net::TcpListener,
    sync::{Mutex, RwLock, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info};

use crate::server::Server;

#[derive(Debug, Error)]
pub enum NodeError {
    /// The requested address could not be bound. No server task was started.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    /// The accept loop panicked before it could be shut down.
    #[error("server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Data shared between the node and every connection handler.
#[derive(Default)]
pub(crate) struct NodeState {
    data: RwLock<Vec<String>>,
}

impl NodeState {
    pub(crate) async fn get(&self) -> Vec<String> {
        self.data.read().await.clone()
    }

    pub(crate) async fn set(&self, data: Vec<String>) {
        *self.data.write().await = data;
    }
}

struct ServerHandle {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// A single replica of the stored sequence.
///
/// Dropping the node drops the shutdown sender, which stops the accept loop.
#[derive(Default)]
pub struct StorageNode {
    state: Arc<NodeState>,
    server: Mutex<Option<ServerHandle>>,
}

impl StorageNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the current data. Empty if nothing was ever set.
    pub async fn get(&self) -> Vec<String> {
        self.state.get().await
    }

    /// Replaces the whole data sequence.
    pub async fn set(&self, data: Vec<String>) {
        self.state.set(data).await;
    }

    /// Binds `requested` and starts serving it in the background.
    ///
    /// The returned address is fully resolved (a concrete port even when `0`
    /// was requested) and can be published before any connection is served.
    /// An empty host such as `":0"` binds every IPv4 interface.
    ///
    /// Calling this on a node that is already serving returns the address it
    /// is serving on and leaves the running server untouched.
    pub async fn start_server(&self, requested: &str) -> Result<SocketAddr, NodeError> {
        let mut server = self.server.lock().await;
        if let Some(handle) = server.as_ref() {
            debug!(requested, addr = %handle.addr, "storage node already serving");
            return Ok(handle.addr);
        }

        let bind_addr = resolve_bind_addr(requested);
        let bind_error = |source| NodeError::Bind {
            addr: requested.to_string(),
            source,
        };
        let listener = TcpListener::bind(bind_addr.as_str())
            .await
            .map_err(bind_error)?;
        let addr = listener.local_addr().map_err(bind_error)?;

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let accept_loop = Server::new(listener, Arc::clone(&self.state));
        let task = tokio::spawn(async move {
            accept_loop
                .run_until(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        info!(%addr, "storage node serving");
        *server = Some(ServerHandle {
            addr,
            shutdown,
            task,
        });
        Ok(addr)
    }

    /// The address the node is serving on, if it is serving.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.server.lock().await.as_ref().map(|handle| handle.addr)
    }

    /// Stops accepting connections and waits for the accept loop to exit.
    ///
    /// Connections that were already accepted keep being served until their
    /// clients hang up. Does nothing when the node is not serving.
    pub async fn shutdown(&self) -> Result<(), NodeError> {
        let Some(handle) = self.server.lock().await.take() else {
            return Ok(());
        };

        let _ = handle.shutdown.send(());
        handle.task.await?;
        info!(addr = %handle.addr, "storage node stopped");
        Ok(())
    }
}

fn resolve_bind_addr(requested: &str) -> String {
    let requested = requested.trim();
    if requested.is_empty() {
        return "0.0.0.0:0".to_string();
    }
    match requested.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => requested.to_string(),
    }
}
