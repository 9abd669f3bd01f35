use std::net::SocketAddr;

use log::info;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Handle to a running bridge WebSocket server.
///
/// Dropping the handle leaves the server running until the process exits;
/// call [`shutdown`](Self::shutdown) to stop accepting connections.
pub struct BridgeServerHandle {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    accept_task: JoinHandle<()>,
}

impl BridgeServerHandle {
    pub(crate) fn new(
        local_addr: SocketAddr,
        shutdown_tx: oneshot::Sender<()>,
        accept_task: JoinHandle<()>,
    ) -> Self {
        Self {
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            accept_task,
        }
    }

    /// Address the server is listening on (useful when bound to port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Stop accepting new connections. Existing sessions run until they disconnect.
    pub async fn shutdown(mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        let _ = (&mut self.accept_task).await;
        info!("Bridge server on {} shut down", self.local_addr);
    }
}
