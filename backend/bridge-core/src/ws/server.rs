use crate::config::ServerConfig;
use crate::controller::BridgeController;
use crate::error::server::ServerError;
use crate::ws::handle::BridgeServerHandle;
use crate::ws::transport::WsTransport;

use common::ErrorLocation;

use std::net::SocketAddr;
use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn as TokioSpawn;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Outgoing frames buffered per connection before `push_json` waits.
const CONNECTION_BUFFER_SIZE: usize = 256;

const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Starts the bridge WebSocket server on `127.0.0.1:<port>`.
///
/// `factory` builds the controller for each accepted connection; the
/// controller is torn down when the connection closes. Port 0 binds an
/// ephemeral port, see [`BridgeServerHandle::local_addr`].
///
/// # Errors
///
/// Returns [`ServerError::Io`] if the port cannot be bound.
pub async fn start_bridge_server<S, F>(
    config: &ServerConfig,
    factory: F,
) -> Result<BridgeServerHandle, ServerError>
where
    S: Send + Sync + 'static,
    F: Fn(Arc<WsTransport>) -> BridgeController<S, WsTransport> + Send + Sync + 'static,
{
    let address = format!("127.0.0.1:{}", config.port);
    let listener = TcpListener::bind(&address).await?;
    let local_addr = listener.local_addr()?;

    info!("Bridge server listening on {}", local_addr);

    let factory = Arc::new(factory);
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    let accept_task = TokioSpawn(async move {
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        info!("Surface connecting from {}", addr);
                        let factory = Arc::clone(&factory);
                        TokioSpawn(async move {
                            if let Err(e) = handle_connection(stream, addr, factory).await {
                                error!("Bridge connection {} ended with error: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                },
            }
        }
    });

    Ok(BridgeServerHandle::new(local_addr, shutdown_tx, accept_task))
}

/// Serves one bridge session.
///
/// 1. Rejects non-loopback peers
/// 2. Performs the WebSocket upgrade
/// 3. Spawns a writer task fed by the session's [`WsTransport`]
/// 4. Dispatches every inbound text frame through the controller
/// 5. Tears the controller down on disconnect
async fn handle_connection<S, F>(
    stream: TcpStream,
    addr: SocketAddr,
    factory: Arc<F>,
) -> Result<(), ServerError>
where
    S: Send + Sync + 'static,
    F: Fn(Arc<WsTransport>) -> BridgeController<S, WsTransport> + Send + Sync + 'static,
{
    if !addr.ip().is_loopback() {
        warn!("Rejected non-loopback connection from {}", addr);
        return Ok(());
    }

    let ws_stream = accept_async(stream).await.map_err(|e| ServerError::Handshake {
        message: format!("WebSocket handshake failed: {}", e),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let (mut write, mut read) = ws_stream.split();
    let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<Message>(CONNECTION_BUFFER_SIZE);

    let writer = TokioSpawn(async move {
        while let Some(message) = outgoing_rx.recv().await {
            if let Err(e) = write.send(message).await {
                warn!("Failed to write to {}: {}", addr, e);
                break;
            }
        }
        let _ = write.close().await;
    });

    let controller = factory(Arc::new(WsTransport::new(outgoing_tx)));

    let result = loop {
        let Some(message) = read.next().await else {
            break Ok(());
        };

        match message {
            Ok(Message::Text(text)) => {
                controller.handle_inbound(text.as_str()).await;
            }
            Ok(Message::Binary(data)) => match std::str::from_utf8(&data) {
                Ok(text) => {
                    controller.handle_inbound(text).await;
                }
                Err(_) => warn!("Surface {} sent a non-UTF-8 binary frame", addr),
            },
            Ok(Message::Close(_)) => break Ok(()),
            Ok(_) => debug!("Ignoring control frame from {}", addr),
            Err(e) => {
                break Err(ServerError::Read {
                    message: format!("Error reading message: {}", e),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        }
    };

    controller.teardown().await;
    drop(controller);
    if timeout(WRITER_DRAIN_TIMEOUT, writer).await.is_err() {
        debug!("Writer for {} still draining after disconnect", addr);
    }

    info!("Surface {} disconnected", addr);
    result
}
