//! Controller server
//!
//! Accepts detector connections and answers their requests from one shared
//! controller.

use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};

use super::connection::{Connection, ConnectionError};
use super::NetworkConfig;
use crate::controller::SharedController;
use crate::protocol::WireMessage;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Server already running")]
    AlreadyRunning,

    #[error("Server not running")]
    NotRunning,

    #[error("Bind failed: {0}")]
    BindFailed(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// Events emitted by the server
#[derive(Debug, Clone)]
pub enum ServerEvent {
    Started { bind_addr: SocketAddr },
    ClientConnected { addr: SocketAddr, client_id: String },
    ClientDisconnected { addr: SocketAddr, reason: String },
    Stopped,
    Error { message: String },
}

/// Serves a shared controller over TCP
pub struct ControllerServer {
    config: NetworkConfig,
    controller: SharedController,
    event_tx: mpsc::Sender<ServerEvent>,
    event_rx: Option<mpsc::Receiver<ServerEvent>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    running: Arc<RwLock<bool>>,
}

impl ControllerServer {
    pub fn new(config: NetworkConfig, controller: SharedController) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);

        Self {
            config,
            controller,
            event_tx,
            event_rx: Some(event_rx),
            shutdown_tx: None,
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Take the event receiver (can only be called once)
    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<ServerEvent>> {
        self.event_rx.take()
    }

    /// Start the server, returning the bound address
    pub async fn start(&mut self) -> ServerResult<SocketAddr> {
        if *self.running.read().await {
            return Err(ServerError::AlreadyRunning);
        }

        let bind_addr = self.config.address();
        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            ServerError::BindFailed(format!("Failed to bind to {}: {}", bind_addr, e))
        })?;

        let local_addr = listener.local_addr()?;
        tracing::info!("Controller listening on {}", local_addr);

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        self.shutdown_tx = Some(shutdown_tx);
        *self.running.write().await = true;

        let _ = self
            .event_tx
            .send(ServerEvent::Started {
                bind_addr: local_addr,
            })
            .await;

        let controller = self.controller.clone();
        let event_tx = self.event_tx.clone();
        let running = self.running.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, addr)) => {
                                tracing::debug!("New connection from {}", addr);
                                let controller = controller.clone();
                                let event_tx = event_tx.clone();
                                tokio::spawn(async move {
                                    if let Err(e) = handle_client(stream, addr, controller, event_tx.clone()).await {
                                        tracing::warn!("Client handler error: {}", e);
                                        let _ = event_tx.send(ServerEvent::Error { message: e.to_string() }).await;
                                    }
                                });
                            }
                            Err(e) => {
                                tracing::error!("Accept error: {}", e);
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Controller shutdown requested");
                        break;
                    }
                }
            }

            *running.write().await = false;
            let _ = event_tx.send(ServerEvent::Stopped).await;
        });

        Ok(local_addr)
    }

    /// Stop accepting connections
    pub async fn stop(&mut self) -> ServerResult<()> {
        if !*self.running.read().await {
            return Err(ServerError::NotRunning);
        }

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }

        Ok(())
    }

    #[cfg(test)]
    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}

/// Serve one detector connection until it goes away
async fn handle_client(
    stream: TcpStream,
    addr: SocketAddr,
    controller: SharedController,
    event_tx: mpsc::Sender<ServerEvent>,
) -> Result<(), ConnectionError> {
    let mut conn = Connection::new(stream, addr);
    conn.handshake_server().await?;

    let client_id = conn.peer_id().unwrap_or("unknown").to_string();
    let _ = event_tx
        .send(ServerEvent::ClientConnected {
            addr,
            client_id,
        })
        .await;

    let disconnect_reason = loop {
        match conn.recv().await {
            Ok(Some(frame)) => match frame.message {
                WireMessage::Request { envelope } => {
                    // Holding the lock for the whole request keeps handlers non-reentrant
                    let response = controller.lock().await.handle(envelope).await;
                    if let Err(e) = conn
                        .reply(frame.sequence, &WireMessage::Reply { response })
                        .await
                    {
                        break format!("Send error: {}", e);
                    }
                }
                WireMessage::Disconnect { reason } => break reason,
                other => {
                    tracing::warn!("Unexpected message from {}: {:?}", addr, other);
                }
            },
            Ok(None) => break "Connection closed".to_string(),
            Err(e) => break format!("Error: {}", e),
        }
    };

    let stats = conn.stats();
    tracing::debug!(
        "Client {} disconnected: {} ({} requests, {} bytes in, idle {:?})",
        addr,
        disconnect_reason,
        stats.messages_received,
        stats.bytes_received,
        conn.idle_time()
    );
    let _ = event_tx
        .send(ServerEvent::ClientDisconnected {
            addr,
            reason: disconnect_reason,
        })
        .await;

    let _ = conn.close("Session ended").await;
    Ok(())
}
