//! TCP transport for detectors
//!
//! Lazily connects to a controller server and keeps the connection for later
//! requests. A refused connection is reported as a missing receiver so the
//! channel can apply its retry.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use super::connection::{Connection, ConnectionError};
use super::NetworkConfig;
use crate::channel::{Transport, TransportError, TransportResult};
use crate::protocol::{Envelope, Response, WireMessage};

/// Channel transport over a framed TCP connection
pub struct TcpTransport {
    config: NetworkConfig,
    client_id: String,
    conn: Mutex<Option<Connection>>,
}

impl TcpTransport {
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            client_id: uuid::Uuid::new_v4().to_string(),
            conn: Mutex::new(None),
        }
    }

    /// Use a fixed client identifier instead of a random one
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    async fn connect(&self) -> TransportResult<Connection> {
        let addr = self.config.address();
        let stream = match tokio::time::timeout(
            Duration::from_millis(self.config.connect_timeout_ms),
            TcpStream::connect(&addr),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => {
                return Err(TransportError::NoReceiver);
            }
            Ok(Err(e)) => return Err(TransportError::Io(e)),
            Err(_) => return Err(TransportError::Connection(ConnectionError::Timeout)),
        };

        let remote = stream.peer_addr()?;
        let mut conn = Connection::new(stream, remote);
        conn.handshake_client(&self.client_id).await?;
        tracing::debug!("Connected to controller at {}", remote);
        Ok(conn)
    }

    async fn exchange(conn: &mut Connection, envelope: &Envelope, timeout: Duration) -> TransportResult<Option<Response>> {
        let sequence = conn
            .send(&WireMessage::Request {
                envelope: envelope.clone(),
            })
            .await?;

        let frame = conn
            .recv_timeout(timeout)
            .await?
            .ok_or(TransportError::Connection(ConnectionError::Closed))?;

        match frame.message {
            WireMessage::Reply { response } if frame.sequence == sequence => Ok(response),
            WireMessage::Reply { .. } => Err(TransportError::UnexpectedReply(format!(
                "sequence {} does not answer {}",
                frame.sequence, sequence
            ))),
            other => Err(TransportError::UnexpectedReply(format!("{:?}", other))),
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&self, envelope: &Envelope) -> TransportResult<Option<Response>> {
        let mut slot = self.conn.lock().await;

        let mut conn = match slot.take() {
            Some(conn) if conn.is_active() => conn,
            _ => self.connect().await?,
        };

        let timeout = Duration::from_millis(self.config.request_timeout_ms);
        let result = Self::exchange(&mut conn, envelope, timeout).await;

        // A failed exchange leaves the stream in an unknown state; reconnect next time
        if result.is_ok() {
            *slot = Some(conn);
        }
        result
    }
}
