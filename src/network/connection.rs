//! Connection handling between detectors and the controller service
//!
//! Manages individual peer connections, including:
//! - Message encoding/decoding
//! - Version handshake
//! - Connection state management

use bytes::BytesMut;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::protocol::{Decoder, Encoder, Frame, WireMessage, PROTOCOL_VERSION};

/// Connection errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] crate::protocol::CodecError),

    #[error("Connection closed")]
    Closed,

    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("Protocol version mismatch: local={local}, remote={remote}")]
    VersionMismatch { local: u32, remote: u32 },

    #[error("Connection timeout")]
    Timeout,
}

pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// State of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// TCP connection established, awaiting handshake
    Connecting,
    /// Handshake complete, ready for requests
    Connected,
    /// Connection has been closed
    Closed,
}

/// Connection statistics
#[derive(Debug, Default, Clone)]
pub struct ConnectionStats {
    /// Frames written, handshake included
    pub messages_sent: u64,
    /// Frames decoded, handshake included
    pub messages_received: u64,
    /// Bytes written to the socket
    pub bytes_sent: u64,
    /// Bytes read from the socket
    pub bytes_received: u64,
}

/// A framed connection to a remote peer
pub struct Connection {
    /// Remote address
    remote_addr: SocketAddr,
    /// TCP stream
    stream: TcpStream,
    /// Frame encoder (owns the outgoing sequence counter)
    encoder: Encoder,
    /// Frame decoder
    decoder: Decoder,
    /// Read buffer
    read_buf: BytesMut,
    /// Write buffer
    write_buf: BytesMut,
    /// Client id announced in the handshake
    peer_id: Option<String>,
    /// Connection state
    state: ConnectionState,
    /// Last activity timestamp
    last_activity: Instant,
    /// Connection statistics
    stats: ConnectionStats,
}

impl Connection {
    /// Create a new connection from an established TCP stream
    pub fn new(stream: TcpStream, remote_addr: SocketAddr) -> Self {
        Self {
            remote_addr,
            stream,
            encoder: Encoder::new(),
            decoder: Decoder::new(),
            read_buf: BytesMut::with_capacity(4096),
            write_buf: BytesMut::with_capacity(4096),
            peer_id: None,
            state: ConnectionState::Connecting,
            last_activity: Instant::now(),
            stats: ConnectionStats::default(),
        }
    }

    /// The peer's client id (after a server-side handshake)
    pub fn peer_id(&self) -> Option<&str> {
        self.peer_id.as_deref()
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    /// Perform the server-side handshake
    pub async fn handshake_server(&mut self) -> ConnectionResult<()> {
        let frame = self.recv().await?.ok_or_else(|| {
            ConnectionError::HandshakeFailed("Connection closed during handshake".to_string())
        })?;

        let (remote_version, client_id) = match frame.message {
            WireMessage::Hello {
                protocol_version,
                client_id,
            } => (protocol_version, client_id),
            _ => {
                return Err(ConnectionError::HandshakeFailed(
                    "Expected Hello message".to_string(),
                ));
            }
        };

        if remote_version != PROTOCOL_VERSION {
            self.send(&WireMessage::HelloAck {
                protocol_version: PROTOCOL_VERSION,
                accepted: false,
                reason: Some(format!(
                    "Protocol version mismatch: expected {}, got {}",
                    PROTOCOL_VERSION, remote_version
                )),
            })
            .await?;

            return Err(ConnectionError::VersionMismatch {
                local: PROTOCOL_VERSION,
                remote: remote_version,
            });
        }

        self.send(&WireMessage::HelloAck {
            protocol_version: PROTOCOL_VERSION,
            accepted: true,
            reason: None,
        })
        .await?;

        tracing::info!("Handshake complete with {} ({})", client_id, self.remote_addr);
        self.peer_id = Some(client_id);
        self.state = ConnectionState::Connected;

        Ok(())
    }

    /// Perform the client-side handshake
    pub async fn handshake_client(&mut self, client_id: &str) -> ConnectionResult<()> {
        self.send(&WireMessage::Hello {
            protocol_version: PROTOCOL_VERSION,
            client_id: client_id.to_string(),
        })
        .await?;

        let frame = self.recv().await?.ok_or_else(|| {
            ConnectionError::HandshakeFailed("Connection closed during handshake".to_string())
        })?;

        match frame.message {
            WireMessage::HelloAck {
                protocol_version,
                accepted,
                reason,
            } => {
                if !accepted {
                    return Err(ConnectionError::HandshakeFailed(
                        reason.unwrap_or_else(|| "Connection rejected".to_string()),
                    ));
                }

                if protocol_version != PROTOCOL_VERSION {
                    return Err(ConnectionError::VersionMismatch {
                        local: PROTOCOL_VERSION,
                        remote: protocol_version,
                    });
                }

                self.state = ConnectionState::Connected;
                tracing::debug!("Handshake complete with controller at {}", self.remote_addr);
                Ok(())
            }
            _ => Err(ConnectionError::HandshakeFailed(
                "Expected HelloAck message".to_string(),
            )),
        }
    }

    /// Send a message with the next sequence number
    pub async fn send(&mut self, message: &WireMessage) -> ConnectionResult<u32> {
        self.write_buf.clear();
        let sequence = self.encoder.encode(message, &mut self.write_buf)?;
        self.flush_write_buf().await?;
        Ok(sequence)
    }

    /// Send a reply carrying the sequence number of the request it answers
    pub async fn reply(&mut self, sequence: u32, message: &WireMessage) -> ConnectionResult<()> {
        self.write_buf.clear();
        self.encoder
            .encode_with_sequence(message, sequence, &mut self.write_buf)?;
        self.flush_write_buf().await
    }

    async fn flush_write_buf(&mut self) -> ConnectionResult<()> {
        self.stream.write_all(&self.write_buf).await?;
        self.stream.flush().await?;

        self.stats.messages_sent += 1;
        self.stats.bytes_sent += self.write_buf.len() as u64;
        self.last_activity = Instant::now();
        Ok(())
    }

    /// Receive a message (returns None on a clean close)
    pub async fn recv(&mut self) -> ConnectionResult<Option<Frame>> {
        loop {
            if let Some(frame) = self.decoder.decode(&mut self.read_buf)? {
                self.stats.messages_received += 1;
                self.last_activity = Instant::now();
                return Ok(Some(frame));
            }

            let mut buf = [0u8; 4096];
            let n = self.stream.read(&mut buf).await?;

            if n == 0 {
                if self.read_buf.is_empty() {
                    return Ok(None);
                } else {
                    return Err(ConnectionError::Closed);
                }
            }

            self.read_buf.extend_from_slice(&buf[..n]);
            self.stats.bytes_received += n as u64;
        }
    }

    /// Try to receive a message with a timeout
    pub async fn recv_timeout(&mut self, timeout: Duration) -> ConnectionResult<Option<Frame>> {
        match tokio::time::timeout(timeout, self.recv()).await {
            Ok(result) => result,
            Err(_) => Err(ConnectionError::Timeout),
        }
    }

    /// Close the connection gracefully
    pub async fn close(&mut self, reason: &str) -> ConnectionResult<()> {
        if self.state == ConnectionState::Closed {
            return Ok(());
        }
        self.state = ConnectionState::Closed;

        self.send(&WireMessage::Disconnect {
            reason: reason.to_string(),
        })
        .await?;
        self.stream.shutdown().await?;

        Ok(())
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, ConnectionState::Connected)
    }

    /// Get time since last activity
    pub fn idle_time(&self) -> Duration {
        self.last_activity.elapsed()
    }
}
