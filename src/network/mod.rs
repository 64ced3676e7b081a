//! Network module - Carries channel requests to a controller over TCP
//!
//! Provides:
//! - `ControllerServer` for serving a shared controller
//! - `TcpTransport` for reaching it from a detector
//! - Framed connection handling

mod client;
mod connection;
mod server;

pub use client::*;
pub use connection::*;
pub use server::*;

/// Configuration for network operations
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Address to bind (server) or reach (client)
    pub host: String,
    /// Port to listen on or connect to
    pub port: u16,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// How long a client waits for a reply in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: crate::protocol::DEFAULT_PORT,
            connect_timeout_ms: 2000,
            request_timeout_ms: 2000,
        }
    }
}

impl NetworkConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
