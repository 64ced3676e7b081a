//! Channel module - Request/response shim between a page and the controller
//!
//! A request is attempted once; when the controller endpoint has not
//! registered yet it is retried after a short fixed delay. Every other failure
//! is swallowed here and callers see an absent response.

mod loopback;

pub use loopback::*;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::protocol::{Envelope, Response};

/// Transport-level failures
#[derive(Error, Debug)]
pub enum TransportError {
    /// Nothing is listening on the other end yet
    #[error("Could not establish connection: receiving end does not exist")]
    NoReceiver,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection error: {0}")]
    Connection(#[from] crate::network::ConnectionError),

    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),
}

impl TransportError {
    /// Whether the failure is the transient "endpoint not ready" kind
    pub fn is_no_receiver(&self) -> bool {
        matches!(self, TransportError::NoReceiver)
    }
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Carries one envelope to the controller and returns its single reply
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, envelope: &Envelope) -> TransportResult<Option<Response>>;
}

/// Bounded retry for transient unavailability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one
    pub max_retries: u32,
    /// Fixed delay before each retry
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            backoff: Duration::from_millis(100),
        }
    }
}

/// Request/response channel to the controller
#[derive(Clone)]
pub struct Channel {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
}

impl Channel {
    pub fn new(transport: Arc<dyn Transport>, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    /// Send a request, retrying only while the receiver is missing
    pub async fn try_request(&self, envelope: &Envelope) -> TransportResult<Option<Response>> {
        let mut attempt = 0;
        loop {
            match self.transport.send(envelope).await {
                Err(e) if e.is_no_receiver() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    tracing::debug!(
                        "{}: receiver not ready, retrying in {:?}",
                        envelope.request.action(),
                        self.retry.backoff
                    );
                    tokio::time::sleep(self.retry.backoff).await;
                }
                result => return result,
            }
        }
    }

    /// Send a request; any failure becomes an absent response
    pub async fn request(&self, envelope: &Envelope) -> Option<Response> {
        match self.try_request(envelope).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Message sending failed ({}): {}", envelope.request.action(), e);
                None
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{Scripted, ScriptedTransport};
    use super::*;
    use crate::protocol::{Request, Sender};

    fn check_focus() -> Envelope {
        Envelope::new(Sender::new(1, 1, "https://example.com"), Request::CheckFocus)
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_once_when_receiver_missing() {
        let transport = ScriptedTransport::new();
        transport.push(Scripted::NoReceiver);
        transport.push(Scripted::Reply(Some(Response::Focus { is_active: true })));
        let channel = Channel::new(transport.clone(), RetryPolicy::default());

        let started = tokio::time::Instant::now();
        let response = channel.request(&check_focus()).await;

        assert_eq!(response, Some(Response::Focus { is_active: true }));
        assert_eq!(transport.requests().len(), 2);
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_single_retry() {
        let transport = ScriptedTransport::new();
        transport.push(Scripted::NoReceiver);
        transport.push(Scripted::NoReceiver);
        transport.push(Scripted::Reply(Some(Response::Focus { is_active: true })));
        let channel = Channel::new(transport.clone(), RetryPolicy::default());

        let result = channel.try_request(&check_focus()).await;
        assert!(matches!(result, Err(TransportError::NoReceiver)));
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_other_failures_are_not_retried() {
        let transport = ScriptedTransport::new();
        transport.push(Scripted::Fail);
        let channel = Channel::new(transport.clone(), RetryPolicy::default());

        assert_eq!(channel.request(&check_focus()).await, None);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_retry_policy() {
        let transport = ScriptedTransport::new();
        transport.push(Scripted::NoReceiver);
        let channel = Channel::new(
            transport.clone(),
            RetryPolicy {
                max_retries: 0,
                backoff: Duration::from_millis(100),
            },
        );

        assert_eq!(channel.request(&check_focus()).await, None);
        assert_eq!(transport.requests().len(), 1);
    }
}
