//! In-process transport to a controller living in the same runtime

use async_trait::async_trait;
use std::sync::Weak;
use tokio::sync::Mutex;

use super::{Transport, TransportError, TransportResult};
use crate::controller::{Controller, SharedController};
use crate::protocol::{Envelope, Response};

/// Delivers envelopes straight to a shared controller.
///
/// Holds only a weak reference: once the controller is dropped the transport
/// reports a missing receiver, like a controller process that went away.
#[derive(Clone)]
pub struct LoopbackTransport {
    controller: Weak<Mutex<Controller>>,
}

impl LoopbackTransport {
    pub fn new(controller: &SharedController) -> Self {
        Self {
            controller: std::sync::Arc::downgrade(controller),
        }
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&self, envelope: &Envelope) -> TransportResult<Option<Response>> {
        let controller = self.controller.upgrade().ok_or(TransportError::NoReceiver)?;
        let mut controller = controller.lock().await;
        Ok(controller.handle(envelope.clone()).await)
    }
}
