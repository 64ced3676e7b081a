//! Protocol message definitions
//!
//! Defines the request/response vocabulary shared by the edge detector, the
//! channel and the controller, plus the frame-level wire messages.

use serde::{Deserialize, Serialize};

/// Host window identifier
pub type WindowId = u32;

/// Host tab identifier
pub type TabId = u32;

/// A command sent to the controller (or, for `ToggleExtension`, to a page)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    /// Is the sender's tab active in a focused window?
    CheckFocus,
    /// Is the sender's window a utility window the detector must leave alone?
    CheckWindow,
    /// Enter or leave fullscreen for the sender's window
    ToggleFullscreen {
        #[serde(rename = "enterFullscreen")]
        enter_fullscreen: bool,
    },
    /// Traverse the sender tab's history backwards
    NavigateBack,
    /// Traverse the sender tab's history forwards
    NavigateForward,
    /// Popup toggle pushed to a page's detector
    ToggleExtension { enabled: bool },
}

impl Request {
    /// Name of the action as it appears on the wire
    pub fn action(&self) -> &'static str {
        match self {
            Request::CheckFocus => "checkFocus",
            Request::CheckWindow => "checkWindow",
            Request::ToggleFullscreen { .. } => "toggleFullscreen",
            Request::NavigateBack => "navigateBack",
            Request::NavigateForward => "navigateForward",
            Request::ToggleExtension { .. } => "toggleExtension",
        }
    }

    /// Whether the request mutates host state (as opposed to a query)
    pub fn is_command(&self) -> bool {
        matches!(
            self,
            Request::ToggleFullscreen { .. } | Request::NavigateBack | Request::NavigateForward
        )
    }
}

/// A reply to a [`Request`]. Commands produce no response at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Focus {
        #[serde(rename = "isActive")]
        is_active: bool,
    },
    Window {
        #[serde(rename = "isDisabledWindow")]
        is_disabled_window: bool,
    },
    Received { received: bool },
}

/// Identity of the page that issued a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sender {
    pub tab_id: TabId,
    pub window_id: WindowId,
    /// Whether the tab was the active tab of its window when the request was made
    pub tab_active: bool,
    pub url: String,
}

impl Sender {
    pub fn new(tab_id: TabId, window_id: WindowId, url: impl Into<String>) -> Self {
        Self {
            tab_id,
            window_id,
            tab_active: true,
            url: url.into(),
        }
    }
}

/// A request together with the page it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub sender: Sender,
    #[serde(flatten)]
    pub request: Request,
}

impl Envelope {
    pub fn new(sender: Sender, request: Request) -> Self {
        Self { sender, request }
    }
}

/// Frame-level messages on the TCP transport
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    /// Handshake sent by a connecting detector
    Hello {
        protocol_version: u32,
        client_id: String,
    },
    /// Handshake answer from the controller
    HelloAck {
        protocol_version: u32,
        accepted: bool,
        reason: Option<String>,
    },
    /// A request to be dispatched by the controller
    Request { envelope: Envelope },
    /// The controller's answer; `None` for commands and failures
    Reply { response: Option<Response> },
    /// Graceful disconnect
    Disconnect { reason: String },
}

impl WireMessage {
    /// Get the message type identifier
    pub fn type_id(&self) -> u8 {
        match self {
            WireMessage::Hello { .. } => 0x01,
            WireMessage::HelloAck { .. } => 0x02,
            WireMessage::Request { .. } => 0x10,
            WireMessage::Reply { .. } => 0x11,
            WireMessage::Disconnect { .. } => 0xFE,
        }
    }
}
