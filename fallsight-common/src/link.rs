//! Connection state of the bridge's links.

use serde::{Deserialize, Serialize};

/// Tri-state connection flag shared by every transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    /// No connection and no attempt in flight.
    #[default]
    Disconnected,
    /// A connect attempt (discovery, port open, handshake) is in flight.
    Connecting,
    /// The link is established and delivering records.
    Connected,
}

impl LinkState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkState::Disconnected => "disconnected",
            LinkState::Connecting => "connecting",
            LinkState::Connected => "connected",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, LinkState::Connected)
    }
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of all three link flags, reported in `system_status` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Connections {
    pub wireless: LinkState,
    pub serial: LinkState,
    pub dashboard: LinkState,
}

impl Connections {
    /// True when at least one inbound (device-side) link is connected.
    pub fn any_inbound_connected(&self) -> bool {
        self.wireless.is_connected() || self.serial.is_connected()
    }
}
