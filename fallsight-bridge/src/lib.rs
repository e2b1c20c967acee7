//! FallSight bridge.
//!
//! Relays telemetry from a wearable fall-detection sensor to the FallSight
//! dashboard. Records arrive over BLE notifications and a serial line (or a
//! synthetic generator standing in for it), are normalized into one event
//! model, numbered, and forwarded as JSON frames over a WebSocket.
//!
//! # Inbound Records
//!
//! - JSON objects, short (`t`, `fc`, `acc`) or long (`type`, `fall_count`,
//!   `acceleration`) keys
//! - Keywords: `CAIDA`, `OK`, `CONNECTED`, `INIT`
//! - Plain text: `temp:25.5,hum:60.2,press:1013.2`
//!
//! # Outbound Frames
//!
//! ```text
//! identify | fall_alert | system_status | sensor_data
//! ```

pub mod bridge;
pub mod config;
pub mod controller;
pub mod normalizer;
pub mod outbound;
pub mod session;
pub mod transport;
pub mod webhook;

pub use bridge::{InboundLink, inbound_links, spawn_bridge};
pub use config::FallBridgeConfig;
pub use controller::{BridgeStats, ControlMessage, Controller, Supervisor};
pub use normalizer::{ParseError, normalize};
pub use outbound::{DeliveryFailure, OutboundHandle};
pub use session::{Link, SessionState};
pub use transport::{Transport, TransportError};
