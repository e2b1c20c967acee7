//! Inbound transports.
//!
//! Each transport yields raw records and knows how to (re)connect; it owns no
//! business logic and never retries on its own. Retry policy lives in the
//! controller's supervisors.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use fallsight_common::Origin;

#[cfg(feature = "ble")]
pub mod ble;
pub mod serial;
pub mod synthetic;
pub mod wireless;

pub use serial::{LineReader, SerialTransport};
pub use synthetic::SyntheticTransport;
pub use wireless::{BleLink, BleTarget, WirelessTransport};

/// Transport failures. All are recoverable by reconnecting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    #[error("Device '{name}' not found within {timeout:?}")]
    DiscoveryTimeout { name: String, timeout: Duration },

    #[error("Link lost: {0}")]
    Lost(String),
}

impl TransportError {
    pub fn connect_failed(msg: impl Into<String>) -> Self {
        Self::ConnectFailed(msg.into())
    }

    pub fn lost(msg: impl Into<String>) -> Self {
        Self::Lost(msg.into())
    }
}

/// A reconnectable source of raw inbound records.
#[async_trait]
pub trait Transport: Send {
    /// Origin tag applied to every record from this transport.
    fn origin(&self) -> Origin;

    /// Establish the link. A single attempt; never retries internally.
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Wait for the next complete record.
    ///
    /// Must be cancel-safe: dropping the future loses no buffered bytes.
    async fn next_record(&mut self) -> Result<Vec<u8>, TransportError>;

    /// Cheap liveness probe. A `false` answer is authoritative.
    async fn is_alive(&mut self) -> bool;

    /// Release link resources. Idempotent.
    async fn disconnect(&mut self);
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    fn origin(&self) -> Origin {
        (**self).origin()
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        (**self).connect().await
    }

    async fn next_record(&mut self) -> Result<Vec<u8>, TransportError> {
        (**self).next_record().await
    }

    async fn is_alive(&mut self) -> bool {
        (**self).is_alive().await
    }

    async fn disconnect(&mut self) {
        (**self).disconnect().await
    }
}
