//! BLE notification transport.
//!
//! The radio stack sits behind [`BleLink`]; this adapter adds the discovery
//! bound and the periodic liveness probe.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use fallsight_common::Origin;

use super::{Transport, TransportError};

/// Device to look for and the characteristic to subscribe to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BleTarget {
    pub device_name: String,
    pub service_uuid: String,
    pub characteristic_uuid: String,
}

/// Minimal contract required from a BLE central.
#[async_trait]
pub trait BleLink: Send {
    /// Discover the device by name, connect and subscribe. Each notification
    /// payload is delivered on the returned channel; the channel closes when
    /// the subscription ends.
    async fn open(
        &mut self,
        target: &BleTarget,
    ) -> Result<mpsc::Receiver<Vec<u8>>, TransportError>;

    async fn is_connected(&self) -> bool;

    async fn close(&mut self);
}

pub struct WirelessTransport<L> {
    link: L,
    target: BleTarget,
    scan_timeout: Duration,
    probe_interval: Duration,
    notifications: Option<mpsc::Receiver<Vec<u8>>>,
}

impl<L: BleLink> WirelessTransport<L> {
    pub fn new(
        link: L,
        target: BleTarget,
        scan_timeout: Duration,
        probe_interval: Duration,
    ) -> Self {
        Self {
            link,
            target,
            scan_timeout,
            probe_interval,
            notifications: None,
        }
    }
}

#[async_trait]
impl<L: BleLink + Sync> Transport for WirelessTransport<L> {
    fn origin(&self) -> Origin {
        Origin::Wireless
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        tracing::info!(
            device = %self.target.device_name,
            timeout = ?self.scan_timeout,
            "Scanning for BLE device"
        );

        let discovery = tokio::time::timeout(self.scan_timeout, self.link.open(&self.target));
        let notifications = match discovery.await {
            Ok(result) => result?,
            Err(_) => {
                self.link.close().await;
                return Err(TransportError::DiscoveryTimeout {
                    name: self.target.device_name.clone(),
                    timeout: self.scan_timeout,
                });
            }
        };

        tracing::info!(
            device = %self.target.device_name,
            "BLE device connected, notifications enabled"
        );
        self.notifications = Some(notifications);
        Ok(())
    }

    async fn next_record(&mut self) -> Result<Vec<u8>, TransportError> {
        let notifications = self
            .notifications
            .as_mut()
            .ok_or_else(|| TransportError::lost("BLE link not open"))?;

        let start = tokio::time::Instant::now() + self.probe_interval;
        let mut probe = tokio::time::interval_at(start, self.probe_interval);

        loop {
            tokio::select! {
                record = notifications.recv() => {
                    return record.ok_or_else(|| TransportError::lost("notification stream ended"));
                }
                _ = probe.tick() => {
                    if !self.link.is_connected().await {
                        return Err(TransportError::lost("BLE device disconnected"));
                    }
                    tracing::trace!(device = %self.target.device_name, "BLE link idle but connected");
                }
            }
        }
    }

    async fn is_alive(&mut self) -> bool {
        self.notifications.is_some() && self.link.is_connected().await
    }

    async fn disconnect(&mut self) {
        self.notifications = None;
        self.link.close().await;
    }
}
