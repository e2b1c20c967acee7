//! [`BleLink`] backed by the platform Bluetooth stack through `btleplug`.

use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{BleLink, BleTarget, TransportError};

const SCAN_POLL: Duration = Duration::from_millis(500);
const NOTIFICATION_BUFFER: usize = 64;

#[derive(Default)]
pub struct BtleplugLink {
    peripheral: Option<Peripheral>,
    forwarder: Option<JoinHandle<()>>,
}

impl BtleplugLink {
    pub fn new() -> Self {
        Self::default()
    }
}

fn ble_error(context: &str, err: btleplug::Error) -> TransportError {
    TransportError::connect_failed(format!("{}: {}", context, err))
}

fn parse_uuid(value: &str) -> Result<Uuid, TransportError> {
    Uuid::parse_str(value)
        .map_err(|e| TransportError::connect_failed(format!("Invalid UUID '{}': {}", value, e)))
}

/// Poll the adapter's peripheral list until one advertises `name`.
///
/// Unbounded; the caller applies the scan timeout.
async fn find_by_name(adapter: &Adapter, name: &str) -> Result<Peripheral, TransportError> {
    loop {
        let peripherals = adapter
            .peripherals()
            .await
            .map_err(|e| ble_error("Listing peripherals", e))?;

        for peripheral in peripherals {
            let Ok(Some(properties)) = peripheral.properties().await else {
                continue;
            };
            if properties.local_name.as_deref() == Some(name) {
                tracing::info!(device = %name, address = %properties.address, "BLE device found");
                return Ok(peripheral);
            }
        }

        tokio::time::sleep(SCAN_POLL).await;
    }
}

#[async_trait]
impl BleLink for BtleplugLink {
    async fn open(
        &mut self,
        target: &BleTarget,
    ) -> Result<mpsc::Receiver<Vec<u8>>, TransportError> {
        let service = parse_uuid(&target.service_uuid)?;
        let characteristic = parse_uuid(&target.characteristic_uuid)?;

        let manager = Manager::new()
            .await
            .map_err(|e| ble_error("Opening Bluetooth manager", e))?;
        let adapter = manager
            .adapters()
            .await
            .map_err(|e| ble_error("Listing adapters", e))?
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::connect_failed("No Bluetooth adapter available"))?;

        adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| ble_error("Starting scan", e))?;
        let found = find_by_name(&adapter, &target.device_name).await;
        if let Err(e) = adapter.stop_scan().await {
            tracing::debug!(error = %e, "Failed to stop BLE scan");
        }
        let peripheral = found?;

        peripheral
            .connect()
            .await
            .map_err(|e| ble_error("Connecting", e))?;
        self.peripheral = Some(peripheral.clone());

        peripheral
            .discover_services()
            .await
            .map_err(|e| ble_error("Discovering services", e))?;

        let notify = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == characteristic && c.service_uuid == service)
            .ok_or_else(|| {
                TransportError::connect_failed(format!(
                    "Characteristic {} not found in service {}",
                    characteristic, service
                ))
            })?;

        peripheral
            .subscribe(&notify)
            .await
            .map_err(|e| ble_error("Subscribing", e))?;

        let mut stream = peripheral
            .notifications()
            .await
            .map_err(|e| ble_error("Opening notification stream", e))?;

        let (tx, rx) = mpsc::channel(NOTIFICATION_BUFFER);
        self.forwarder = Some(tokio::spawn(async move {
            while let Some(notification) = stream.next().await {
                if notification.uuid != characteristic {
                    continue;
                }
                if tx.send(notification.value).await.is_err() {
                    break;
                }
            }
        }));

        Ok(rx)
    }

    async fn is_connected(&self) -> bool {
        match &self.peripheral {
            Some(peripheral) => peripheral.is_connected().await.unwrap_or(false),
            None => false,
        }
    }

    async fn close(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        let Some(peripheral) = self.peripheral.take() else {
            return;
        };
        if peripheral.is_connected().await.unwrap_or(false) {
            if let Err(e) = peripheral.disconnect().await {
                tracing::debug!(error = %e, "BLE disconnect failed");
            }
        }
    }
}
