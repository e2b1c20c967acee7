//! Wiring of transports, controller and outbound channel into a runner.

use std::time::Duration;

use tokio::sync::mpsc;

use fallsight_bridge_framework::BridgeRunner;

use crate::config::{FallBridgeConfig, SerialConfig, WirelessConfig};
use crate::controller::{Controller, Supervisor};
use crate::outbound;
use crate::session::Link;
use crate::transport::{SerialTransport, SyntheticTransport, Transport};
use crate::webhook::{WebhookError, WebhookNotifier};

const CONTROL_BUFFER: usize = 256;

/// An inbound transport and the link flag it drives.
pub struct InboundLink {
    pub link: Link,
    pub transport: Box<dyn Transport>,
    pub retry_delay: Duration,
}

impl InboundLink {
    pub fn new(link: Link, transport: Box<dyn Transport>, retry_delay: Duration) -> Self {
        Self {
            link,
            transport,
            retry_delay,
        }
    }
}

/// Build the inbound links enabled in `config`.
pub fn inbound_links(config: &FallBridgeConfig) -> Vec<InboundLink> {
    let mut links = Vec::new();

    if config.wireless.enabled {
        if let Some(transport) = wireless_transport(&config.wireless) {
            links.push(InboundLink::new(
                Link::Wireless,
                transport,
                config.wireless.retry_delay(),
            ));
        }
    }

    if config.serial.enabled {
        links.push(InboundLink::new(
            Link::Serial,
            serial_transport(&config.serial),
            config.serial.retry_delay(),
        ));
    }

    links
}

#[cfg(feature = "ble")]
fn wireless_transport(config: &WirelessConfig) -> Option<Box<dyn Transport>> {
    use crate::transport::ble::BtleplugLink;
    use crate::transport::{BleTarget, WirelessTransport};

    let target = BleTarget {
        device_name: config.device_name.clone(),
        service_uuid: config.service_uuid.clone(),
        characteristic_uuid: config.notify_characteristic.clone(),
    };
    Some(Box::new(WirelessTransport::new(
        BtleplugLink::new(),
        target,
        config.scan_timeout(),
        config.probe_interval(),
    )))
}

#[cfg(not(feature = "ble"))]
fn wireless_transport(config: &WirelessConfig) -> Option<Box<dyn Transport>> {
    tracing::warn!(
        device = %config.device_name,
        "Built without the `ble` feature; wireless link disabled"
    );
    None
}

/// Serial transport, or the synthetic generator when requested or when the
/// configured port cannot be opened.
fn serial_transport(config: &SerialConfig) -> Box<dyn Transport> {
    if !config.synthetic {
        match SerialTransport::probe(&config.port, config.baud_rate) {
            Ok(()) => {
                return Box::new(SerialTransport::new(&config.port, config.baud_rate));
            }
            Err(e) => tracing::warn!(
                port = %config.port,
                error = %e,
                "Serial port unusable; falling back to synthetic data"
            ),
        }
    }

    Box::new(SyntheticTransport::new(
        config.synthetic_interval(),
        config.simulate_falls,
    ))
}

/// Spawn the outbound channel, one supervisor per inbound link, and the
/// controller on `runner`.
pub fn spawn_bridge(
    runner: &mut BridgeRunner<FallBridgeConfig>,
    inbound: Vec<InboundLink>,
) -> Result<(), WebhookError> {
    let config = runner.config().clone();

    let webhook = WebhookNotifier::from_config(&config.webhook)?;
    match &webhook {
        Some(webhook) => tracing::info!(url = %webhook.url(), "Webhook enabled"),
        None => tracing::info!("Webhook disabled"),
    }

    let (channel, handle) = outbound::channel(config.dashboard.clone());
    let shutdown = runner.shutdown();
    runner.spawn("outbound", channel.run(shutdown));

    if inbound.is_empty() {
        tracing::warn!("No inbound links enabled");
    }

    let (control_tx, control_rx) = mpsc::channel(CONTROL_BUFFER);
    for InboundLink {
        link,
        transport,
        retry_delay,
    } in inbound
    {
        let supervisor = Supervisor::new(link, transport, retry_delay, control_tx.clone());
        let shutdown = runner.shutdown();
        runner.spawn(link.as_str(), supervisor.run(shutdown));
    }
    drop(control_tx);

    let controller = Controller::new(&config, handle, webhook);
    let shutdown = runner.shutdown();
    runner.spawn("controller", async move {
        controller.run(control_rx, shutdown).await;
    });

    Ok(())
}
