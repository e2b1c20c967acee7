//! FallSight bridge binary.
//!
//! Reads BLE notifications and serial lines from the fall-detection sensor
//! and forwards them to the dashboard over a WebSocket.

use anyhow::{Context, Result};
use clap::Parser;

use fallsight_bridge::{FallBridgeConfig, inbound_links, spawn_bridge};
use fallsight_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};

#[derive(Parser, Debug)]
#[command(name = "fallsight-bridge")]
#[command(about = "Relay fall-detection telemetry to the FallSight dashboard")]
#[command(long_about = "Relay fall-detection telemetry to the FallSight dashboard.\n\n\
The BLE link needs a build with `--features ble`; without it only the serial \
link (or synthetic data) feeds the dashboard.")]
#[command(version)]
struct Args {
    #[command(flatten)]
    bridge: BridgeArgs,

    /// Dashboard WebSocket URL
    #[arg(long)]
    ws_url: Option<String>,

    /// BLE device name to search for
    #[arg(long)]
    device_name: Option<String>,

    /// User identifier attached to alerts
    #[arg(long)]
    user_id: Option<String>,

    /// Serial port path
    #[arg(long)]
    serial_port: Option<String>,

    /// Serial baud rate
    #[arg(long)]
    baud_rate: Option<u32>,

    /// Generate synthetic sensor data instead of reading the serial port
    #[arg(long)]
    test_data: bool,

    /// Also simulate a fall every 60-120 s in synthetic mode
    #[arg(long)]
    simulate_falls: bool,

    /// Fall alert webhook URL
    #[arg(long)]
    webhook_url: Option<String>,

    /// Disable the BLE link (required when wireless.enabled is set in a
    /// build without the `ble` feature)
    #[arg(long)]
    no_wireless: bool,

    /// Disable the serial link
    #[arg(long)]
    no_serial: bool,
}

impl Args {
    fn apply(&self, config: &mut FallBridgeConfig) {
        if let Some(url) = &self.ws_url {
            config.dashboard.url = url.clone();
        }
        if let Some(name) = &self.device_name {
            config.wireless.device_name = name.clone();
        }
        if let Some(user_id) = &self.user_id {
            config.session.user_id = user_id.clone();
        }
        if let Some(port) = &self.serial_port {
            config.serial.port = port.clone();
        }
        if let Some(baud_rate) = self.baud_rate {
            config.serial.baud_rate = baud_rate;
        }
        if self.test_data {
            config.serial.synthetic = true;
        }
        if self.simulate_falls {
            config.serial.simulate_falls = true;
        }
        if let Some(url) = &self.webhook_url {
            config.webhook.url = url.clone();
        }
        if self.no_wireless {
            config.wireless.enabled = false;
        }
        if self.no_serial {
            config.serial.enabled = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = FallBridgeConfig::load_or_default(args.bridge.config.as_deref())
        .context("Failed to load configuration")?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let mut runner = BridgeRunner::new_with_args("fallsight", config, Some(&args.bridge))
        .context("Failed to start bridge")?;

    let inbound = inbound_links(runner.config());
    spawn_bridge(&mut runner, inbound).context("Failed to set up bridge")?;

    runner.run().await?;
    Ok(())
}
