//! Bridge configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use fallsight_bridge_framework::{
    BridgeConfig, BridgeError, DashboardConfig, LoggingConfig, validate_dashboard,
};
use fallsight_common::Severity;

/// Placeholder webhook URL shipped in sample configs; treated as disabled.
pub const WEBHOOK_PLACEHOLDER: &str = "https://example.com/alert";

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallBridgeConfig {
    /// Outbound dashboard connection.
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// BLE notification link.
    #[serde(default)]
    pub wireless: WirelessConfig,

    /// Serial line (or synthetic generator).
    #[serde(default)]
    pub serial: SerialConfig,

    /// Session labels and heartbeat.
    #[serde(default)]
    pub session: SessionConfig,

    /// External alert webhook.
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Upper bound on orderly teardown.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

fn default_shutdown_timeout_secs() -> u64 {
    5
}

impl Default for FallBridgeConfig {
    fn default() -> Self {
        Self {
            dashboard: DashboardConfig::default(),
            wireless: WirelessConfig::default(),
            serial: SerialConfig::default(),
            session: SessionConfig::default(),
            webhook: WebhookConfig::default(),
            logging: LoggingConfig::default(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

/// BLE link configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WirelessConfig {
    /// On by default only in builds with the `ble` feature.
    #[serde(default = "default_wireless_enabled")]
    pub enabled: bool,

    /// Advertised local name searched during discovery.
    #[serde(default = "default_device_name")]
    pub device_name: String,

    /// GATT service carrying the notifications.
    #[serde(default = "default_service_uuid")]
    pub service_uuid: String,

    /// Characteristic subscribed to for notifications.
    #[serde(default = "default_notify_characteristic")]
    pub notify_characteristic: String,

    /// Bound on the discovery phase.
    #[serde(default = "default_scan_timeout_secs")]
    pub scan_timeout_secs: u64,

    #[serde(default = "default_wireless_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Liveness probe period while no notification arrives.
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_wireless_enabled() -> bool {
    cfg!(feature = "ble")
}

fn default_device_name() -> String {
    "Nano33BLE".to_string()
}

fn default_service_uuid() -> String {
    "6e400001-b5a3-f393-e0a9-e50e24dcca9e".to_string()
}

fn default_notify_characteristic() -> String {
    "6e400003-b5a3-f393-e0a9-e50e24dcca9e".to_string()
}

fn default_scan_timeout_secs() -> u64 {
    10
}

fn default_wireless_retry_delay_secs() -> u64 {
    10
}

fn default_probe_interval_secs() -> u64 {
    5
}

impl WirelessConfig {
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }
}

impl Default for WirelessConfig {
    fn default() -> Self {
        Self {
            enabled: default_wireless_enabled(),
            device_name: default_device_name(),
            service_uuid: default_service_uuid(),
            notify_characteristic: default_notify_characteristic(),
            scan_timeout_secs: default_scan_timeout_secs(),
            retry_delay_secs: default_wireless_retry_delay_secs(),
            probe_interval_secs: default_probe_interval_secs(),
        }
    }
}

/// Serial line configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Device path, e.g. `/dev/ttyUSB0` or `COM3`.
    #[serde(default = "default_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Replace the serial line with generated readings.
    #[serde(default)]
    pub synthetic: bool,

    /// Period between generated readings.
    #[serde(default = "default_synthetic_interval_secs")]
    pub synthetic_interval_secs: u64,

    /// Also emit a fall every 60-120 s in synthetic mode.
    #[serde(default)]
    pub simulate_falls: bool,

    #[serde(default = "default_serial_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

fn default_port() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_synthetic_interval_secs() -> u64 {
    2
}

fn default_serial_retry_delay_secs() -> u64 {
    5
}

impl SerialConfig {
    pub fn synthetic_interval(&self) -> Duration {
        Duration::from_secs(self.synthetic_interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_port(),
            baud_rate: default_baud_rate(),
            synthetic: false,
            synthetic_interval_secs: default_synthetic_interval_secs(),
            simulate_falls: false,
            retry_delay_secs: default_serial_retry_delay_secs(),
        }
    }
}

/// Labels attached to outbound frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Monitored person's identifier.
    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// Location label on fall alerts.
    #[serde(default = "default_location")]
    pub location: String,

    /// Periodic heartbeat in addition to the on-change one. Off when unset.
    #[serde(default)]
    pub heartbeat_interval_secs: Option<u64>,
}

fn default_user_id() -> String {
    "cliente123".to_string()
}

fn default_location() -> String {
    "Sensor BLE".to_string()
}

impl SessionConfig {
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        self.heartbeat_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            location: default_location(),
            heartbeat_interval_secs: None,
        }
    }
}

/// Fire-and-forget alert webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Target URL. Empty or the placeholder disables the webhook.
    #[serde(default = "default_webhook_url")]
    pub url: String,

    #[serde(default = "default_webhook_timeout_secs")]
    pub timeout_secs: u64,

    /// Lowest fall severity that triggers a call.
    #[serde(default = "default_min_severity")]
    pub min_severity: Severity,
}

fn default_webhook_url() -> String {
    WEBHOOK_PLACEHOLDER.to_string()
}

fn default_webhook_timeout_secs() -> u64 {
    5
}

fn default_min_severity() -> Severity {
    Severity::High
}

impl WebhookConfig {
    pub fn is_enabled(&self) -> bool {
        let url = self.url.trim();
        !url.is_empty() && url != WEBHOOK_PLACEHOLDER
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: default_webhook_url(),
            timeout_secs: default_webhook_timeout_secs(),
            min_severity: default_min_severity(),
        }
    }
}

impl BridgeConfig for FallBridgeConfig {
    fn dashboard(&self) -> &DashboardConfig {
        &self.dashboard
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    fn validate(&self) -> fallsight_bridge_framework::Result<()> {
        validate_dashboard(&self.dashboard)?;

        if self.wireless.enabled {
            if !cfg!(feature = "ble") {
                return Err(BridgeError::validation(
                    "wireless.enabled requires a build with `--features ble`; \
                     set wireless.enabled to false or pass --no-wireless",
                ));
            }
            if self.wireless.device_name.trim().is_empty() {
                return Err(BridgeError::validation(
                    "wireless.device_name must not be empty",
                ));
            }
            if self.wireless.scan_timeout_secs == 0 || self.wireless.retry_delay_secs == 0 {
                return Err(BridgeError::validation(
                    "wireless.scan_timeout_secs and wireless.retry_delay_secs must be greater than zero",
                ));
            }
            if self.wireless.probe_interval_secs == 0 {
                return Err(BridgeError::validation(
                    "wireless.probe_interval_secs must be greater than zero",
                ));
            }
        }

        if self.serial.enabled {
            if self.serial.baud_rate == 0 {
                return Err(BridgeError::validation(
                    "serial.baud_rate must be greater than zero",
                ));
            }
            if self.serial.retry_delay_secs == 0 || self.serial.synthetic_interval_secs == 0 {
                return Err(BridgeError::validation(
                    "serial.retry_delay_secs and serial.synthetic_interval_secs must be greater than zero",
                ));
            }
        }

        if self.session.user_id.trim().is_empty() {
            return Err(BridgeError::validation("session.user_id must not be empty"));
        }

        if self.webhook.is_enabled()
            && !self.webhook.url.starts_with("http://")
            && !self.webhook.url.starts_with("https://")
        {
            return Err(BridgeError::validation(format!(
                "webhook.url must be an http(s) URL, got '{}'",
                self.webhook.url
            )));
        }

        Ok(())
    }
}
