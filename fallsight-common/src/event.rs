use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Device convention for "environmental sensor reading unavailable".
pub const SENSOR_SENTINEL: f64 = -999.0;

/// Canonical event produced by the normalizer.
///
/// Transport-independent and immutable once built; the session state
/// derives a new value when it assigns a fall sequence number.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    origin: Origin,
    origin_timestamp: u64,
    received_at: DateTime<Utc>,
    payload: Payload,
}

impl Event {
    /// Create a new event stamped with the current wall-clock time.
    pub fn new(origin: Origin, origin_timestamp: u64, payload: Payload) -> Self {
        Self {
            origin,
            origin_timestamp,
            received_at: Utc::now(),
            payload,
        }
    }

    /// Override the normalization time.
    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = received_at;
        self
    }

    /// Return a copy of this event with the fall sequence number set.
    ///
    /// Only fall alerts and status updates carry a sequence number; other
    /// payloads are returned unchanged.
    pub fn with_fall_sequence_number(mut self, seq: u64) -> Self {
        match &mut self.payload {
            Payload::FallAlert(alert) => alert.fall_sequence_number = Some(seq),
            Payload::StatusUpdate(status) => status.fall_sequence_number = Some(seq),
            Payload::SensorReading(_) | Payload::IdentifyAck(_) => {}
        }
        self
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Device-reported timestamp (0 when the device did not send one).
    pub fn origin_timestamp(&self) -> u64 {
        self.origin_timestamp
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Device-supplied or session-assigned fall sequence number, if any.
    pub fn fall_sequence_number(&self) -> Option<u64> {
        match &self.payload {
            Payload::FallAlert(alert) => alert.fall_sequence_number,
            Payload::StatusUpdate(status) => status.fall_sequence_number,
            Payload::SensorReading(_) | Payload::IdentifyAck(_) => None,
        }
    }
}

/// Where an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Short-range wireless notifications.
    Wireless,
    /// Serial line.
    Serial,
    /// Synthetic test-data generator standing in for the serial line.
    Synthetic,
    /// Frames received from the dashboard endpoint.
    Dashboard,
    /// Produced by the bridge itself (heartbeats).
    Bridge,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Wireless => "wireless",
            Origin::Serial => "serial",
            Origin::Synthetic => "synthetic",
            Origin::Dashboard => "dashboard",
            Origin::Bridge => "bridge",
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    FallAlert,
    StatusUpdate,
    SensorReading,
    IdentifyAck,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventKind::FallAlert => "fall_alert",
            EventKind::StatusUpdate => "status_update",
            EventKind::SensorReading => "sensor_reading",
            EventKind::IdentifyAck => "identify_ack",
        };
        f.write_str(name)
    }
}

/// Kind-specific event contents.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    FallAlert(FallAlert),
    StatusUpdate(StatusUpdate),
    SensorReading(SensorReading),
    IdentifyAck(IdentifyAck),
}

impl Payload {
    pub fn kind(&self) -> EventKind {
        match self {
            Payload::FallAlert(_) => EventKind::FallAlert,
            Payload::StatusUpdate(_) => EventKind::StatusUpdate,
            Payload::SensorReading(_) => EventKind::SensorReading,
            Payload::IdentifyAck(_) => EventKind::IdentifyAck,
        }
    }
}

/// Fall severity reported by the device.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
}

impl Severity {
    /// Parse a severity name, ignoring case.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Three-axis reading (acceleration in g, angular rate in deg/s).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Environmental triple; each component is independently unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub pressure: Option<f64>,
}

impl Environment {
    /// Build from raw device values, mapping the -999 sentinel to unknown.
    pub fn from_device(
        temperature: Option<f64>,
        humidity: Option<f64>,
        pressure: Option<f64>,
    ) -> Self {
        Self {
            temperature: known_reading(temperature),
            humidity: known_reading(humidity),
            pressure: known_reading(pressure),
        }
    }
}

/// Map the device sentinel (and non-finite values) to unknown.
pub fn known_reading(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v != SENSOR_SENTINEL)
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FallAlert {
    pub severity: Severity,
    pub magnitude: Option<f64>,
    pub fall_sequence_number: Option<u64>,
    pub acceleration: Vector3,
    pub environment: Option<Environment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub system_active: bool,
    pub fall_sequence_number: Option<u64>,
    pub baseline_acceleration: Option<f64>,
    pub current_acceleration: Option<f64>,
    pub environment: Option<Environment>,
}

impl Default for StatusUpdate {
    fn default() -> Self {
        Self {
            system_active: true,
            fall_sequence_number: None,
            baseline_acceleration: None,
            current_acceleration: None,
            environment: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SensorReading {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub acceleration: Vector3,
    pub gyroscope: Vector3,
}

/// Dashboard acknowledgement of the `identify` frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IdentifyAck {
    pub status: Option<String>,
    pub message: Option<String>,
}
