//! Outbound dashboard frames.
//!
//! Every frame is one JSON object sent as a single WebSocket text frame,
//! discriminated by its `type` field.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::event::{Environment, Event, Payload, Severity, Vector3};
use crate::link::Connections;

/// A frame as it travels over the outbound channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    Identify(IdentifyFrame),
    FallAlert(FallAlertFrame),
    SystemStatus(SystemStatusFrame),
    SensorData(SensorDataFrame),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifyFrame {
    pub client: String,
    pub device: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallAlertFrame {
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_timestamp: Option<u64>,
    pub alert_id: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub user_id: String,
    pub fall_count: u64,
    pub sensor_data: FallSensorData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallSensorData {
    pub acceleration: Vector3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatusFrame {
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub system_active: bool,
    pub fall_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_acceleration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_accel: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_data: Option<StatusSensorData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connections: Option<Connections>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSensorData {
    pub environment: Environment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorDataFrame {
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
    pub acceleration: Vector3,
    pub gyroscope: Vector3,
}

/// Session-level values that frames carry but events do not.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameContext<'a> {
    pub user_id: &'a str,
    pub location: Option<&'a str>,
    pub device_name: Option<&'a str>,
    pub connections: Option<Connections>,
}

impl Frame {
    /// Build the `identify` control frame.
    pub fn identify(client: impl Into<String>, device: impl Into<String>) -> Self {
        Frame::Identify(IdentifyFrame {
            client: client.into(),
            device: device.into(),
        })
    }

    /// Convert a canonical event into its outbound frame.
    ///
    /// Returns `None` for payloads that are never forwarded (identify acks).
    pub fn from_event(event: &Event, ctx: &FrameContext<'_>) -> Option<Self> {
        let timestamp = iso_timestamp(event.received_at());
        let device_timestamp = Some(event.origin_timestamp()).filter(|ts| *ts != 0);

        match event.payload() {
            Payload::FallAlert(alert) => {
                let seq = alert.fall_sequence_number.unwrap_or(0);
                Some(Frame::FallAlert(FallAlertFrame {
                    timestamp,
                    device_timestamp,
                    alert_id: format!("fall_{}_{}", seq, event.received_at().timestamp()),
                    severity: alert.severity,
                    magnitude: alert.magnitude,
                    location: ctx.location.map(str::to_string),
                    user_id: ctx.user_id.to_string(),
                    fall_count: seq,
                    sensor_data: FallSensorData {
                        acceleration: alert.acceleration,
                        environment: alert.environment,
                    },
                }))
            }
            Payload::StatusUpdate(status) => Some(Frame::SystemStatus(SystemStatusFrame {
                timestamp,
                device_timestamp,
                user_id: Some(ctx.user_id.to_string()),
                system_active: status.system_active,
                fall_count: status.fall_sequence_number.unwrap_or(0),
                baseline_acceleration: status.baseline_acceleration,
                current_accel: status.current_acceleration,
                sensor_data: status
                    .environment
                    .map(|environment| StatusSensorData { environment }),
                connections: ctx.connections,
                device_name: ctx.device_name.map(str::to_string),
            })),
            Payload::SensorReading(reading) => Some(Frame::SensorData(SensorDataFrame {
                timestamp,
                temperature: reading.temperature,
                humidity: reading.humidity,
                pressure: reading.pressure,
                acceleration: reading.acceleration,
                gyroscope: reading.gyroscope,
            })),
            Payload::IdentifyAck(_) => None,
        }
    }

    /// Wire name of this frame's `type` field.
    pub fn type_name(&self) -> &'static str {
        match self {
            Frame::Identify(_) => "identify",
            Frame::FallAlert(_) => "fall_alert",
            Frame::SystemStatus(_) => "system_status",
            Frame::SensorData(_) => "sensor_data",
        }
    }
}

/// ISO-8601 timestamp with millisecond precision, UTC.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Encode a frame as JSON text.
pub fn encode(frame: &Frame) -> Result<String> {
    Ok(serde_json::to_string(frame)?)
}

/// Decode a frame from JSON text.
pub fn decode(text: &str) -> Result<Frame> {
    Ok(serde_json::from_str(text)?)
}
