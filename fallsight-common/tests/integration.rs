//! Integration tests for fallsight-common library.

use fallsight_common::frame::{FallAlertFrame, SensorDataFrame, SystemStatusFrame};
use fallsight_common::{
    Connections, Environment, Event, FallAlert, Frame, FrameContext, LinkState, Origin, Payload,
    SensorReading, Severity, StatusUpdate, Vector3, decode, encode,
};

fn context() -> FrameContext<'static> {
    FrameContext {
        user_id: "user-42",
        location: Some("Living room"),
        device_name: Some("Nano33BLE"),
        connections: Some(Connections {
            wireless: LinkState::Connected,
            serial: LinkState::Connecting,
            dashboard: LinkState::Connected,
        }),
    }
}

fn round_trip(event: &Event) -> Frame {
    let frame = Frame::from_event(event, &context()).expect("event should produce a frame");
    let text = encode(&frame).expect("JSON encode failed");
    let decoded = decode(&text).expect("JSON decode failed");
    assert_eq!(decoded, frame);
    decoded
}

#[test]
fn test_fall_alert_round_trip_recovers_known_fields() {
    let event = Event::new(
        Origin::Wireless,
        987_654,
        Payload::FallAlert(FallAlert {
            severity: Severity::Low,
            magnitude: Some(2.75),
            fall_sequence_number: Some(12),
            acceleration: Vector3::new(0.25, -1.5, 9.81),
            environment: Some(Environment::from_device(Some(21.0), Some(-999.0), Some(1009.5))),
        }),
    );

    let Frame::FallAlert(FallAlertFrame {
        device_timestamp,
        severity,
        magnitude,
        fall_count,
        user_id,
        location,
        sensor_data,
        alert_id,
        ..
    }) = round_trip(&event)
    else {
        panic!("expected fall_alert frame");
    };

    assert_eq!(device_timestamp, Some(987_654));
    assert_eq!(severity, Severity::Low);
    assert_eq!(magnitude, Some(2.75));
    assert_eq!(fall_count, 12);
    assert_eq!(user_id, "user-42");
    assert_eq!(location.as_deref(), Some("Living room"));
    assert_eq!(sensor_data.acceleration, Vector3::new(0.25, -1.5, 9.81));
    let environment = sensor_data.environment.expect("environment should survive");
    assert_eq!(environment.temperature, Some(21.0));
    assert_eq!(environment.humidity, None);
    assert_eq!(environment.pressure, Some(1009.5));
    assert!(alert_id.starts_with("fall_12_"));
}

#[test]
fn test_status_round_trip_recovers_known_fields() {
    let event = Event::new(
        Origin::Serial,
        0,
        Payload::StatusUpdate(StatusUpdate {
            system_active: false,
            fall_sequence_number: Some(5),
            baseline_acceleration: Some(1.02),
            current_acceleration: None,
            environment: Some(Environment::from_device(None, Some(48.0), None)),
        }),
    );

    let Frame::SystemStatus(SystemStatusFrame {
        device_timestamp,
        system_active,
        fall_count,
        baseline_acceleration,
        current_accel,
        sensor_data,
        connections,
        ..
    }) = round_trip(&event)
    else {
        panic!("expected system_status frame");
    };

    assert_eq!(device_timestamp, None);
    assert!(!system_active);
    assert_eq!(fall_count, 5);
    assert_eq!(baseline_acceleration, Some(1.02));
    assert_eq!(current_accel, None);
    assert_eq!(sensor_data.unwrap().environment.humidity, Some(48.0));
    assert_eq!(connections.unwrap().serial, LinkState::Connecting);
}

#[test]
fn test_sensor_reading_round_trip_recovers_known_fields() {
    let event = Event::new(
        Origin::Synthetic,
        0,
        Payload::SensorReading(SensorReading {
            temperature: Some(25.5),
            humidity: None,
            pressure: Some(1013.2),
            acceleration: Vector3::new(0.0, 0.0, 1.0),
            gyroscope: Vector3::new(-12.5, 3.25, 0.0),
        }),
    );

    let Frame::SensorData(SensorDataFrame {
        temperature,
        humidity,
        pressure,
        acceleration,
        gyroscope,
        ..
    }) = round_trip(&event)
    else {
        panic!("expected sensor_data frame");
    };

    assert_eq!(temperature, Some(25.5));
    assert_eq!(humidity, None);
    assert_eq!(pressure, Some(1013.2));
    assert_eq!(acceleration, Vector3::new(0.0, 0.0, 1.0));
    assert_eq!(gyroscope, Vector3::new(-12.5, 3.25, 0.0));
}

#[test]
fn test_decode_dashboard_style_frame() {
    // Frames produced by other dashboard clients decode as long as the
    // required fields are present.
    let text = r#"{
        "type": "sensor_data",
        "timestamp": "2025-10-01T12:00:00.000Z",
        "temperature": 19.5,
        "acceleration": {"x": 0.1, "y": 0.2, "z": 0.9},
        "gyroscope": {"x": 0, "y": 0, "z": 0}
    }"#;

    let frame = decode(text).expect("decode failed");
    assert_eq!(frame.type_name(), "sensor_data");
}
