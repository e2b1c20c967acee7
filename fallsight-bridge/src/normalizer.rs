//! Device record normalization.
//!
//! Maps one raw inbound record (a BLE notification or a serial line) to at
//! most one canonical [`Event`]. Three encodings are accepted:
//!
//! - JSON objects, with compact (`t`, `sev`, `acc: [x,y,z]`) or verbose
//!   (`type`, `severity`, `acceleration: {x,y,z}`) keys
//! - Bare keywords: `CAIDA`, `OK`, `CONNECTED`, `INIT`
//! - Plain `key:value,key:value` sensor lines, e.g. `temp:25.5,hum:60.2`

use serde_json::{Map, Value};
use thiserror::Error;

use fallsight_common::event::known_reading;
use fallsight_common::{
    Environment, Event, FallAlert, IdentifyAck, Origin, Payload, SensorReading, Severity,
    StatusUpdate, Vector3,
};

/// Record that could not be decoded. The record is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Malformed JSON record: {0}")]
    MalformedJson(String),

    #[error("Malformed plain-text record: {0}")]
    MalformedPlainText(String),
}

/// Normalize a raw record from `origin`.
///
/// Returns `Ok(None)` for empty records and for JSON kinds the bridge does
/// not handle.
pub fn normalize(origin: Origin, raw: &[u8]) -> Result<Option<Event>, ParseError> {
    let text = String::from_utf8_lossy(raw);
    let text = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');

    if text.is_empty() {
        return Ok(None);
    }

    if text.starts_with('{') {
        return normalize_json(origin, text);
    }

    if let Some(payload) = keyword(text) {
        return Ok(Some(Event::new(origin, 0, payload)));
    }

    normalize_plain(origin, text).map(Some)
}

fn keyword(text: &str) -> Option<Payload> {
    if text.eq_ignore_ascii_case("CAIDA") {
        Some(Payload::FallAlert(FallAlert {
            severity: Severity::High,
            ..FallAlert::default()
        }))
    } else if text.eq_ignore_ascii_case("OK") || text.eq_ignore_ascii_case("CONNECTED") {
        Some(Payload::StatusUpdate(StatusUpdate::default()))
    } else if text.eq_ignore_ascii_case("INIT") {
        Some(Payload::StatusUpdate(StatusUpdate {
            system_active: false,
            ..StatusUpdate::default()
        }))
    } else {
        None
    }
}

// JSON records

const SENSOR_KEYS: [&str; 10] = [
    "temp",
    "temperature",
    "hum",
    "humidity",
    "press",
    "pressure",
    "acc",
    "acceleration",
    "gyr",
    "gyroscope",
];

fn normalize_json(origin: Origin, text: &str) -> Result<Option<Event>, ParseError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ParseError::MalformedJson(e.to_string()))?;

    let Value::Object(record) = value else {
        return Err(ParseError::MalformedJson(
            "record is not a JSON object".to_string(),
        ));
    };

    let kind = field(&record, "t", "type", Value::as_str).map(|k| k.trim().to_ascii_uppercase());

    let payload = match kind.as_deref() {
        Some("FALL" | "FALL_ALERT") => Payload::FallAlert(fall_alert(&record)),
        Some("STATUS" | "STATUS_UPDATE" | "SYSTEM_STATUS") => {
            Payload::StatusUpdate(status_update(&record))
        }
        Some("SENSOR" | "SENSOR_DATA") => Payload::SensorReading(sensor_reading(&record)),
        Some("CONNECTION") => Payload::IdentifyAck(identify_ack(&record)),
        None if SENSOR_KEYS.iter().any(|k| record.contains_key(*k)) => {
            Payload::SensorReading(sensor_reading(&record))
        }
        other => {
            tracing::trace!(origin = %origin, kind = ?other, "Ignoring record of unknown kind");
            return Ok(None);
        }
    };

    let origin_timestamp = field(&record, "ts", "timestamp", unsigned).unwrap_or(0);

    Ok(Some(Event::new(origin, origin_timestamp, payload)))
}

fn fall_alert(record: &Map<String, Value>) -> FallAlert {
    FallAlert {
        severity: field(record, "sev", "severity", |v| v.as_str().and_then(Severity::parse))
            .unwrap_or_default(),
        magnitude: known_reading(field(record, "mag", "magnitude", number)),
        fall_sequence_number: sequence_number(record),
        acceleration: vector(record, "acc", "acceleration"),
        environment: environment(record),
    }
}

fn status_update(record: &Map<String, Value>) -> StatusUpdate {
    StatusUpdate {
        system_active: field(record, "sa", "system_active", boolean).unwrap_or(true),
        fall_sequence_number: sequence_number(record),
        baseline_acceleration: known_reading(field(record, "bl", "baseline", number)),
        current_acceleration: known_reading(field(record, "ca", "current_accel", number)),
        environment: environment(record),
    }
}

fn sensor_reading(record: &Map<String, Value>) -> SensorReading {
    SensorReading {
        temperature: known_reading(field(record, "temp", "temperature", number)),
        humidity: known_reading(field(record, "hum", "humidity", number)),
        pressure: known_reading(field(record, "press", "pressure", number)),
        acceleration: vector(record, "acc", "acceleration"),
        gyroscope: vector(record, "gyr", "gyroscope"),
    }
}

fn identify_ack(record: &Map<String, Value>) -> IdentifyAck {
    let text = |key: &str| record.get(key).and_then(Value::as_str).map(str::to_string);
    IdentifyAck {
        status: text("status"),
        message: text("message"),
    }
}

/// Short key first, then long key. A short key whose value `extract`
/// rejects (`null`, wrong type, out of range) counts as absent.
fn field<'a, T>(
    record: &'a Map<String, Value>,
    short: &str,
    long: &str,
    extract: impl Fn(&'a Value) -> Option<T>,
) -> Option<T> {
    record
        .get(short)
        .and_then(&extract)
        .or_else(|| record.get(long).and_then(&extract))
}

/// Finite numbers only; `"nan"` and `"inf"` strings are rejected.
fn number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|v: &f64| v.is_finite())
}

fn unsigned(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        number(value)
            .filter(|v| *v >= 0.0)
            .map(|v| v as u64)
    })
}

fn boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        _ => None,
    }
}

/// Device counters start at 1; 0 means the device did not number the event.
fn sequence_number(record: &Map<String, Value>) -> Option<u64> {
    field(record, "fc", "fall_count", |v| unsigned(v).filter(|n| *n > 0))
}

/// Either encoding may sit under either key; a `[x,y,z]` array wins over a
/// nested object. Missing axes are 0.
fn vector(record: &Map<String, Value>, short: &str, long: &str) -> Vector3 {
    let candidates = [record.get(short), record.get(long)];

    if let Some(items) = candidates.iter().flatten().find_map(|v| v.as_array()) {
        let axis = |i: usize| items.get(i).and_then(number).unwrap_or(0.0);
        return Vector3::new(axis(0), axis(1), axis(2));
    }

    if let Some(object) = candidates.iter().flatten().find_map(|v| v.as_object()) {
        let axis = |k: &str| object.get(k).and_then(number).unwrap_or(0.0);
        return Vector3::new(axis("x"), axis("y"), axis("z"));
    }

    Vector3::default()
}

/// `env: [t, h, p]` or `environment: {temperature, humidity, pressure}`.
fn environment(record: &Map<String, Value>) -> Option<Environment> {
    let candidates = [record.get("env"), record.get("environment")];

    if let Some(items) = candidates
        .iter()
        .flatten()
        .find_map(|v| v.as_array())
        .filter(|items| !items.is_empty())
    {
        let item = |i: usize| items.get(i).and_then(number);
        return Some(Environment::from_device(item(0), item(1), item(2)));
    }

    candidates
        .iter()
        .flatten()
        .find_map(|v| v.as_object())
        .map(|object| {
            let item = |k: &str| object.get(k).and_then(number);
            Environment::from_device(item("temperature"), item("humidity"), item("pressure"))
        })
}

// Plain-text records

fn normalize_plain(origin: Origin, text: &str) -> Result<Event, ParseError> {
    let mut reading = SensorReading::default();
    let mut origin_timestamp = 0;
    let mut recognized = 0usize;

    for pair in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = pair
            .split_once(':')
            .ok_or_else(|| ParseError::MalformedPlainText(format!("'{}' is not key:value", pair)))?;

        let key = key.trim().to_ascii_lowercase();
        let value = value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                ParseError::MalformedPlainText(format!("'{}' has a non-numeric value", pair))
            })?;

        match key.as_str() {
            "temp" | "temperature" => reading.temperature = known_reading(Some(value)),
            "hum" | "humidity" => reading.humidity = known_reading(Some(value)),
            "press" | "pressure" => reading.pressure = known_reading(Some(value)),
            "acc_x" => reading.acceleration.x = value,
            "acc_y" => reading.acceleration.y = value,
            "acc_z" => reading.acceleration.z = value,
            "gyro_x" | "gyr_x" => reading.gyroscope.x = value,
            "gyro_y" | "gyr_y" => reading.gyroscope.y = value,
            "gyro_z" | "gyr_z" => reading.gyroscope.z = value,
            "ts" | "timestamp" if value >= 0.0 => {
                origin_timestamp = value as u64
            }
            _ => continue,
        }
        recognized += 1;
    }

    if recognized == 0 {
        return Err(ParseError::MalformedPlainText(format!(
            "no recognized field in '{}'",
            text
        )));
    }

    Ok(Event::new(
        origin,
        origin_timestamp,
        Payload::SensorReading(reading),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fallsight_common::EventKind;

    fn fall(event: &Event) -> &FallAlert {
        match event.payload() {
            Payload::FallAlert(alert) => alert,
            other => panic!("expected fall alert, got {:?}", other),
        }
    }

    fn status(event: &Event) -> &StatusUpdate {
        match event.payload() {
            Payload::StatusUpdate(status) => status,
            other => panic!("expected status update, got {:?}", other),
        }
    }

    fn reading(event: &Event) -> &SensorReading {
        match event.payload() {
            Payload::SensorReading(reading) => reading,
            other => panic!("expected sensor reading, got {:?}", other),
        }
    }

    fn parse(raw: &str) -> Event {
        normalize(Origin::Wireless, raw.as_bytes())
            .unwrap()
            .expect("record should produce an event")
    }

    #[test]
    fn test_compact_fall() {
        let event = parse(
            r#"{"t":"FALL","sev":"high","mag":3.4,"fc":2,"ts":12345,"acc":[0.1,-2.0,0.5],"env":[23.5,-999,1011.2]}"#,
        );

        assert_eq!(event.origin(), Origin::Wireless);
        assert_eq!(event.origin_timestamp(), 12345);
        let alert = fall(&event);
        assert_eq!(alert.severity, Severity::High);
        assert_eq!(alert.magnitude, Some(3.4));
        assert_eq!(alert.fall_sequence_number, Some(2));
        assert_eq!(alert.acceleration, Vector3::new(0.1, -2.0, 0.5));
        let env = alert.environment.unwrap();
        assert_eq!(env.temperature, Some(23.5));
        assert_eq!(env.humidity, None);
        assert_eq!(env.pressure, Some(1011.2));
    }

    #[test]
    fn test_verbose_fall_defaults() {
        let event = parse(r#"{"type":"FALL_ALERT"}"#);

        let alert = fall(&event);
        assert_eq!(alert.severity, Severity::Medium);
        assert_eq!(alert.magnitude, None);
        assert_eq!(alert.fall_sequence_number, None);
        assert_eq!(alert.acceleration, Vector3::default());
        assert_eq!(alert.environment, None);
        assert_eq!(event.origin_timestamp(), 0);
    }

    #[test]
    fn test_array_preferred_over_object() {
        let event = parse(
            r#"{"t":"FALL","acceleration":{"x":9,"y":9,"z":9},"acc":[1,2,3]}"#,
        );
        assert_eq!(fall(&event).acceleration, Vector3::new(1.0, 2.0, 3.0));

        let event = parse(r#"{"t":"FALL","acc":{"x":4,"y":5},"acceleration":[7,8,9]}"#);
        assert_eq!(fall(&event).acceleration, Vector3::new(7.0, 8.0, 9.0));
    }

    #[test]
    fn test_short_array_pads_with_zero() {
        let event = parse(r#"{"t":"FALL","acc":[1.5]}"#);
        assert_eq!(fall(&event).acceleration, Vector3::new(1.5, 0.0, 0.0));
    }

    #[test]
    fn test_status_record() {
        let event = parse(
            r#"{"type":"STATUS","system_active":false,"fall_count":4,"baseline":1.01,"environment":{"temperature":21.0,"humidity":40,"pressure":-999}}"#,
        );

        let status = status(&event);
        assert!(!status.system_active);
        assert_eq!(status.fall_sequence_number, Some(4));
        assert_eq!(status.baseline_acceleration, Some(1.01));
        assert_eq!(status.current_acceleration, None);
        let env = status.environment.unwrap();
        assert_eq!(env.humidity, Some(40.0));
        assert_eq!(env.pressure, None);
    }

    #[test]
    fn test_status_zero_count_is_unnumbered() {
        let event = parse(r#"{"t":"STATUS","sa":1,"fc":0}"#);
        let status = status(&event);
        assert!(status.system_active);
        assert_eq!(status.fall_sequence_number, None);
    }

    #[test]
    fn test_json_sensor_record() {
        let event = parse(
            r#"{"type":"sensor_data","temperature":25.5,"acceleration":{"x":0.1,"y":0.2,"z":0.98},"gyroscope":{"x":1,"y":-1,"z":0}}"#,
        );

        let reading = reading(&event);
        assert_eq!(reading.temperature, Some(25.5));
        assert_eq!(reading.humidity, None);
        assert_eq!(reading.acceleration, Vector3::new(0.1, 0.2, 0.98));
        assert_eq!(reading.gyroscope, Vector3::new(1.0, -1.0, 0.0));
    }

    #[test]
    fn test_kindless_sensor_object() {
        let event = parse(r#"{"temperature":19.0,"humidity":55.0}"#);
        assert_eq!(event.kind(), EventKind::SensorReading);
    }

    #[test]
    fn test_connection_ack() {
        let event = normalize(
            Origin::Dashboard,
            br#"{"type":"connection","status":"connected","message":"Bienvenido"}"#,
        )
        .unwrap()
        .unwrap();

        let Payload::IdentifyAck(ack) = event.payload() else {
            panic!("expected identify ack");
        };
        assert_eq!(ack.status.as_deref(), Some("connected"));
        assert_eq!(ack.message.as_deref(), Some("Bienvenido"));
    }

    #[test]
    fn test_unknown_kind_is_ignored() {
        assert_eq!(
            normalize(Origin::Wireless, br#"{"t":"CALIBRATION","x":1}"#),
            Ok(None)
        );
        assert_eq!(normalize(Origin::Wireless, br#"{"id":7}"#), Ok(None));
    }

    #[test]
    fn test_truncated_json_is_malformed() {
        assert!(matches!(
            normalize(Origin::Serial, b"{]"),
            Err(ParseError::MalformedJson(_))
        ));
        assert!(matches!(
            normalize(Origin::Serial, br#"{"t":"FALL""#),
            Err(ParseError::MalformedJson(_))
        ));
    }

    #[test]
    fn test_empty_and_padding() {
        assert_eq!(normalize(Origin::Wireless, b""), Ok(None));
        assert_eq!(normalize(Origin::Wireless, b" \r\n\0\0"), Ok(None));

        let event = normalize(Origin::Wireless, b"CAIDA\0\0\r\n").unwrap().unwrap();
        assert_eq!(event.kind(), EventKind::FallAlert);
    }

    #[test]
    fn test_keywords() {
        let alert = parse("CAIDA");
        assert_eq!(fall(&alert).severity, Severity::High);
        assert_eq!(fall(&alert).fall_sequence_number, None);

        assert!(status(&parse("OK")).system_active);
        assert!(status(&parse("CONNECTED")).system_active);
        assert!(!status(&parse("INIT")).system_active);
    }

    #[test]
    fn test_plain_text_reading() {
        let event = parse("acc_x:0.12,acc_y:-0.5,acc_z:0.98,gyro_x:10.5,gyro_y:0,gyro_z:-3");
        let reading = reading(&event);
        assert_eq!(reading.acceleration, Vector3::new(0.12, -0.5, 0.98));
        assert_eq!(reading.gyroscope, Vector3::new(10.5, 0.0, -3.0));
        assert_eq!(reading.temperature, None);
    }

    #[test]
    fn test_plain_text_ignores_unknown_keys() {
        let event = parse("temp:21.0,battery:87");
        assert_eq!(reading(&event).temperature, Some(21.0));
    }

    #[test]
    fn test_plain_text_sentinel() {
        let event = parse("temp:-999,hum:45");
        assert_eq!(reading(&event).temperature, None);
        assert_eq!(reading(&event).humidity, Some(45.0));
    }

    #[test]
    fn test_plain_text_errors() {
        for raw in ["hello world", "temp:abc", "temp=25", "battery:87", "temp:1:2"] {
            assert!(
                matches!(
                    normalize(Origin::Serial, raw.as_bytes()),
                    Err(ParseError::MalformedPlainText(_))
                ),
                "expected MalformedPlainText for {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_plain_text_rejects_non_finite_values() {
        for raw in ["acc_x:nan", "gyro_z:inf", "temp:21.0,acc_y:-inf", "hum:NaN"] {
            assert!(
                matches!(
                    normalize(Origin::Serial, raw.as_bytes()),
                    Err(ParseError::MalformedPlainText(_))
                ),
                "expected MalformedPlainText for {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_json_non_finite_strings_are_absent() {
        let event = parse(r#"{"t":"FALL","mag":"inf","acc":["nan",1,2],"env":["NaN",40,"-inf"]}"#);
        let alert = fall(&event);
        assert_eq!(alert.magnitude, None);
        assert_eq!(alert.acceleration, Vector3::new(0.0, 1.0, 2.0));
        let env = alert.environment.unwrap();
        assert_eq!(env.temperature, None);
        assert_eq!(env.humidity, Some(40.0));
        assert_eq!(env.pressure, None);
    }

    #[test]
    fn test_unusable_short_key_falls_back_to_long_key() {
        let event = parse(r#"{"t":"FALL","fc":"abc","fall_count":4,"sev":3,"severity":"high"}"#);
        let alert = fall(&event);
        assert_eq!(alert.fall_sequence_number, Some(4));
        assert_eq!(alert.severity, Severity::High);

        let event = parse(r#"{"t":"STATUS","sa":"yes","system_active":false,"bl":[1],"baseline":0.98}"#);
        let status = status(&event);
        assert!(!status.system_active);
        assert_eq!(status.baseline_acceleration, Some(0.98));

        let event = parse(r#"{"t":7,"type":"FALL","ts":"soon","timestamp":500}"#);
        assert_eq!(event.kind(), EventKind::FallAlert);
        assert_eq!(event.origin_timestamp(), 500);
    }

    #[test]
    fn test_lossy_utf8() {
        let event = normalize(Origin::Serial, b"temp:20.5,\xffnote:1").unwrap().unwrap();
        assert_eq!(reading(&event).temperature, Some(20.5));
    }
}
