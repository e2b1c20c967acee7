//! Normalizer properties over realistic device records.

use fallsight_bridge::{ParseError, normalize};
use fallsight_common::{
    Environment, Frame, FrameContext, Origin, Payload, SensorReading, Severity, Vector3, decode,
    encode,
};

#[test]
fn test_short_and_long_keys_are_equivalent() {
    let short = br#"{"t":"FALL","sev":"high","mag":2.7,"fc":5,"ts":98765,"acc":[0.12,-1.8,0.4],"env":[22.5,48.0,1009.8]}"#;
    let long = br#"{"type":"FALL_ALERT","severity":"HIGH","magnitude":2.7,"fall_count":5,"timestamp":98765,"acceleration":{"x":0.12,"y":-1.8,"z":0.4},"environment":{"temperature":22.5,"humidity":48.0,"pressure":1009.8}}"#;

    let a = normalize(Origin::Wireless, short).unwrap().unwrap();
    let b = normalize(Origin::Wireless, long).unwrap().unwrap();

    assert_eq!(a.payload(), b.payload());
    assert_eq!(a.origin_timestamp(), b.origin_timestamp());
    assert_eq!(a.fall_sequence_number(), Some(5));

    let Payload::FallAlert(alert) = a.payload() else {
        panic!("expected fall alert");
    };
    assert_eq!(alert.severity, Severity::High);
    assert_eq!(alert.acceleration, Vector3::new(0.12, -1.8, 0.4));
}

#[test]
fn test_sentinel_in_any_environment_position_is_unknown() {
    let records: [&[u8]; 3] = [
        br#"{"t":"FALL","env":[-999,48.0,1009.8]}"#,
        br#"{"t":"FALL","env":[22.5,-999,1009.8]}"#,
        br#"{"t":"FALL","env":[22.5,48.0,-999]}"#,
    ];

    for (position, record) in records.iter().enumerate() {
        let event = normalize(Origin::Wireless, record).unwrap().unwrap();
        let Payload::FallAlert(alert) = event.payload() else {
            panic!("expected fall alert");
        };
        let env = alert.environment.unwrap();
        let values = [env.temperature, env.humidity, env.pressure];
        for (i, value) in values.iter().enumerate() {
            assert_eq!(value.is_none(), i == position, "position {}", position);
        }
    }
}

#[test]
fn test_all_sentinels_in_status() {
    let event = normalize(
        Origin::Wireless,
        br#"{"type":"STATUS","environment":{"temperature":-999,"humidity":-999,"pressure":-999}}"#,
    )
    .unwrap()
    .unwrap();
    let Payload::StatusUpdate(status) = event.payload() else {
        panic!("expected status update");
    };
    assert_eq!(status.environment, Some(Environment::default()));
}

#[test]
fn test_truncated_json_then_valid_record() {
    let stream: [&[u8]; 2] = [br#"{"t":"FALL","fc":3,"acc":[0.1,"#, br#"{"t":"FALL","fc":3}"#];

    let first = normalize(Origin::Serial, stream[0]);
    assert!(matches!(first, Err(ParseError::MalformedJson(_))));

    let second = normalize(Origin::Serial, stream[1]).unwrap().unwrap();
    assert_eq!(second.fall_sequence_number(), Some(3));
}

#[test]
fn test_plain_text_environment_line() {
    let event = normalize(Origin::Serial, b"temp:25.5,hum:60.2,press:1013.2\r\n")
        .unwrap()
        .unwrap();

    assert_eq!(event.origin(), Origin::Serial);
    assert_eq!(
        event.payload(),
        &Payload::SensorReading(SensorReading {
            temperature: Some(25.5),
            humidity: Some(60.2),
            pressure: Some(1013.2),
            acceleration: Vector3::default(),
            gyroscope: Vector3::default(),
        })
    );
}

#[test]
fn test_bare_fall_keyword_from_either_link() {
    for origin in [Origin::Wireless, Origin::Serial, Origin::Synthetic] {
        let event = normalize(origin, b"caida").unwrap().unwrap();
        assert_eq!(event.origin(), origin);
        assert_eq!(event.fall_sequence_number(), None);
        assert!(matches!(event.payload(), Payload::FallAlert(_)));
    }
}

#[test]
fn test_garbage_plain_text_is_malformed() {
    assert!(matches!(
        normalize(Origin::Serial, b"temp:warm"),
        Err(ParseError::MalformedPlainText(_))
    ));
    assert!(matches!(
        normalize(Origin::Serial, b"hello world"),
        Err(ParseError::MalformedPlainText(_))
    ));
}

#[test]
fn test_non_finite_tokens_never_reach_the_dashboard() {
    for raw in ["acc_x:nan,acc_y:0.1", "gyro_z:inf", "temp:-inf,hum:50"] {
        assert!(
            matches!(
                normalize(Origin::Serial, raw.as_bytes()),
                Err(ParseError::MalformedPlainText(_))
            ),
            "expected MalformedPlainText for {:?}",
            raw
        );
    }

    let ctx = FrameContext {
        user_id: "cliente123",
        location: None,
        device_name: None,
        connections: None,
    };
    let records: [&[u8]; 3] = [
        br#"{"t":"SENSOR","acc":["nan",1,2],"gyr":{"x":"inf"},"temp":"NaN"}"#,
        br#"{"t":"FALL","mag":"infinity","acc":[0.5,"-inf",1],"env":["nan",40,1000]}"#,
        br#"{"t":"STATUS","bl":"nan","ca":"inf","environment":{"pressure":"-inf"}}"#,
    ];

    for record in records {
        let event = normalize(Origin::Wireless, record).unwrap().unwrap();
        let frame = Frame::from_event(&event, &ctx).unwrap();
        let text = encode(&frame).unwrap();
        assert_eq!(decode(&text).unwrap(), frame, "record {:?}", record);
    }
}
