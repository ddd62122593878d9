//! Acquisition-series lifecycle over both stream engines.
//!
//! Exercises the shared lifecycle contract end to end: begin -> N
//! images -> end, with the exact frame counts and ordering a consumer
//! parses positionally.

use bytes::Bytes;
use ciborium::value::Value;
use eigersim_core::config::HeaderDetail;
use eigersim_core::settings::DetectorSettings;
use eigersim_core::stream::templates::BuiltinTemplates;
use eigersim_core::stream::{ElementType, Image, SimTime, Stream1Engine, Stream2Engine};

fn test_settings() -> DetectorSettings {
    let mut settings = DetectorSettings::default();
    settings.x_pixels_in_detector = 512;
    settings.y_pixels_in_detector = 512;
    settings
}

fn test_image(index: u64, bytes: usize) -> Image {
    Image {
        index,
        hash: "abc".to_string(),
        shape: (512, 512),
        dtype: ElementType::Uint16,
        encoding: "lz4<".to_string(),
        data: Bytes::from(vec![0u8; bytes]),
    }
}

fn json_frame(frame: &Bytes) -> serde_json::Value {
    serde_json::from_slice(frame).unwrap()
}

fn cbor_frame(frame: &Bytes) -> Value {
    let value: Value = ciborium::de::from_reader(frame.as_ref()).unwrap();
    let Value::Tag(55799, inner) = value else {
        panic!("stream2 frame not wrapped in self-describe tag 55799");
    };
    *inner
}

fn cbor_field(message: &Value, key: &str) -> Value {
    message
        .as_map()
        .unwrap()
        .iter()
        .find(|(k, _)| k.as_text() == Some(key))
        .map(|(_, v)| v.clone())
        .unwrap_or_else(|| panic!("message has no {key} field"))
}

#[test]
fn test_stream1_full_series_frame_sequence() {
    let mut engine = Stream1Engine::new(SimTime::ONE_SECOND);
    engine.config_mut().header_detail = HeaderDetail::All;
    let settings = test_settings();

    engine.begin_series(&settings, 7).unwrap();
    for index in 0..3 {
        engine.insert_image(&test_image(index, 1000), 7).unwrap();
    }
    engine.end_series(7).unwrap();

    let frames: Vec<Bytes> = engine.consume_data().collect();
    // 8 series frames + 3 x 4 image frames + 1 footer.
    assert_eq!(frames.len(), 21);

    let header = json_frame(&frames[0]);
    assert_eq!(header["htype"], "dheader-1.0");
    assert_eq!(header["series"], 7);
    assert_eq!(header["header_detail"], "all");

    // Calibration headers sit at positions 3, 5 and 7 (1-based) and
    // carry the sensor shape (y, x).
    for index in [2, 4, 6] {
        let details = json_frame(&frames[index]);
        assert_eq!(details["shape"], serde_json::json!([512, 512]));
    }

    // Each image group: header, characteristics, raw data, config.
    for image_index in 0..3u64 {
        let base = 8 + (image_index as usize) * 4;
        let image_header = json_frame(&frames[base]);
        assert_eq!(image_header["htype"], "dimage-1.0");
        assert_eq!(image_header["frame"], image_index);

        let characteristics = json_frame(&frames[base + 1]);
        assert_eq!(characteristics["size"], 1000);

        assert_eq!(frames[base + 2].len(), 1000);

        let config = json_frame(&frames[base + 3]);
        assert_eq!(config["htype"], "dconfig-1.0");
    }

    let footer = json_frame(&frames[20]);
    assert_eq!(footer["htype"], "dseries_end-1.0");
    assert_eq!(footer["series"], 7);
}

#[test]
fn test_stream1_characteristics_report_payload_size() {
    let mut engine = Stream1Engine::new(SimTime::ONE_SECOND);
    let image = test_image(3, 524288);

    engine.insert_image(&image, 7).unwrap();
    let frames: Vec<Bytes> = engine.consume_data().collect();

    let characteristics = json_frame(&frames[1]);
    assert_eq!(characteristics["size"], 524288);
    assert_eq!(characteristics["shape"], serde_json::json!([512, 512]));
    assert_eq!(characteristics["type"], "uint16");
}

#[test]
fn test_stream1_header_detail_message_counts() {
    for (detail, expected) in [
        (HeaderDetail::None, 1),
        (HeaderDetail::Basic, 2),
        (HeaderDetail::All, 8),
    ] {
        let mut engine = Stream1Engine::new(SimTime::ONE_SECOND);
        engine.config_mut().header_detail = detail;
        engine.begin_series(&test_settings(), 1).unwrap();
        assert_eq!(
            engine.consume_data().count(),
            expected,
            "wrong count for {detail:?}"
        );
    }
}

#[test]
fn test_stream2_full_series_frame_sequence() {
    let mut engine = Stream2Engine::new(&BuiltinTemplates::default(), SimTime::ONE_SECOND).unwrap();
    let settings = test_settings();

    engine
        .begin_series(&settings, 7, HeaderDetail::Basic)
        .unwrap();
    for index in 0..3 {
        engine.insert_image(&test_image(index, 1000), 7).unwrap();
    }
    engine.end_series(7).unwrap();

    let frames: Vec<Bytes> = engine.consume_data().collect();
    assert_eq!(frames.len(), 5);

    let start = cbor_frame(&frames[0]);
    assert_eq!(cbor_field(&start, "type"), Value::Text("start".to_string()));
    assert_eq!(
        cbor_field(&start, "series_id"),
        Value::Integer(7.into())
    );

    for (offset, image_id) in (1..4).zip(0u64..) {
        let image = cbor_frame(&frames[offset]);
        assert_eq!(cbor_field(&image, "type"), Value::Text("image".to_string()));
        assert_eq!(
            cbor_field(&image, "image_id"),
            Value::Integer(image_id.into())
        );
    }

    let end = cbor_frame(&frames[4]);
    assert_eq!(cbor_field(&end, "type"), Value::Text("end".to_string()));
    assert_eq!(cbor_field(&end, "series_id"), Value::Integer(7.into()));
}

#[test]
fn test_stream2_number_of_images_is_trigger_product() {
    let mut settings = test_settings();
    settings.nimages = 100;
    settings.ntrigger = 2;

    let mut engine = Stream2Engine::new(&BuiltinTemplates::default(), SimTime::ONE_SECOND).unwrap();
    engine
        .begin_series(&settings, 1, HeaderDetail::Basic)
        .unwrap();

    let frames: Vec<Bytes> = engine.consume_data().collect();
    let start = cbor_frame(&frames[0]);
    assert_eq!(
        cbor_field(&start, "number_of_images"),
        Value::Integer(200.into())
    );
}

#[test]
fn test_drain_is_idempotently_empty_not_a_replay() {
    let mut stream1 = Stream1Engine::new(SimTime::ONE_SECOND);
    stream1.end_series(1).unwrap();
    assert_eq!(stream1.consume_data().count(), 1);
    assert_eq!(stream1.consume_data().count(), 0);
    assert_eq!(stream1.consume_data().count(), 0);

    let mut stream2 =
        Stream2Engine::new(&BuiltinTemplates::default(), SimTime::ONE_SECOND).unwrap();
    stream2.end_series(1).unwrap();
    assert_eq!(stream2.consume_data().count(), 1);
    assert_eq!(stream2.consume_data().count(), 0);

    stream2.end_series(2).unwrap();
    assert_eq!(stream2.consume_data().count(), 1);
}

#[test]
fn test_partial_drain_resumes_in_order() {
    let mut engine = Stream1Engine::new(SimTime::ONE_SECOND);
    engine.insert_image(&test_image(0, 10), 1).unwrap();

    let mut drain = engine.consume_data();
    let first = drain.next().unwrap();
    drop(drain);

    let header = json_frame(&first);
    assert_eq!(header["htype"], "dimage-1.0");

    // The remaining three frames of the group are still queued.
    assert_eq!(engine.consume_data().count(), 3);
}
