//! External key/value access against the stream configuration surface.
//!
//! Adapters set and read fields by name; unknown names are reported
//! back, never raised, and status fields reject writes.

use eigersim_core::config::{
    AccessMode, ConfigError, HeaderDetail, StreamConfig, StreamStatus,
};
use serde_json::json;

#[test]
fn test_config_fields_are_enumerable_and_writable() {
    let mut config = StreamConfig::default();

    for field in StreamConfig::field_names() {
        let metadata = StreamConfig::field_metadata(field).unwrap();
        assert_eq!(metadata.access, AccessMode::ReadWrite);
        config.field_value(field).unwrap();
    }

    config.set_field("mode", &json!("disabled")).unwrap();
    config.set_field("header_detail", &json!("none")).unwrap();
    config
        .set_field("header_appendix", &json!("{\"run\": 42}"))
        .unwrap();

    assert_eq!(config.field_value("mode").unwrap(), json!("disabled"));
    assert_eq!(config.header_detail, HeaderDetail::None);
    assert_eq!(
        config.field_value("header_appendix").unwrap(),
        json!("{\"run\": 42}")
    );
}

#[test]
fn test_unknown_field_reports_no_such_field() {
    let mut config = StreamConfig::default();

    let result = config.set_field("threshold", &json!("4000"));
    assert!(matches!(result, Err(ConfigError::NoSuchField { .. })));

    let result = config.field_value("threshold");
    assert!(matches!(result, Err(ConfigError::NoSuchField { .. })));

    // The config itself is untouched by the failed write.
    assert_eq!(config.header_detail, HeaderDetail::Basic);
}

#[test]
fn test_enumerated_fields_reject_out_of_range_values() {
    let mut config = StreamConfig::default();
    let result = config.set_field("mode", &json!("sometimes"));
    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));

    let metadata = StreamConfig::field_metadata("mode").unwrap();
    assert_eq!(metadata.allowed_values, &["disabled", "enabled"]);
}

#[test]
fn test_status_surface_is_read_only() {
    let mut status = StreamStatus {
        state: Default::default(),
        error: vec!["link lost".to_string()],
        dropped: 4,
    };

    assert_eq!(status.field_value("state").unwrap(), json!("ready"));
    assert_eq!(status.field_value("error").unwrap(), json!(["link lost"]));
    assert_eq!(status.field_value("dropped").unwrap(), json!(4));

    for field in StreamStatus::field_names() {
        let metadata = StreamStatus::field_metadata(field).unwrap();
        assert_eq!(metadata.access, AccessMode::ReadOnly);
        let result = status.set_field(field, &json!("x"));
        assert!(matches!(result, Err(ConfigError::ReadOnly { .. })));
    }
}
