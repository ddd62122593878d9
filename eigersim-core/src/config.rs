//! Stream configuration and status surface.
//!
//! The detector exposes configuration and status as key/value reads and
//! writes against field names. Rather than duck-typed attribute access,
//! every field lives in an explicit enumerated table with typed get/set
//! and per-field access-mode and allowed-value metadata.

use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

/// Errors from the key/value configuration surface.
///
/// Unknown fields are expected from external callers probing the API
/// and are reported, not raised: adapters translate `NoSuchField` into
/// an empty acknowledgment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no such field: {field}")]
    NoSuchField { field: String },

    #[error("field {field} is read-only")]
    ReadOnly { field: String },

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },
}

/// Whether a field accepts external writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

/// Per-field metadata reported alongside values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMetadata {
    pub access: AccessMode,
    /// Enumerated value set, empty for free-form fields.
    pub allowed_values: &'static [&'static str],
}

/// Whether the stream interface emits messages at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamMode {
    #[default]
    Enabled,
    Disabled,
}

impl StreamMode {
    const ALLOWED: &'static [&'static str] = &["disabled", "enabled"];

    fn as_str(&self) -> &'static str {
        match self {
            StreamMode::Enabled => "enabled",
            StreamMode::Disabled => "disabled",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "enabled" => Some(StreamMode::Enabled),
            "disabled" => Some(StreamMode::Disabled),
            _ => None,
        }
    }
}

/// How much auxiliary calibration data accompanies a series start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderDetail {
    None,
    #[default]
    Basic,
    All,
}

impl HeaderDetail {
    const ALLOWED: &'static [&'static str] = &["none", "basic", "all"];

    /// Wire-format spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            HeaderDetail::None => "none",
            HeaderDetail::Basic => "basic",
            HeaderDetail::All => "all",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(HeaderDetail::None),
            "basic" => Some(HeaderDetail::Basic),
            "all" => Some(HeaderDetail::All),
            _ => None,
        }
    }
}

/// Reported stream interface state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamState {
    #[default]
    Ready,
    Acquiring,
    Error,
}

impl StreamState {
    fn as_str(&self) -> &'static str {
        match self {
            StreamState::Ready => "ready",
            StreamState::Acquiring => "acquiring",
            StreamState::Error => "error",
        }
    }
}

/// Stream configuration, mirroring the detector API surface.
///
/// Read by the engines at `begin_series` time; a snapshot is taken per
/// call, never cached across calls.
#[derive(Debug, Clone, Default)]
pub struct StreamConfig {
    pub mode: StreamMode,
    pub header_detail: HeaderDetail,
    pub header_appendix: String,
    pub image_appendix: String,
}

impl StreamConfig {
    /// Field names in the enumerated table.
    pub fn field_names() -> &'static [&'static str] {
        &["mode", "header_detail", "header_appendix", "image_appendix"]
    }

    /// Metadata for a named field.
    ///
    /// # Errors
    ///
    /// - `ConfigError::NoSuchField` - If the name is not in the table
    pub fn field_metadata(field: &str) -> Result<FieldMetadata, ConfigError> {
        let metadata = match field {
            "mode" => FieldMetadata {
                access: AccessMode::ReadWrite,
                allowed_values: StreamMode::ALLOWED,
            },
            "header_detail" => FieldMetadata {
                access: AccessMode::ReadWrite,
                allowed_values: HeaderDetail::ALLOWED,
            },
            "header_appendix" | "image_appendix" => FieldMetadata {
                access: AccessMode::ReadWrite,
                allowed_values: &[],
            },
            _ => {
                return Err(ConfigError::NoSuchField {
                    field: field.to_string(),
                });
            }
        };
        Ok(metadata)
    }

    /// Current value of a named field.
    ///
    /// # Errors
    ///
    /// - `ConfigError::NoSuchField` - If the name is not in the table
    pub fn field_value(&self, field: &str) -> Result<Value, ConfigError> {
        match field {
            "mode" => Ok(json!(self.mode.as_str())),
            "header_detail" => Ok(json!(self.header_detail.as_str())),
            "header_appendix" => Ok(json!(self.header_appendix)),
            "image_appendix" => Ok(json!(self.image_appendix)),
            _ => Err(ConfigError::NoSuchField {
                field: field.to_string(),
            }),
        }
    }

    /// Sets a named field from an external key/value write.
    ///
    /// # Errors
    ///
    /// - `ConfigError::NoSuchField` - If the name is not in the table
    /// - `ConfigError::InvalidValue` - If the value is outside the field's allowed set
    pub fn set_field(&mut self, field: &str, value: &Value) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        };
        match field {
            "mode" => {
                self.mode = value
                    .as_str()
                    .and_then(StreamMode::parse)
                    .ok_or_else(invalid)?;
            }
            "header_detail" => {
                self.header_detail = value
                    .as_str()
                    .and_then(HeaderDetail::parse)
                    .ok_or_else(invalid)?;
            }
            "header_appendix" => {
                self.header_appendix = value.as_str().ok_or_else(invalid)?.to_string();
            }
            "image_appendix" => {
                self.image_appendix = value.as_str().ok_or_else(invalid)?.to_string();
            }
            _ => {
                debug!(field, "stream config has no such field");
                return Err(ConfigError::NoSuchField {
                    field: field.to_string(),
                });
            }
        }
        debug!(field, %value, "stream config updated");
        Ok(())
    }
}

/// Stream status, maintained by the surrounding simulation and only
/// surfaced through this table.
#[derive(Debug, Clone, Default)]
pub struct StreamStatus {
    pub state: StreamState,
    pub error: Vec<String>,
    pub dropped: u64,
}

impl StreamStatus {
    /// Field names in the enumerated table.
    pub fn field_names() -> &'static [&'static str] {
        &["state", "error", "dropped"]
    }

    /// Metadata for a named field. All status fields are read-only.
    ///
    /// # Errors
    ///
    /// - `ConfigError::NoSuchField` - If the name is not in the table
    pub fn field_metadata(field: &str) -> Result<FieldMetadata, ConfigError> {
        if !Self::field_names().contains(&field) {
            return Err(ConfigError::NoSuchField {
                field: field.to_string(),
            });
        }
        Ok(FieldMetadata {
            access: AccessMode::ReadOnly,
            allowed_values: &[],
        })
    }

    /// Current value of a named field.
    ///
    /// # Errors
    ///
    /// - `ConfigError::NoSuchField` - If the name is not in the table
    pub fn field_value(&self, field: &str) -> Result<Value, ConfigError> {
        match field {
            "state" => Ok(json!(self.state.as_str())),
            "error" => Ok(json!(self.error)),
            "dropped" => Ok(json!(self.dropped)),
            _ => Err(ConfigError::NoSuchField {
                field: field.to_string(),
            }),
        }
    }

    /// Rejects external writes: every status field is read-only.
    ///
    /// # Errors
    ///
    /// - `ConfigError::ReadOnly` - If the field exists
    /// - `ConfigError::NoSuchField` - Otherwise
    pub fn set_field(&mut self, field: &str, _value: &Value) -> Result<(), ConfigError> {
        if Self::field_names().contains(&field) {
            return Err(ConfigError::ReadOnly {
                field: field.to_string(),
            });
        }
        Err(ConfigError::NoSuchField {
            field: field.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = StreamConfig::default();
        assert_eq!(config.mode, StreamMode::Enabled);
        assert_eq!(config.header_detail, HeaderDetail::Basic);
        assert_eq!(config.header_appendix, "");
    }

    #[test]
    fn test_set_enumerated_field() {
        let mut config = StreamConfig::default();
        config.set_field("header_detail", &json!("all")).unwrap();
        assert_eq!(config.header_detail, HeaderDetail::All);

        let result = config.set_field("header_detail", &json!("verbose"));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_unknown_field_is_reported_not_panicked() {
        let mut config = StreamConfig::default();
        let result = config.set_field("nonsense", &json!("x"));
        assert!(matches!(result, Err(ConfigError::NoSuchField { .. })));

        let result = config.field_value("nonsense");
        assert!(matches!(result, Err(ConfigError::NoSuchField { .. })));
    }

    #[test]
    fn test_field_metadata_allowed_values() {
        let metadata = StreamConfig::field_metadata("header_detail").unwrap();
        assert_eq!(metadata.access, AccessMode::ReadWrite);
        assert_eq!(metadata.allowed_values, &["none", "basic", "all"]);
    }

    #[test]
    fn test_status_fields_are_read_only() {
        let mut status = StreamStatus::default();
        let result = status.set_field("dropped", &json!(3));
        assert!(matches!(result, Err(ConfigError::ReadOnly { .. })));

        assert_eq!(status.field_value("state").unwrap(), json!("ready"));
        assert_eq!(status.field_value("dropped").unwrap(), json!(0));
    }
}
