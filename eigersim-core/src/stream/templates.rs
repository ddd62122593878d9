//! Stream2 message templates and their sources.
//!
//! The stream2 engine patches static start/image/end templates rather
//! than building messages field by field. Template loading is an
//! injected concern: a [`TemplateSource`] either decodes captured CBOR
//! fixtures ([`CborTemplateSource`]) or constructs equivalent maps in
//! code ([`BuiltinTemplates`]), so the engine never depends on a file
//! layout.

use ciborium::value::Value;

use super::codec::{self, SELF_DESCRIBE_TAG};
use super::{StreamError, value_map};
use crate::settings::{DetectorSettings, GonioAxis};

/// Entry count of the countrate correction lookup table.
const LOOKUP_TABLE_LEN: usize = 65536;

/// Byte width of the zero-filled auxiliary array elements (float32 for
/// flatfield and countrate data, uint32 for the pixel mask).
const AUX_ELEMENT_WIDTH: usize = 4;

/// Fields only present in a `header_detail = all` start message.
pub const START_ALL_FIELDS: [&str; 3] = [
    "flatfield",
    "pixel_mask",
    "countrate_correction_lookup_table",
];

/// The three stream2 message templates.
#[derive(Debug, Clone)]
pub struct StreamTemplates {
    pub start: Value,
    pub image: Value,
    pub end: Value,
}

/// Provides start/image/end templates to a stream2 engine.
pub trait TemplateSource {
    /// Loads the templates.
    ///
    /// # Errors
    ///
    /// - `StreamError::Template` - If a template cannot be produced or has the wrong shape
    fn load(&self) -> Result<StreamTemplates, StreamError>;
}

/// Template source decoding captured CBOR fixture bytes.
///
/// Tagged values are resolved through the stream2 tag table, a
/// self-describe envelope is stripped if present, and the large
/// auxiliary arrays the fixtures omit are populated with zeroed
/// buffers sized from the template's own sensor geometry.
#[derive(Debug, Clone)]
pub struct CborTemplateSource {
    start: Vec<u8>,
    image: Vec<u8>,
    end: Vec<u8>,
}

impl CborTemplateSource {
    /// Creates a source over raw fixture encodings.
    pub fn new(start: Vec<u8>, image: Vec<u8>, end: Vec<u8>) -> Self {
        Self { start, image, end }
    }

    fn decode(bytes: &[u8], what: &str) -> Result<Value, StreamError> {
        let value: Value =
            ciborium::de::from_reader(bytes).map_err(|e| StreamError::Template {
                reason: format!("{what} template: {e}"),
            })?;
        // Wire captures arrive wrapped in the self-describe envelope.
        let value = match value {
            Value::Tag(SELF_DESCRIBE_TAG, inner) => *inner,
            other => other,
        };
        Ok(codec::resolve_tags(value)?)
    }
}

impl TemplateSource for CborTemplateSource {
    fn load(&self) -> Result<StreamTemplates, StreamError> {
        let mut start = Self::decode(&self.start, "start")?;
        populate_auxiliary_data(&mut start)?;
        Ok(StreamTemplates {
            start,
            image: Self::decode(&self.image, "image")?,
            end: Self::decode(&self.end, "end")?,
        })
    }
}

/// Fills in the zeroed auxiliary arrays a captured start fixture omits.
fn populate_auxiliary_data(start: &mut Value) -> Result<(), StreamError> {
    let entries = value_map::as_map_mut(start, "start template")?;

    let size_of = |entries: &[(Value, Value)], key: &str| -> Result<usize, StreamError> {
        value_map::get(entries, key)
            .and_then(|v| v.as_integer())
            .and_then(|i| u64::try_from(i).ok())
            .map(|size| size as usize)
            .ok_or_else(|| StreamError::Template {
                reason: format!("start template has no integer {key}"),
            })
    };
    let sensor_bytes =
        size_of(entries, "image_size_y")? * size_of(entries, "image_size_x")? * AUX_ELEMENT_WIDTH;

    value_map::insert(
        entries,
        "countrate_correction_lookup_table",
        Value::Bytes(vec![0; LOOKUP_TABLE_LEN * AUX_ELEMENT_WIDTH]),
    );
    for field in ["flatfield", "pixel_mask"] {
        let plane_map = value_map::get_mut(entries, field).ok_or_else(|| {
            StreamError::Template {
                reason: format!("start template has no {field} map"),
            }
        })?;
        let planes = value_map::as_map_mut(plane_map, field)?;
        value_map::insert(planes, "threshold_1", Value::Bytes(vec![0; sensor_bytes]));
    }
    Ok(())
}

/// Default template source: builds the three templates in code.
///
/// Field content matches what [`CborTemplateSource`] yields for a
/// captured fixture of the same geometry, so the engine behaves
/// identically whichever source it is constructed with.
#[derive(Debug, Clone)]
pub struct BuiltinTemplates {
    pub image_size_x: u32,
    pub image_size_y: u32,
}

impl Default for BuiltinTemplates {
    fn default() -> Self {
        let settings = DetectorSettings::default();
        Self {
            image_size_x: settings.x_pixels_in_detector,
            image_size_y: settings.y_pixels_in_detector,
        }
    }
}

fn entry(key: &str, value: Value) -> (Value, Value) {
    (Value::Text(key.to_string()), value)
}

impl BuiltinTemplates {
    /// Builds templates for the given sensor geometry.
    pub fn with_geometry(image_size_x: u32, image_size_y: u32) -> Self {
        Self {
            image_size_x,
            image_size_y,
        }
    }

    fn start_template(&self) -> Value {
        let settings = DetectorSettings::default();
        let sensor_bytes =
            self.image_size_x as usize * self.image_size_y as usize * AUX_ELEMENT_WIDTH;

        let goniometer = Value::Map(
            GonioAxis::ALL
                .iter()
                .map(|axis| {
                    entry(
                        axis.name(),
                        Value::Map(vec![
                            entry("start", Value::Float(0.0)),
                            entry("increment", Value::Float(0.0)),
                        ]),
                    )
                })
                .collect(),
        );
        let zero_planes = || Value::Map(vec![entry("threshold_1", Value::Bytes(vec![0; sensor_bytes]))]);

        Value::Map(vec![
            entry("type", Value::Text("start".to_string())),
            entry("series_id", Value::Integer(0.into())),
            entry("series_unique_id", Value::Text(String::new())),
            entry("number_of_images", Value::Integer(1.into())),
            entry(
                "image_size_x",
                Value::Integer(self.image_size_x.into()),
            ),
            entry(
                "image_size_y",
                Value::Integer(self.image_size_y.into()),
            ),
            entry("count_time", Value::Float(settings.count_time)),
            entry("frame_time", Value::Float(settings.frame_time)),
            entry(
                "countrate_correction_enabled",
                Value::Bool(settings.countrate_correction_applied),
            ),
            entry(
                "detector_description",
                Value::Text(settings.description.clone()),
            ),
            entry(
                "detector_serial_number",
                Value::Text(settings.detector_number.clone()),
            ),
            entry(
                "flatfield_enabled",
                Value::Bool(settings.flatfield_correction_applied),
            ),
            entry("incident_energy", Value::Float(settings.threshold_energy)),
            entry("incident_wavelength", Value::Float(settings.wavelength)),
            entry(
                "pixel_mask_enabled",
                Value::Bool(settings.pixel_mask_applied),
            ),
            entry("pixel_size_x", Value::Float(settings.x_pixel_size)),
            entry("pixel_size_y", Value::Float(settings.y_pixel_size)),
            entry(
                "saturation_value",
                Value::Integer(settings.countrate_correction_count_cutoff.into()),
            ),
            entry(
                "sensor_material",
                Value::Text(settings.sensor_material.clone()),
            ),
            entry("sensor_thickness", Value::Float(settings.sensor_thickness)),
            entry("goniometer", goniometer),
            entry(
                "countrate_correction_lookup_table",
                Value::Bytes(vec![0; LOOKUP_TABLE_LEN * AUX_ELEMENT_WIDTH]),
            ),
            entry("flatfield", zero_planes()),
            entry("pixel_mask", zero_planes()),
        ])
    }

    fn image_template(&self) -> Value {
        Value::Map(vec![
            entry("type", Value::Text("image".to_string())),
            entry("series_id", Value::Integer(0.into())),
            entry("image_id", Value::Integer(0.into())),
            entry("series_unique_id", Value::Text(String::new())),
            entry(
                "data",
                Value::Map(vec![entry("threshold_1", Value::Bytes(Vec::new()))]),
            ),
        ])
    }

    fn end_template(&self) -> Value {
        Value::Map(vec![
            entry("type", Value::Text("end".to_string())),
            entry("series_id", Value::Integer(0.into())),
            entry("series_unique_id", Value::Text(String::new())),
        ])
    }
}

impl TemplateSource for BuiltinTemplates {
    fn load(&self) -> Result<StreamTemplates, StreamError> {
        Ok(StreamTemplates {
            start: self.start_template(),
            image: self.image_template(),
            end: self.end_template(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: &Value) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(value, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_builtin_start_has_all_only_fields() {
        let templates = BuiltinTemplates::default().load().unwrap();
        let entries = templates.start.as_map().unwrap();

        for field in START_ALL_FIELDS {
            assert!(value_map::get(entries, field).is_some(), "{field} missing");
        }
        let goniometer = value_map::get(entries, "goniometer").unwrap();
        assert_eq!(goniometer.as_map().unwrap().len(), 5);
    }

    #[test]
    fn test_cbor_source_round_trips_builtin_templates() {
        let builtin = BuiltinTemplates::default().load().unwrap();
        let source = CborTemplateSource::new(
            encode(&builtin.start),
            encode(&builtin.image),
            encode(&builtin.end),
        );

        let loaded = source.load().unwrap();
        assert_eq!(loaded.start, builtin.start);
        assert_eq!(loaded.image, builtin.image);
        assert_eq!(loaded.end, builtin.end);
    }

    #[test]
    fn test_cbor_source_populates_auxiliary_arrays() {
        let mut start = BuiltinTemplates::with_geometry(4, 2).load().unwrap().start;
        {
            // Simulate a fixture that ships empty auxiliary planes.
            let entries = start.as_map_mut().unwrap();
            value_map::remove(entries, "countrate_correction_lookup_table");
            let flatfield = value_map::get_mut(entries, "flatfield").unwrap();
            *flatfield = Value::Map(vec![]);
        }

        let builtin = BuiltinTemplates::with_geometry(4, 2).load().unwrap();
        let source = CborTemplateSource::new(
            encode(&start),
            encode(&builtin.image),
            encode(&builtin.end),
        );
        let loaded = source.load().unwrap();

        let entries = loaded.start.as_map().unwrap();
        let table = value_map::get(entries, "countrate_correction_lookup_table").unwrap();
        assert_eq!(
            table.as_bytes().unwrap().len(),
            LOOKUP_TABLE_LEN * AUX_ELEMENT_WIDTH
        );
        let flatfield = value_map::get(entries, "flatfield").unwrap();
        let planes = flatfield.as_map().unwrap();
        let plane = value_map::get(planes, "threshold_1").unwrap();
        assert_eq!(plane.as_bytes().unwrap().len(), 4 * 2 * AUX_ELEMENT_WIDTH);
    }

    #[test]
    fn test_cbor_source_strips_envelope_and_resolves_tags() {
        let builtin = BuiltinTemplates::with_geometry(2, 2).load().unwrap();
        let mut start = builtin.start.clone();
        {
            let entries = start.as_map_mut().unwrap();
            let flatfield = value_map::get_mut(entries, "flatfield").unwrap();
            let planes = flatfield.as_map_mut().unwrap();
            // Typed-array tag as a wire capture would carry.
            value_map::insert(
                planes,
                "threshold_1",
                Value::Tag(85, Box::new(Value::Bytes(vec![0; 16]))),
            );
        }
        let enveloped = Value::Tag(SELF_DESCRIBE_TAG, Box::new(start));

        let source = CborTemplateSource::new(
            encode(&enveloped),
            encode(&builtin.image),
            encode(&builtin.end),
        );
        let loaded = source.load().unwrap();

        let entries = loaded.start.as_map().unwrap();
        assert!(value_map::get(entries, "type").is_some());
        let flatfield = value_map::get(entries, "flatfield").unwrap();
        let plane = value_map::get(flatfield.as_map().unwrap(), "threshold_1").unwrap();
        assert!(plane.as_bytes().is_some());
    }

    #[test]
    fn test_malformed_fixture_is_a_template_error() {
        let builtin = BuiltinTemplates::default().load().unwrap();
        let source = CborTemplateSource::new(
            vec![0xff, 0x00, 0x12],
            encode(&builtin.image),
            encode(&builtin.end),
        );
        assert!(matches!(
            source.load(),
            Err(StreamError::Template { .. })
        ));
    }
}
