//! Settings projection onto the stream2 field vocabulary.
//!
//! The detector settings record and the stream2 start message spell
//! most fields differently. Projection is an explicit enumerated
//! translation table, not reflection: every mapped field is listed
//! here, and fields whose stream-side representation differs
//! structurally are excluded on purpose rather than silently dropped.

use ciborium::value::Value;

use super::{StreamError, value_map};
use crate::settings::{DetectorSettings, GonioAxis};

/// Patch produced by projecting a settings record.
///
/// Top-level fields are applied by replacement; goniometer axes are
/// merged key-by-key into the template's existing per-axis maps.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsPatch {
    pub fields: Vec<(&'static str, Value)>,
    /// Per-axis (name, start, increment) triples.
    pub goniometer: Vec<(&'static str, f64, f64)>,
}

/// Projects a settings record onto stream2 start-message fields.
///
/// Not mapped, deliberately: `beam_center_x`/`beam_center_y` (integers
/// stream-side, floats in the settings record) and `threshold_energy`
/// as a per-threshold map (the stream carries an array of threshold
/// maps; only the scalar `incident_energy` rename is projected).
pub fn project(settings: &DetectorSettings) -> SettingsPatch {
    let fields = vec![
        // Direct mappings
        ("count_time", Value::Float(settings.count_time)),
        ("frame_time", Value::Float(settings.frame_time)),
        (
            "sensor_material",
            Value::Text(settings.sensor_material.clone()),
        ),
        ("sensor_thickness", Value::Float(settings.sensor_thickness)),
        // Renamed mappings
        (
            "countrate_correction_enabled",
            Value::Bool(settings.countrate_correction_applied),
        ),
        (
            "detector_description",
            Value::Text(settings.description.clone()),
        ),
        (
            "detector_serial_number",
            Value::Text(settings.detector_number.clone()),
        ),
        (
            "flatfield_enabled",
            Value::Bool(settings.flatfield_correction_applied),
        ),
        (
            "image_size_x",
            Value::Integer(settings.x_pixels_in_detector.into()),
        ),
        (
            "image_size_y",
            Value::Integer(settings.y_pixels_in_detector.into()),
        ),
        ("incident_energy", Value::Float(settings.threshold_energy)),
        ("incident_wavelength", Value::Float(settings.wavelength)),
        ("pixel_mask_enabled", Value::Bool(settings.pixel_mask_applied)),
        ("pixel_size_x", Value::Float(settings.x_pixel_size)),
        ("pixel_size_y", Value::Float(settings.y_pixel_size)),
        (
            "saturation_value",
            Value::Integer(settings.countrate_correction_count_cutoff.into()),
        ),
    ];

    let goniometer = GonioAxis::ALL
        .iter()
        .map(|&axis| {
            (
                axis.name(),
                settings.axis_start(axis),
                settings.axis_increment(axis),
            )
        })
        .collect();

    SettingsPatch { fields, goniometer }
}

/// Applies a patch to a start-message map.
///
/// # Errors
///
/// - `StreamError::Template` - If the target is not a map or lacks a goniometer axis map
pub fn apply(patch: &SettingsPatch, start: &mut Value) -> Result<(), StreamError> {
    let entries = value_map::as_map_mut(start, "start message")?;
    for (field, value) in &patch.fields {
        value_map::insert(entries, field, value.clone());
    }

    let goniometer = value_map::get_mut(entries, "goniometer").ok_or_else(|| {
        StreamError::Template {
            reason: "start message has no goniometer map".to_string(),
        }
    })?;
    let axes = value_map::as_map_mut(goniometer, "goniometer")?;
    for (axis, start_position, increment) in &patch.goniometer {
        let axis_map = value_map::get_mut(axes, axis).ok_or_else(|| StreamError::Template {
            reason: format!("goniometer map has no {axis} axis"),
        })?;
        let axis_entries = value_map::as_map_mut(axis_map, axis)?;
        value_map::insert(axis_entries, "start", Value::Float(*start_position));
        value_map::insert(axis_entries, "increment", Value::Float(*increment));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::templates::{BuiltinTemplates, TemplateSource};

    #[test]
    fn test_projection_renames_fields() {
        let mut settings = DetectorSettings::default();
        settings.threshold_energy = 8000.0;
        settings.x_pixels_in_detector = 1024;

        let patch = project(&settings);
        let lookup = |name: &str| {
            patch
                .fields
                .iter()
                .find(|(field, _)| *field == name)
                .map(|(_, value)| value.clone())
        };

        assert_eq!(lookup("incident_energy"), Some(Value::Float(8000.0)));
        assert_eq!(lookup("image_size_x"), Some(Value::Integer(1024.into())));
        // Structurally mismatched fields are excluded from the table.
        assert_eq!(lookup("beam_center_x"), None);
        assert_eq!(lookup("threshold_energy"), None);
    }

    #[test]
    fn test_projection_covers_all_goniometer_axes() {
        let mut settings = DetectorSettings::default();
        settings.phi_start = 45.0;
        settings.phi_increment = 0.25;

        let patch = project(&settings);
        assert_eq!(patch.goniometer.len(), 5);
        assert!(patch.goniometer.contains(&("phi", 45.0, 0.25)));
    }

    #[test]
    fn test_apply_merges_goniometer_without_replacing_axis_map() {
        let mut settings = DetectorSettings::default();
        settings.omega_increment = 0.1;
        let patch = project(&settings);

        let mut start = BuiltinTemplates::default().load().unwrap().start;
        apply(&patch, &mut start).unwrap();

        let entries = start.as_map().unwrap();
        let goniometer = value_map::get(entries, "goniometer").unwrap();
        let axes = goniometer.as_map().unwrap();
        let omega = value_map::get(axes, "omega").unwrap().as_map().unwrap();
        assert_eq!(
            value_map::get(omega, "increment"),
            Some(&Value::Float(0.1))
        );
        // Keys the patch does not carry survive the merge.
        assert!(value_map::get(omega, "start").is_some());
    }

    #[test]
    fn test_apply_requires_goniometer_map() {
        let patch = project(&DetectorSettings::default());
        let mut start = Value::Map(vec![]);
        let result = apply(&patch, &mut start);
        assert!(matches!(result, Err(StreamError::Template { .. })));
    }
}
