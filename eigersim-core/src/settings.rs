//! Detector settings record.
//!
//! Flat snapshot of the detector configuration surface that the stream
//! engines read at series start. Ownership stays with the caller; the
//! engines only borrow a snapshot per lifecycle call.

use serde::Serialize;
use serde_json::{Map, Value};

/// Goniometer axes with per-axis start/increment settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GonioAxis {
    Chi,
    Kappa,
    Omega,
    Phi,
    TwoTheta,
}

impl GonioAxis {
    /// All axes, in the order the stream2 start message lists them.
    pub const ALL: [GonioAxis; 5] = [
        GonioAxis::Chi,
        GonioAxis::Kappa,
        GonioAxis::Omega,
        GonioAxis::Phi,
        GonioAxis::TwoTheta,
    ];

    /// Wire-format axis name.
    pub fn name(&self) -> &'static str {
        match self {
            GonioAxis::Chi => "chi",
            GonioAxis::Kappa => "kappa",
            GonioAxis::Omega => "omega",
            GonioAxis::Phi => "phi",
            GonioAxis::TwoTheta => "two_theta",
        }
    }
}

/// Flat detector configuration record.
///
/// Field names follow the detector API convention; defaults describe a
/// small 512x512 simulated sensor.
#[derive(Debug, Clone, Serialize)]
pub struct DetectorSettings {
    pub count_time: f64,
    pub frame_time: f64,
    pub nimages: u64,
    pub ntrigger: u64,
    pub description: String,
    pub detector_number: String,
    pub sensor_material: String,
    pub sensor_thickness: f64,
    pub x_pixels_in_detector: u32,
    pub y_pixels_in_detector: u32,
    pub x_pixel_size: f64,
    pub y_pixel_size: f64,
    pub wavelength: f64,
    pub threshold_energy: f64,
    pub beam_center_x: f64,
    pub beam_center_y: f64,
    pub flatfield_correction_applied: bool,
    pub pixel_mask_applied: bool,
    pub countrate_correction_applied: bool,
    pub countrate_correction_count_cutoff: u32,
    pub chi_start: f64,
    pub chi_increment: f64,
    pub kappa_start: f64,
    pub kappa_increment: f64,
    pub omega_start: f64,
    pub omega_increment: f64,
    pub phi_start: f64,
    pub phi_increment: f64,
    pub two_theta_start: f64,
    pub two_theta_increment: f64,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            count_time: 0.1,
            frame_time: 0.12,
            nimages: 1,
            ntrigger: 1,
            description: "Simulated Eiger X 16M Detector".to_string(),
            detector_number: "EIGERSIM001".to_string(),
            sensor_material: "Silicon".to_string(),
            sensor_thickness: 0.00045,
            x_pixels_in_detector: 512,
            y_pixels_in_detector: 512,
            x_pixel_size: 7.5e-5,
            y_pixel_size: 7.5e-5,
            wavelength: 1.0,
            threshold_energy: 4020.5,
            beam_center_x: 0.0,
            beam_center_y: 0.0,
            flatfield_correction_applied: true,
            pixel_mask_applied: false,
            countrate_correction_applied: true,
            countrate_correction_count_cutoff: 133343,
            chi_start: 0.0,
            chi_increment: 0.0,
            kappa_start: 0.0,
            kappa_increment: 0.0,
            omega_start: 0.0,
            omega_increment: 0.0,
            phi_start: 0.0,
            phi_increment: 0.0,
            two_theta_start: 0.0,
            two_theta_increment: 0.0,
        }
    }
}

impl DetectorSettings {
    /// Start position of a goniometer axis.
    pub fn axis_start(&self, axis: GonioAxis) -> f64 {
        match axis {
            GonioAxis::Chi => self.chi_start,
            GonioAxis::Kappa => self.kappa_start,
            GonioAxis::Omega => self.omega_start,
            GonioAxis::Phi => self.phi_start,
            GonioAxis::TwoTheta => self.two_theta_start,
        }
    }

    /// Per-image increment of a goniometer axis.
    pub fn axis_increment(&self, axis: GonioAxis) -> f64 {
        match axis {
            GonioAxis::Chi => self.chi_increment,
            GonioAxis::Kappa => self.kappa_increment,
            GonioAxis::Omega => self.omega_increment,
            GonioAxis::Phi => self.phi_increment,
            GonioAxis::TwoTheta => self.two_theta_increment,
        }
    }

    /// Settings snapshot as a JSON object with the named fields removed.
    ///
    /// Stream1 sends this as the series configuration header; the large
    /// calibration arrays travel as separate blob messages instead.
    ///
    /// # Panics
    ///
    /// Never panics: the struct serializes to a JSON object by
    /// construction.
    pub fn filtered_snapshot(&self, exclude: &[&str]) -> Map<String, Value> {
        let Value::Object(mut snapshot) = serde_json::to_value(self).unwrap_or_default() else {
            return Map::new();
        };
        for field in exclude {
            snapshot.remove(*field);
        }
        snapshot
    }
}
