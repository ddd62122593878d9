//! Stream1 header message shapes.
//!
//! Each header is a JSON object discriminated by its `htype` field;
//! the shapes and discriminator strings follow the detector's stream
//! interface and are parsed by downstream consumers without
//! negotiation, so they must not drift.

use serde::Serialize;

use super::codec::ElementType;
use crate::config::HeaderDetail;

/// Series header opening an acquisition series (`dheader-1.0`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesHeader {
    htype: &'static str,
    pub header_detail: HeaderDetail,
    pub series: u64,
}

impl SeriesHeader {
    /// Creates the series header for the given detail level.
    pub fn new(header_detail: HeaderDetail, series: u64) -> Self {
        Self {
            htype: "dheader-1.0",
            header_detail,
            series,
        }
    }
}

/// Header announcing one auxiliary calibration blob.
///
/// Emitted only at `header_detail = all`, immediately before the blob
/// it describes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailsHeader {
    htype: &'static str,
    /// Blob dimensions, (slow axis, fast axis).
    pub shape: (u32, u32),
    #[serde(rename = "type")]
    pub dtype: String,
}

impl DetailsHeader {
    /// Flatfield correction plane header.
    pub fn flatfield(shape: (u32, u32)) -> Self {
        Self {
            htype: "flatfield-1.0",
            shape,
            dtype: ElementType::Float32.to_string(),
        }
    }

    /// Pixel mask plane header.
    pub fn pixel_mask(shape: (u32, u32)) -> Self {
        Self {
            htype: "dpixelmask-1.0",
            shape,
            dtype: ElementType::Uint32.to_string(),
        }
    }

    /// Countrate correction table header.
    pub fn countrate_table(shape: (u32, u32)) -> Self {
        Self {
            htype: "dcountrate_table-1.0",
            shape,
            dtype: ElementType::Float32.to_string(),
        }
    }
}

/// Image header opening one image's message group (`dimage-1.0`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageHeader {
    htype: &'static str,
    pub frame: u64,
    pub hash: String,
    pub series: u64,
}

impl ImageHeader {
    /// Creates the header for one image in a series.
    pub fn new(frame: u64, hash: String, series: u64) -> Self {
        Self {
            htype: "dimage-1.0",
            frame,
            hash,
            series,
        }
    }
}

/// Image data characteristics header (`dimage_d-1.0`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageCharacteristicsHeader {
    htype: &'static str,
    pub encoding: String,
    pub shape: (u32, u32),
    /// Byte length of the data blob that follows.
    pub size: usize,
    #[serde(rename = "type")]
    pub dtype: String,
}

impl ImageCharacteristicsHeader {
    /// Creates the characteristics header for one image blob.
    pub fn new(encoding: String, shape: (u32, u32), size: usize, dtype: ElementType) -> Self {
        Self {
            htype: "dimage_d-1.0",
            encoding,
            shape,
            size,
            dtype: dtype.to_string(),
        }
    }
}

/// Per-image timing header (`dconfig-1.0`).
///
/// The simulation reports all timings as zero rather than deriving
/// them from simulated time, a known simplification of the real
/// protocol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageConfigHeader {
    htype: &'static str,
    pub real_time: f64,
    pub start_time: f64,
    pub stop_time: f64,
}

impl Default for ImageConfigHeader {
    fn default() -> Self {
        Self {
            htype: "dconfig-1.0",
            real_time: 0.0,
            start_time: 0.0,
            stop_time: 0.0,
        }
    }
}

/// Series footer closing an acquisition series (`dseries_end-1.0`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesFooter {
    htype: &'static str,
    pub series: u64,
}

impl SeriesFooter {
    /// Creates the footer for the given series.
    pub fn new(series: u64) -> Self {
        Self {
            htype: "dseries_end-1.0",
            series,
        }
    }
}
