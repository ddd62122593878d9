//! Legacy stream interface: JSON headers interleaved with raw blobs.
//!
//! Message ordering and header shapes are parsed positionally by
//! downstream consumers, so each lifecycle call emits its frames in a
//! fixed order: `begin_series` emits one, two, or eight frames
//! depending on `header_detail`; `insert_image` always emits four;
//! `end_series` always emits one footer.

use bytes::Bytes;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use super::buffer::{Drain, MessageBuffer};
use super::schema::{
    DetailsHeader, ImageCharacteristicsHeader, ImageConfigHeader, ImageHeader, SeriesFooter,
    SeriesHeader,
};
use super::{Image, SimTime, StreamError};
use crate::config::{HeaderDetail, StreamConfig, StreamStatus};
use crate::settings::DetectorSettings;

/// Settings fields withheld from the series configuration snapshot;
/// their contents travel as dedicated blob messages instead.
const SNAPSHOT_EXCLUDED_FIELDS: [&str; 3] =
    ["flatfield", "pixel_mask", "countrate_correction_table"];

/// Engine producing the legacy JSON/binary-blob message sequence.
#[derive(Debug, Default)]
pub struct Stream1Engine {
    config: StreamConfig,
    status: StreamStatus,
    callback_period: SimTime,
    buffer: MessageBuffer,
}

impl Stream1Engine {
    /// Creates an engine with default configuration.
    pub fn new(callback_period: SimTime) -> Self {
        Self {
            config: StreamConfig::default(),
            status: StreamStatus::default(),
            callback_period,
            buffer: MessageBuffer::new(),
        }
    }

    /// Stream configuration, externally mutable between series.
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Mutable stream configuration.
    pub fn config_mut(&mut self) -> &mut StreamConfig {
        &mut self.config
    }

    /// Stream status as maintained by the surrounding simulation.
    pub fn status(&self) -> &StreamStatus {
        &self.status
    }

    /// Mutable stream status.
    pub fn status_mut(&mut self) -> &mut StreamStatus {
        &mut self.status
    }

    /// Callback period for the external scheduler.
    pub fn callback_period(&self) -> SimTime {
        self.callback_period
    }

    /// Opens an acquisition series.
    ///
    /// Snapshots `header_detail` from the current configuration and
    /// emits the series header, followed by the filtered settings
    /// snapshot (`basic`/`all`) and the calibration header/blob pairs
    /// (`all` only) for flatfield, pixel mask, and countrate table.
    ///
    /// # Errors
    ///
    /// - `StreamError::Serialization` - If a header fails to encode
    pub fn begin_series(
        &mut self,
        settings: &DetectorSettings,
        series_id: u64,
    ) -> Result<(), StreamError> {
        let header_detail = self.config.header_detail;
        debug!(series_id, detail = header_detail.as_str(), "begin series");

        self.buffer_json(&SeriesHeader::new(header_detail, series_id))?;
        if header_detail == HeaderDetail::None {
            return Ok(());
        }

        self.buffer_json(&settings.filtered_snapshot(&SNAPSHOT_EXCLUDED_FIELDS))?;
        if header_detail != HeaderDetail::All {
            return Ok(());
        }

        let shape = (
            settings.y_pixels_in_detector,
            settings.x_pixels_in_detector,
        );
        for header in [
            DetailsHeader::flatfield(shape),
            DetailsHeader::pixel_mask(shape),
            DetailsHeader::countrate_table(shape),
        ] {
            self.buffer_json(&header)?;
            // Placeholder calibration payload, as the hardware-free
            // simulation has no real correction data.
            self.buffer_json(&json!({"blob": "blob"}))?;
        }
        Ok(())
    }

    /// Emits the four-frame message group for one image: image header,
    /// characteristics header, raw data, timing header.
    ///
    /// # Errors
    ///
    /// - `StreamError::Serialization` - If a header fails to encode
    pub fn insert_image(&mut self, image: &Image, series_id: u64) -> Result<(), StreamError> {
        let header = ImageHeader::new(image.index, image.hash.clone(), series_id);
        let characteristics = ImageCharacteristicsHeader::new(
            image.encoding.clone(),
            image.shape,
            image.data.len(),
            image.dtype,
        );

        self.buffer_json(&header)?;
        self.buffer_json(&characteristics)?;
        self.buffer_raw(image.data.clone());
        self.buffer_json(&ImageConfigHeader::default())?;
        Ok(())
    }

    /// Closes an acquisition series with a footer frame.
    ///
    /// # Errors
    ///
    /// - `StreamError::Serialization` - If the footer fails to encode
    pub fn end_series(&mut self, series_id: u64) -> Result<(), StreamError> {
        debug!(series_id, "end series");
        self.buffer_json(&SeriesFooter::new(series_id))
    }

    /// One-shot drain of all buffered frames, in emission order.
    pub fn consume_data(&self) -> Drain<'_> {
        self.buffer.drain()
    }

    /// Current queue depth, for operational monitoring of a stalled
    /// consumer.
    pub fn buffered_messages(&self) -> usize {
        self.buffer.len()
    }

    fn buffer_json<T: Serialize>(&self, message: &T) -> Result<(), StreamError> {
        let serialized = serde_json::to_vec(message).map_err(|e| StreamError::Serialization {
            reason: e.to_string(),
        })?;
        self.buffer.push(Bytes::from(serialized));
        Ok(())
    }

    fn buffer_raw(&self, data: Bytes) {
        self.buffer.push(data);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::stream::codec::ElementType;

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

    fn set_detail(engine: &mut Stream1Engine, detail: HeaderDetail) {
        engine.config_mut().header_detail = detail;
    }

    fn drain_json(engine: &Stream1Engine) -> Vec<Value> {
        engine
            .consume_data()
            .map(|frame| serde_json::from_slice(&frame).unwrap())
            .collect()
    }

    #[test]
    fn test_begin_series_detail_none_emits_one_message() {
        let mut engine = Stream1Engine::default();
        set_detail(&mut engine, HeaderDetail::None);

        engine
            .begin_series(&DetectorSettings::default(), 1)
            .unwrap();
        assert_eq!(engine.buffered_messages(), 1);
    }

    #[test]
    fn test_begin_series_detail_basic_emits_header_then_snapshot() {
        let mut engine = Stream1Engine::default();
        set_detail(&mut engine, HeaderDetail::Basic);

        engine
            .begin_series(&DetectorSettings::default(), 2)
            .unwrap();
        let messages = drain_json(&engine);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["htype"], "dheader-1.0");
        assert_eq!(messages[0]["series"], 2);
        // Settings snapshot follows, without the large-array fields.
        assert!(messages[1].get("count_time").is_some());
        assert!(messages[1].get("flatfield").is_none());
    }

    #[test]
    fn test_begin_series_detail_all_emits_eight_messages() {
        let mut engine = Stream1Engine::default();
        set_detail(&mut engine, HeaderDetail::All);

        engine
            .begin_series(&DetectorSettings::default(), 7)
            .unwrap();
        let messages = drain_json(&engine);

        assert_eq!(messages.len(), 8);
        assert_eq!(messages[0]["series"], 7);
        for (index, htype, dtype) in [
            (2, "flatfield-1.0", "float32"),
            (4, "dpixelmask-1.0", "uint32"),
            (6, "dcountrate_table-1.0", "float32"),
        ] {
            assert_eq!(messages[index]["htype"], htype);
            assert_eq!(messages[index]["type"], dtype);
            assert_eq!(messages[index]["shape"], serde_json::json!([512, 512]));
        }
    }

    #[test]
    fn test_insert_image_emits_four_frames_in_order() {
        let mut engine = Stream1Engine::default();
        let image = test_image(3, 100);

        engine.insert_image(&image, 7).unwrap();
        let frames: Vec<Bytes> = engine.consume_data().collect();
        assert_eq!(frames.len(), 4);

        let header: Value = serde_json::from_slice(&frames[0]).unwrap();
        assert_eq!(header["htype"], "dimage-1.0");
        assert_eq!(header["frame"], 3);
        assert_eq!(header["hash"], "abc");
        assert_eq!(header["series"], 7);

        let characteristics: Value = serde_json::from_slice(&frames[1]).unwrap();
        assert_eq!(characteristics["htype"], "dimage_d-1.0");
        assert_eq!(characteristics["size"], 100);
        assert_eq!(characteristics["shape"], serde_json::json!([512, 512]));

        // Raw data passes through unserialized.
        assert_eq!(frames[2], image.data);

        let config: Value = serde_json::from_slice(&frames[3]).unwrap();
        assert_eq!(config["htype"], "dconfig-1.0");
    }

    #[test]
    fn test_end_series_emits_footer_with_series_id() {
        let mut engine = Stream1Engine::default();
        engine.end_series(9).unwrap();

        let messages = drain_json(&engine);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["htype"], "dseries_end-1.0");
        assert_eq!(messages[0]["series"], 9);
    }

    #[test]
    fn test_consume_data_is_one_shot() {
        let mut engine = Stream1Engine::default();
        engine.end_series(1).unwrap();

        assert_eq!(engine.consume_data().count(), 1);
        assert_eq!(engine.consume_data().count(), 0);

        engine.end_series(2).unwrap();
        assert_eq!(engine.consume_data().count(), 1);
    }

    #[test]
    fn test_header_detail_snapshot_taken_per_call() {
        let mut engine = Stream1Engine::default();
        set_detail(&mut engine, HeaderDetail::None);
        engine
            .begin_series(&DetectorSettings::default(), 1)
            .unwrap();

        set_detail(&mut engine, HeaderDetail::Basic);
        engine
            .begin_series(&DetectorSettings::default(), 2)
            .unwrap();

        assert_eq!(engine.buffered_messages(), 3);
    }
}
