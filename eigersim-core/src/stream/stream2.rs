//! CBOR stream interface built from patched message templates.
//!
//! Messages are not assembled field by field: the engine loads static
//! start/image/end templates once at construction and patches them per
//! lifecycle call. Every emitted value is wrapped in the self-describe
//! envelope tag before it reaches the buffer.
//!
//! The image template is reused across calls and mutated in place.
//! Exclusive access through `&mut self` is the single-writer
//! discipline this requires: the template is fully encoded into the
//! buffer before `insert_image` returns, so no partially patched state
//! is ever observable.

use bytes::Bytes;
use ciborium::value::Value;
use tracing::debug;

use super::buffer::{Drain, MessageBuffer};
use super::codec::encode_enveloped;
use super::templates::{START_ALL_FIELDS, StreamTemplates, TemplateSource};
use super::{Image, SimTime, StreamError, projector, value_map};
use crate::config::HeaderDetail;
use crate::settings::DetectorSettings;

/// Engine producing the CBOR-tagged message sequence.
#[derive(Debug)]
pub struct Stream2Engine {
    templates: StreamTemplates,
    callback_period: SimTime,
    buffer: MessageBuffer,
}

impl Stream2Engine {
    /// Creates an engine with templates from the given source.
    ///
    /// # Errors
    ///
    /// - `StreamError::Template` - If the source cannot produce valid templates
    pub fn new(
        source: &dyn TemplateSource,
        callback_period: SimTime,
    ) -> Result<Self, StreamError> {
        Ok(Self {
            templates: source.load()?,
            callback_period,
            buffer: MessageBuffer::new(),
        })
    }

    /// Callback period for the external scheduler.
    pub fn callback_period(&self) -> SimTime {
        self.callback_period
    }

    /// Emits the start message opening an acquisition series.
    ///
    /// At `header_detail = all` the full start template is sent,
    /// auxiliary calibration arrays included; otherwise those fields
    /// are stripped from a copy. The template is then patched with the
    /// total image count, the projected settings, and the series id.
    ///
    /// # Errors
    ///
    /// - `StreamError::Template` - If the start template lacks an expected map
    /// - `StreamError::Serialization` - If CBOR encoding fails
    pub fn begin_series(
        &mut self,
        settings: &DetectorSettings,
        series_id: u64,
        header_detail: HeaderDetail,
    ) -> Result<(), StreamError> {
        debug!(series_id, detail = header_detail.as_str(), "begin series");

        let mut start = self.templates.start.clone();
        if header_detail != HeaderDetail::All {
            let entries = value_map::as_map_mut(&mut start, "start template")?;
            for field in START_ALL_FIELDS {
                value_map::remove(entries, field);
            }
        }

        {
            let entries = value_map::as_map_mut(&mut start, "start template")?;
            // Saturate rather than overflow on absurd trigger counts.
            let number_of_images = settings.nimages.saturating_mul(settings.ntrigger);
            value_map::insert(
                entries,
                "number_of_images",
                Value::Integer(number_of_images.into()),
            );
        }
        projector::apply(&projector::project(settings), &mut start)?;
        stamp_series_id(&mut start, "start template", series_id)?;

        self.buffer.push(Bytes::from(encode_enveloped(&start)?));
        Ok(())
    }

    /// Emits the message for one image.
    ///
    /// # Errors
    ///
    /// - `StreamError::Template` - If the image template is not a map
    /// - `StreamError::Serialization` - If CBOR encoding fails
    pub fn insert_image(&mut self, image: &Image, series_id: u64) -> Result<(), StreamError> {
        stamp_series_id(&mut self.templates.image, "image template", series_id)?;
        {
            let entries = value_map::as_map_mut(&mut self.templates.image, "image template")?;
            value_map::insert(entries, "image_id", Value::Integer(image.index.into()));
        }

        self.buffer
            .push(Bytes::from(encode_enveloped(&self.templates.image)?));
        Ok(())
    }

    /// Emits the end message closing an acquisition series.
    ///
    /// # Errors
    ///
    /// - `StreamError::Template` - If the end template is not a map
    /// - `StreamError::Serialization` - If CBOR encoding fails
    pub fn end_series(&mut self, series_id: u64) -> Result<(), StreamError> {
        debug!(series_id, "end series");
        stamp_series_id(&mut self.templates.end, "end template", series_id)?;

        self.buffer
            .push(Bytes::from(encode_enveloped(&self.templates.end)?));
        Ok(())
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
}

fn stamp_series_id(template: &mut Value, what: &str, series_id: u64) -> Result<(), StreamError> {
    let entries = value_map::as_map_mut(template, what)?;
    value_map::insert(entries, "series_id", Value::Integer(series_id.into()));
    Ok(())
}
