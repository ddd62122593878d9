//! Streaming protocol engines for the simulated detector.
//!
//! Both wire formats share one lifecycle contract: an external
//! scheduler drives `begin_series` -> N x `insert_image` ->
//! `end_series` on an engine, each call synchronously enqueueing its
//! messages as one atomic block, and a network adapter drains the
//! buffer in FIFO order with `consume_data`. The engines differ only
//! in encoding: stream1 emits JSON headers interleaved with raw blobs,
//! stream2 emits CBOR values wrapped in a self-describe tag.

pub mod buffer;
pub mod codec;
pub mod projector;
pub mod schema;
pub mod stream1;
pub mod stream2;
pub mod templates;

mod value_map;

// Re-export public API
pub use buffer::{Drain, MessageBuffer};
pub use codec::{ByteOrder, CodecError, ElementType, TagValue, decode_tag};
pub use stream1::Stream1Engine;
pub use stream2::Stream2Engine;
pub use templates::{BuiltinTemplates, CborTemplateSource, StreamTemplates, TemplateSource};

use bytes::Bytes;

/// Errors raised while building or encoding stream messages.
///
/// Serialization failures are programming errors (an unserializable
/// message shape), not data errors, and always propagate; they are
/// never swallowed into a silently dropped message.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("message serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("template error: {reason}")]
    Template { reason: String },

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Simulation time in nanoseconds.
///
/// Carried for the external periodic scheduler; never interpreted by
/// the stream engines themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SimTime(u64);

impl SimTime {
    /// One second, the default engine callback period.
    pub const ONE_SECOND: SimTime = SimTime(1_000_000_000);

    /// Creates a simulation time from nanoseconds.
    pub fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Nanosecond count.
    pub fn as_nanos(&self) -> u64 {
        self.0
    }
}

impl Default for SimTime {
    fn default() -> Self {
        SimTime::ONE_SECOND
    }
}

/// One acquired detector image with its metadata.
///
/// Immutable once produced. `data` is reference-counted: engines hold
/// a reference to the payload while building messages, never a copy.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    /// Frame number within the series.
    pub index: u64,
    /// Content hash reported in the image header.
    pub hash: String,
    /// Dimension sizes, (slow axis, fast axis).
    pub shape: (u32, u32),
    /// Element type of the pixel data.
    pub dtype: ElementType,
    /// Compression/packing encoding label, e.g. `"lz4<"`.
    pub encoding: String,
    /// Raw image bytes.
    pub data: Bytes,
}
