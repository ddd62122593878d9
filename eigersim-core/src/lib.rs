//! Eigersim Core - Streaming protocol engine for a simulated detector
//!
//! This crate reproduces, bit for bit, the data-streaming interface of
//! an Eiger-style scientific area detector: the acquisition-series
//! lifecycle, the message buffering contract between simulation ticks
//! and a network consumer, and the two wire encodings (legacy
//! JSON/blob framing and CBOR-tagged framing), so that downstream
//! data-acquisition software can be tested without physical hardware.
//!
//! The periodic scheduler that drives simulated time, the HTTP/EPICS
//! configuration endpoints, pixel generation, and socket transport are
//! external collaborators; this crate covers the protocol engines and
//! everything they emit.

pub mod config;
pub mod settings;
pub mod stream;

// Re-export main types for convenient access
pub use config::{ConfigError, HeaderDetail, StreamConfig, StreamStatus};
pub use settings::DetectorSettings;
pub use stream::{Image, SimTime, Stream1Engine, Stream2Engine, StreamError};

/// Core errors that can bubble up from any Eigersim subsystem.
#[derive(Debug, thiserror::Error)]
pub enum EigersimError {
    /// Failure while building or encoding stream messages.
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    /// Failure decoding a tagged CBOR value.
    #[error("Codec error: {0}")]
    Codec(#[from] stream::CodecError),

    /// Failure on the key/value configuration surface.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Convenience result alias over [`EigersimError`].
pub type Result<T> = std::result::Result<T, EigersimError>;
