//! Integration tests for Eigersim
//!
//! These tests drive full acquisition series through the stream
//! engines and check the wire-level contract a downstream consumer
//! relies on: message counts, ordering, and encoding.

#[path = "integration/codec_round_trip.rs"]
mod codec_round_trip;

#[path = "integration/config_surface.rs"]
mod config_surface;

#[path = "integration/series_lifecycle.rs"]
mod series_lifecycle;
