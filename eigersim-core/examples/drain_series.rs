//! Runs one acquisition series through both stream engines and prints
//! the frames a network adapter would drain.
//!
//! ```bash
//! cargo run --example drain_series
//! ```

use bytes::Bytes;
use eigersim_core::config::HeaderDetail;
use eigersim_core::settings::DetectorSettings;
use eigersim_core::stream::templates::BuiltinTemplates;
use eigersim_core::stream::{ElementType, Image, SimTime, Stream1Engine, Stream2Engine};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .init();

    let settings = DetectorSettings::default();
    let image = Image {
        index: 0,
        hash: "6cbb0a3f2a17e473ba522b9c13d14233".to_string(),
        shape: (
            settings.y_pixels_in_detector,
            settings.x_pixels_in_detector,
        ),
        dtype: ElementType::Uint16,
        encoding: "lz4<".to_string(),
        data: Bytes::from(vec![
            0u8;
            settings.y_pixels_in_detector as usize
                * settings.x_pixels_in_detector as usize
                * 2
        ]),
    };

    let mut stream1 = Stream1Engine::new(SimTime::ONE_SECOND);
    stream1.config_mut().header_detail = HeaderDetail::All;
    stream1.begin_series(&settings, 1)?;
    stream1.insert_image(&image, 1)?;
    stream1.end_series(1)?;

    println!("stream1 frames:");
    for (index, frame) in stream1.consume_data().enumerate() {
        println!("  [{index:2}] {} bytes", frame.len());
    }

    let mut stream2 = Stream2Engine::new(&BuiltinTemplates::default(), SimTime::ONE_SECOND)?;
    stream2.begin_series(&settings, 1, HeaderDetail::All)?;
    stream2.insert_image(&image, 1)?;
    stream2.end_series(1)?;

    println!("stream2 frames:");
    for (index, frame) in stream2.consume_data().enumerate() {
        println!("  [{index:2}] {} bytes", frame.len());
    }

    Ok(())
}
