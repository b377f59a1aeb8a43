//! Play a synthesized tone through the playback engine.
//!
//! Demonstrates the caller's side of the contract: wait on the completion
//! signal, relay each observed signal into `update`, stop once the stream
//! has drained.

use std::time::Duration;

use anyhow::Result;
use cadence_audio::{CompletionSignal, CpalSink, PlaybackEngine};
use cadence_core::{AudioFormat, PcmSource};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const TONE_HZ: f64 = 440.0;
const TONE_SECONDS: u32 = 3;

/// Render the tone as interleaved 16-bit PCM.
fn synthesize(format: &AudioFormat) -> Vec<u8> {
    let frames = format.sample_rate() * TONE_SECONDS;
    let mut data = Vec::with_capacity(frames as usize * format.block_align() as usize);
    for frame in 0..frames {
        let t = f64::from(frame) / f64::from(format.sample_rate());
        let sample = (t * TONE_HZ * std::f64::consts::TAU).sin();
        #[allow(clippy::cast_possible_truncation)]
        let sample = (sample * 0.25 * f64::from(i16::MAX)) as i16;
        for _ in 0..format.channels() {
            data.extend_from_slice(&sample.to_le_bytes());
        }
    }
    data
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cadence_audio=debug,sine=info".into()),
        )
        .init();

    let format = AudioFormat::new(2, 16, 44_100)?;
    let source = PcmSource::new(synthesize(&format), format)?;
    info!(
        "playing a {TONE_HZ} Hz tone, {} ms of audio",
        source.duration_ms()
    );

    let signal = CompletionSignal::new();
    let mut engine = PlaybackEngine::new(CpalSink::new());
    engine.open(source, signal.clone())?;
    engine.prepare(0, 4)?;
    engine.start();

    while !engine.has_ended() {
        if signal.wait(Duration::from_millis(250)) {
            engine.update()?;
            info!("position: {} ms", engine.position_ms());
        }
    }

    engine.close();
    info!("done");
    Ok(())
}
