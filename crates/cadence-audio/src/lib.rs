//! # cadence-audio
//!
//! Streaming PCM playback engine for Cadence.
//!
//! Feeds an already-decoded PCM byte sequence to an audio output sink in
//! fixed-size chunks through a small ring of reusable buffers, so memory use
//! stays bounded regardless of the total audio length. Consumption is driven
//! by the sink's asynchronous completion notifications rather than by
//! polling: the caller waits on a [`CompletionSignal`] and relays each
//! observed signal into [`PlaybackEngine::update`].

pub mod engine;
pub mod output;
pub mod ring;
pub mod signal;
pub mod sink;

pub use engine::{PlaybackEngine, PlaybackState};
pub use output::CpalSink;
pub use ring::{BufferRing, Refill, MAX_BUFFER_COUNT, MIN_BUFFER_COUNT};
pub use signal::CompletionSignal;
pub use sink::{AudioSink, CompletionFlags, StereoVolume};
