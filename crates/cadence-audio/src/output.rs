//! Audio output sink backed by cpal.

use std::collections::VecDeque;
use std::sync::Arc;

use cadence_core::{AudioFormat, Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};
use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

use crate::signal::CompletionSignal;
use crate::sink::{AudioSink, CompletionFlags, StereoVolume};

/// A submitted buffer the device has not finished draining.
struct PendingBuffer {
    slot: usize,
    data: Vec<u8>,
    pos: usize,
}

/// State shared with the output callback.
struct Shared {
    queue: VecDeque<PendingBuffer>,
    consumed_bytes: usize,
    paused: bool,
    volume: StereoVolume,
    channels: u16,
    bits_per_sample: u16,
    completions: CompletionFlags,
    signal: CompletionSignal,
}

/// [`AudioSink`] implementation on the default cpal output device.
///
/// Submitted buffers are drained in FIFO order by the device callback; each
/// buffer that empties gets its completion flag set and the completion
/// signal raised. Pausing renders silence without discarding queued audio,
/// so the consumed-byte counter freezes.
///
/// The wrapped `cpal::Stream` is not `Send`; create and drive the sink on
/// the playback thread.
pub struct CpalSink {
    stream: Option<Stream>,
    shared: Option<Arc<Mutex<Shared>>>,
    volume: StereoVolume,
}

impl CpalSink {
    pub fn new() -> Self {
        Self {
            stream: None,
            shared: None,
            volume: StereoVolume::MAX,
        }
    }
}

impl Default for CpalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSink for CpalSink {
    fn open(
        &mut self,
        format: &AudioFormat,
        completions: CompletionFlags,
        signal: CompletionSignal,
    ) -> Result<()> {
        self.close();

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::AudioOutput("no output device found".to_string()))?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        info!(
            "opening output device {device_name}: {} Hz, {} channels, {}-bit",
            format.sample_rate(),
            format.channels(),
            format.bits_per_sample()
        );

        let config = StreamConfig {
            channels: format.channels(),
            sample_rate: SampleRate(format.sample_rate()),
            buffer_size: cpal::BufferSize::Default,
        };

        let shared = Arc::new(Mutex::new(Shared {
            queue: VecDeque::new(),
            consumed_bytes: 0,
            paused: true,
            volume: self.volume,
            channels: format.channels(),
            bits_per_sample: format.bits_per_sample(),
            completions,
            signal,
        }));

        let callback_shared = Arc::clone(&shared);
        let err_fn = |err| {
            error!("audio stream error: {err}");
        };
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    fill_output(&callback_shared, data);
                },
                err_fn,
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("failed to build stream: {e}")))?;
        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("failed to start stream: {e}")))?;

        self.stream = Some(stream);
        self.shared = Some(shared);
        Ok(())
    }

    fn submit(&mut self, slot: usize, data: &[u8]) -> Result<()> {
        let Some(shared) = &self.shared else {
            return Err(Error::SinkClosed);
        };
        trace!(slot, len = data.len(), "buffer queued");
        shared.lock().queue.push_back(PendingBuffer {
            slot,
            data: data.to_vec(),
            pos: 0,
        });
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(shared) = &self.shared {
            shared.lock().paused = true;
        }
    }

    fn resume(&mut self) {
        if let Some(shared) = &self.shared {
            shared.lock().paused = false;
        }
    }

    fn reset(&mut self) {
        if let Some(shared) = &self.shared {
            let mut state = shared.lock();
            state.queue.clear();
            state.consumed_bytes = 0;
        }
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!("audio output closed");
        }
        self.shared = None;
    }

    fn consumed_bytes(&self) -> usize {
        self.shared
            .as_ref()
            .map_or(0, |shared| shared.lock().consumed_bytes)
    }

    fn volume(&self) -> StereoVolume {
        self.volume
    }

    fn set_volume(&mut self, volume: StereoVolume) {
        self.volume = volume;
        if let Some(shared) = &self.shared {
            shared.lock().volume = volume;
        }
    }
}

/// Render one device buffer, draining queued PCM in FIFO order.
fn fill_output(shared: &Mutex<Shared>, out: &mut [f32]) {
    let mut guard = shared.lock();
    let state = &mut *guard;
    if state.paused {
        out.fill(0.0);
        return;
    }

    let bytes_per_sample = usize::from(state.bits_per_sample / 8);
    let channels = usize::from(state.channels);
    let left_gain = f32::from(state.volume.left) / f32::from(u16::MAX);
    let right_gain = f32::from(state.volume.right) / f32::from(u16::MAX);

    let mut filled = 0;
    while filled < out.len() {
        if retire_exhausted(state, bytes_per_sample) {
            continue;
        }
        let Some(front) = state.queue.front_mut() else {
            break;
        };

        let sample = decode_sample(&front.data[front.pos..], state.bits_per_sample);
        // Left gain drives even channel indices, right gain odd ones.
        let gain = if (filled % channels) % 2 == 0 {
            left_gain
        } else {
            right_gain
        };
        out[filled] = sample * gain;
        front.pos += bytes_per_sample;
        filled += 1;
        state.consumed_bytes += bytes_per_sample;
    }
    // A buffer that drained exactly at the end of the block completes now,
    // not a whole device period later.
    while retire_exhausted(state, bytes_per_sample) {}

    if filled < out.len() {
        if filled > 0 {
            warn!(
                "output underrun: rendered {filled} of {} samples",
                out.len()
            );
        }
        out[filled..].fill(0.0);
    }
}

/// Pop and mark done the front buffer if it has no whole sample left.
/// Returns true when a buffer was retired.
fn retire_exhausted(state: &mut Shared, bytes_per_sample: usize) -> bool {
    let Some(front) = state.queue.front() else {
        return false;
    };
    if front.data.len() - front.pos >= bytes_per_sample {
        return false;
    }
    let slot = front.slot;
    state.queue.pop_front();
    state.completions.mark_done(slot);
    state.signal.notify();
    true
}

/// Decode one PCM sample to f32 in [-1, 1].
fn decode_sample(bytes: &[u8], bits_per_sample: u16) -> f32 {
    if bits_per_sample == 8 {
        // 8-bit PCM is unsigned with a 128 midpoint.
        (f32::from(bytes[0]) - 128.0) / 128.0
    } else {
        f32::from(i16::from_le_bytes([bytes[0], bytes[1]])) / 32_768.0
    }
}
