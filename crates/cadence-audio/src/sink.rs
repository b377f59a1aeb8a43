//! The audio output sink contract.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cadence_core::{AudioFormat, Result};

use crate::signal::CompletionSignal;

/// Independent 16-bit playback gains for the left and right channels.
///
/// No smoothing or clamping is applied beyond what the device itself
/// enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StereoVolume {
    pub left: u16,
    pub right: u16,
}

impl StereoVolume {
    /// Full gain on both channels.
    pub const MAX: Self = Self {
        left: u16::MAX,
        right: u16::MAX,
    };

    pub const fn new(left: u16, right: u16) -> Self {
        Self { left, right }
    }
}

impl Default for StereoVolume {
    fn default() -> Self {
        Self::MAX
    }
}

/// Shared per-slot completion bits, one per ring slot.
///
/// The sink sets a slot's bit from its playback context when the submitted
/// buffer has been fully consumed; the ring reads the bits to find
/// refillable slots and clears a bit when its slot is resubmitted. Clones
/// share the same bits.
#[derive(Debug, Clone)]
pub struct CompletionFlags {
    flags: Arc<[AtomicBool]>,
}

impl CompletionFlags {
    pub fn new(count: usize) -> Self {
        Self {
            flags: (0..count).map(|_| AtomicBool::new(false)).collect(),
        }
    }

    /// Number of slots tracked.
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// True if the sink has finished consuming the buffer in `slot`.
    pub fn is_done(&self, slot: usize) -> bool {
        self.flags[slot].load(Ordering::Acquire)
    }

    /// Sink side: mark the buffer in `slot` fully consumed.
    pub fn mark_done(&self, slot: usize) {
        self.flags[slot].store(true, Ordering::Release);
    }

    /// Ring side: clear `slot` before resubmitting it.
    pub fn clear(&self, slot: usize) {
        self.flags[slot].store(false, Ordering::Release);
    }

    pub fn clear_all(&self) {
        for flag in self.flags.iter() {
            flag.store(false, Ordering::Release);
        }
    }
}

/// Contract for an asynchronous audio output device.
///
/// Submitted buffers are consumed in FIFO order. Whenever the sink finishes
/// a buffer it marks the slot's bit in the [`CompletionFlags`] it was opened
/// with and raises the [`CompletionSignal`]; the caller relays each observed
/// signal into [`update`](crate::PlaybackEngine::update).
pub trait AudioSink {
    /// Open the device for `format`, wiring up the completion flags and
    /// signal. Failure is surfaced once; the engine does not retry.
    fn open(
        &mut self,
        format: &AudioFormat,
        completions: CompletionFlags,
        signal: CompletionSignal,
    ) -> Result<()>;

    /// Enqueue `data` for playback as ring slot `slot`. Valid before or
    /// after consumption has started.
    fn submit(&mut self, slot: usize, data: &[u8]) -> Result<()>;

    /// Suspend consumption without discarding queued buffers.
    fn pause(&mut self);

    /// Resume (or begin) consumption.
    fn resume(&mut self);

    /// Discard all queued audio and rewind the consumed-byte counter.
    fn reset(&mut self);

    /// Release the device. Idempotent.
    fn close(&mut self);

    /// Bytes fully played since the last [`reset`](Self::reset). Monotone
    /// non-decreasing between resets; frozen while paused.
    fn consumed_bytes(&self) -> usize;

    fn volume(&self) -> StereoVolume;

    fn set_volume(&mut self, volume: StereoVolume);
}
