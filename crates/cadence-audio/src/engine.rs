//! Playback orchestration: the buffer ring against the output sink.

use cadence_core::{PcmClock, PcmSource, Result};
use tracing::{debug, trace};

use crate::ring::{BufferRing, MAX_BUFFER_COUNT, MIN_BUFFER_COUNT};
use crate::signal::CompletionSignal;
use crate::sink::{AudioSink, CompletionFlags, StereoVolume};

/// Observable playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Closed,
    Prepared,
    Playing,
    Paused,
    /// Every byte has been submitted and every buffer consumed.
    Ended,
}

/// Streaming PCM playback engine.
///
/// Feeds an already-decoded PCM byte sequence to an [`AudioSink`] in
/// fixed-size chunks through a small ring of reusable buffers. Consumption
/// is driven by completion notifications: the caller waits on the
/// [`CompletionSignal`] passed to [`open`](Self::open) and invokes
/// [`update`](Self::update) once per observed signal, on a single thread.
/// The engine performs no internal threading or locking, none of its methods
/// block, and the calling layer owns serialization.
pub struct PlaybackEngine<S: AudioSink> {
    sink: S,
    /// Done bits shared with the sink, sized for the largest allowed ring.
    completions: CompletionFlags,
    source: Option<PcmSource>,
    /// Created by `prepare`, dropped by `close`.
    ring: Option<BufferRing>,
    state: PlaybackState,
    has_ended: bool,
}

impl<S: AudioSink> PlaybackEngine<S> {
    /// Wrap `sink`. The engine starts closed; call [`open`](Self::open).
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            completions: CompletionFlags::new(MAX_BUFFER_COUNT),
            source: None,
            ring: None,
            state: PlaybackState::Closed,
            has_ended: false,
        }
    }

    /// Open the sink for `source`, wiring `signal` as the completion
    /// notification. Any previous session is closed first. Playback state
    /// stays `Closed` until [`prepare`](Self::prepare).
    pub fn open(&mut self, source: PcmSource, signal: CompletionSignal) -> Result<()> {
        self.close();
        debug!(
            bytes = source.byte_len(),
            duration_ms = source.duration_ms(),
            "opening playback session"
        );
        self.sink
            .open(source.format(), self.completions.clone(), signal)?;
        self.source = Some(source);
        Ok(())
    }

    /// Partition the source from `position_ms` into `buffer_count` buffers
    /// and queue them all with the sink, pausing it first so no completions
    /// fire mid-setup.
    ///
    /// An unopened engine, a `buffer_count` outside
    /// [`MIN_BUFFER_COUNT`]..=[`MAX_BUFFER_COUNT`] or a start position past
    /// the end of the source are caller errors and panic.
    #[allow(clippy::panic)] // contract violations are fatal
    pub fn prepare(&mut self, position_ms: u64, buffer_count: usize) -> Result<()> {
        assert!(
            (MIN_BUFFER_COUNT..=MAX_BUFFER_COUNT).contains(&buffer_count),
            "buffer count {buffer_count} outside [{MIN_BUFFER_COUNT}, {MAX_BUFFER_COUNT}]"
        );
        let Some(source) = &self.source else {
            panic!("prepare requires an open engine");
        };

        self.sink.reset();
        self.sink.pause();
        self.has_ended = false;

        let clock = PcmClock::new(source.format());
        let start_offset = clock.ms_to_bytes(position_ms) as usize;
        assert!(
            start_offset <= source.byte_len(),
            "start position {position_ms}ms is beyond the end of the source"
        );

        // One second of audio per buffer at the open format.
        let capacity = source.format().byte_rate() as usize;
        let mut ring = BufferRing::new(capacity, self.completions.clone());
        let refills = ring.reset(source.byte_len(), start_offset, buffer_count);
        debug!(
            start_offset,
            requested = buffer_count,
            queued = refills.len(),
            "prepared playback"
        );
        for refill in &refills {
            self.sink
                .submit(refill.slot, source.chunk(refill.offset, refill.len))?;
        }

        self.ring = Some(ring);
        self.state = PlaybackState::Prepared;
        Ok(())
    }

    /// Begin or resume playback.
    pub fn start(&mut self) {
        self.sink.resume();
        self.has_ended = false;
        self.state = PlaybackState::Playing;
        debug!("playback started");
    }

    /// Suspend playback without discarding queued buffers.
    pub fn pause(&mut self) {
        self.sink.pause();
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
        debug!("playback paused");
    }

    /// Relay one completion notification.
    ///
    /// Finds the buffer the sink has finished consuming, refills it with the
    /// next unconsumed chunk and resubmits it. When no bytes remain and
    /// every buffer has drained, the ended flag is set instead. A
    /// notification with no finished buffer is a no-op. Invoke once per
    /// observed completion signal.
    pub fn update(&mut self) -> Result<()> {
        let Some(ring) = self.ring.as_mut() else {
            return Ok(());
        };
        match ring.on_completion() {
            Some(refill) => {
                trace!(
                    slot = refill.slot,
                    offset = refill.offset,
                    len = refill.len,
                    "refilling buffer"
                );
                if let Some(source) = &self.source {
                    self.sink
                        .submit(refill.slot, source.chunk(refill.offset, refill.len))?;
                }
            }
            None => {
                if !self.has_ended && ring.is_fully_drained() {
                    debug!("playback drained");
                    self.has_ended = true;
                }
            }
        }
        Ok(())
    }

    /// Stop playback and release everything queued with the sink.
    pub fn close(&mut self) {
        if self.source.is_some() {
            debug!("closing playback session");
        }
        self.sink.reset();
        self.sink.close();
        if let Some(mut ring) = self.ring.take() {
            ring.clear();
        }
        self.source = None;
        self.state = PlaybackState::Closed;
        self.has_ended = false;
    }

    /// True while the engine is between [`start`](Self::start) and
    /// [`pause`](Self::pause)/[`close`](Self::close). Independent of
    /// [`has_ended`](Self::has_ended).
    pub const fn is_playing(&self) -> bool {
        matches!(self.state, PlaybackState::Playing)
    }

    /// True once every byte has been submitted and every buffer consumed.
    /// Cleared by [`start`](Self::start) and [`prepare`](Self::prepare).
    pub const fn has_ended(&self) -> bool {
        self.has_ended
    }

    /// Current state; reports [`PlaybackState::Ended`] once the stream has
    /// drained.
    pub const fn state(&self) -> PlaybackState {
        if self.has_ended {
            PlaybackState::Ended
        } else {
            self.state
        }
    }

    /// Playback position in milliseconds from the start of the source:
    /// the prepared start offset plus whatever the sink has consumed since.
    /// Non-decreasing while playing, frozen while paused, 0 when closed.
    pub fn position_ms(&self) -> u64 {
        let Some(source) = &self.source else {
            return 0;
        };
        let start_offset = self.ring.as_ref().map_or(0, BufferRing::start_offset);
        let consumed = start_offset + self.sink.consumed_bytes();
        PcmClock::new(source.format()).bytes_to_ms(consumed as u64)
    }

    /// The source opened for playback, if any.
    pub const fn source(&self) -> Option<&PcmSource> {
        self.source.as_ref()
    }

    /// Current per-channel gains, straight from the sink.
    pub fn volume(&self) -> StereoVolume {
        self.sink.volume()
    }

    /// Set per-channel gains, passed through to the sink unmodified.
    pub fn set_volume(&mut self, volume: StereoVolume) {
        self.sink.set_volume(volume);
    }
}

impl<S: AudioSink> Drop for PlaybackEngine<S> {
    fn drop(&mut self) {
        self.close();
    }
}
