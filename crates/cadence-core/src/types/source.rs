//! Decoded PCM audio source.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::sync::Arc;

use crate::clock::PcmClock;
use crate::error::{Error, Result};
use crate::types::AudioFormat;

/// An immutable, already-decoded PCM byte sequence plus its format.
///
/// The sample bytes are shared, so cloning is cheap. Consumers address the
/// data through bounds-clamped `(offset, length)` slices; the source itself
/// is never mutated.
#[derive(Debug, Clone)]
pub struct PcmSource {
    data: Arc<[u8]>,
    format: AudioFormat,
}

impl PcmSource {
    /// Wrap decoded PCM bytes.
    ///
    /// The byte length must be a whole number of sample frames for the given
    /// format.
    pub fn new(data: impl Into<Arc<[u8]>>, format: AudioFormat) -> Result<Self> {
        let data = data.into();
        if data.len() % format.block_align() as usize != 0 {
            return Err(Error::UnalignedData {
                len: data.len(),
                block_align: format.block_align(),
            });
        }
        Ok(Self { data, format })
    }

    /// The stream's PCM format.
    pub const fn format(&self) -> &AudioFormat {
        &self.format
    }

    /// Total length in bytes.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// At most `max_len` bytes starting at `offset`, clamped to the end of
    /// the data. An offset at or past the end yields an empty slice.
    pub fn chunk(&self, offset: usize, max_len: usize) -> &[u8] {
        let start = offset.min(self.data.len());
        let end = start.saturating_add(max_len).min(self.data.len());
        &self.data[start..end]
    }

    /// Total playback time of the source in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        PcmClock::new(&self.format).bytes_to_ms(self.data.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_of_len(len: usize) -> PcmSource {
        PcmSource::new(vec![0u8; len], AudioFormat::CD_STEREO).unwrap()
    }

    #[test]
    fn test_rejects_unaligned_data() {
        let err = PcmSource::new(vec![0u8; 7], AudioFormat::CD_STEREO).unwrap_err();
        assert!(matches!(
            err,
            Error::UnalignedData {
                len: 7,
                block_align: 4
            }
        ));
    }

    #[test]
    fn test_chunk_clamps_to_end() {
        let source = source_of_len(16);
        assert_eq!(source.chunk(0, 8).len(), 8);
        assert_eq!(source.chunk(12, 8).len(), 4);
        assert_eq!(source.chunk(16, 8).len(), 0);
        assert_eq!(source.chunk(100, 8).len(), 0);
    }

    #[test]
    fn test_duration() {
        // 2.5 seconds of CD-quality stereo.
        assert_eq!(source_of_len(441_000).duration_ms(), 2500);
        assert_eq!(source_of_len(0).duration_ms(), 0);
    }

    #[test]
    fn test_clone_shares_data() {
        let source = source_of_len(8);
        let clone = source.clone();
        assert_eq!(source.chunk(0, 8).as_ptr(), clone.chunk(0, 8).as_ptr());
    }
}
