//! Error types for Cadence.

use thiserror::Error;

/// Result type alias using Cadence's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Cadence.
#[derive(Error, Debug)]
pub enum Error {
    // Format errors
    #[error("Invalid audio format: {0}")]
    InvalidFormat(String),

    #[error("PCM data length {len} is not a multiple of the {block_align}-byte frame size")]
    UnalignedData { len: usize, block_align: u32 },

    // Playback errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    #[error("Sink is not open")]
    SinkClosed,
}

impl Error {
    /// Returns true if this error indicates invalid input data rather than a
    /// device failure.
    pub const fn is_data_error(&self) -> bool {
        matches!(self, Self::InvalidFormat(_) | Self::UnalignedData { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::AudioOutput("device lost".into());
        assert_eq!(err.to_string(), "Audio output error: device lost");

        let err = Error::UnalignedData {
            len: 7,
            block_align: 4,
        };
        assert_eq!(
            err.to_string(),
            "PCM data length 7 is not a multiple of the 4-byte frame size"
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::InvalidFormat("zero channels".into()).is_data_error());
        assert!(Error::UnalignedData {
            len: 1,
            block_align: 2
        }
        .is_data_error());
        assert!(!Error::SinkClosed.is_data_error());
        assert!(!Error::AudioOutput("busy".into()).is_data_error());
    }
}
