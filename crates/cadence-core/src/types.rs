//! Core domain types for Cadence.

pub mod format;
pub mod source;

pub use format::AudioFormat;
pub use source::PcmSource;
