//! # cadence-core
//!
//! Core types and error handling for the Cadence PCM playback engine.

pub mod clock;
pub mod error;
pub mod types;

pub use clock::PcmClock;
pub use error::{Error, Result};
pub use types::*;
