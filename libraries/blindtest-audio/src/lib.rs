//! Blindtest Audio
//!
//! Decoding and format conversion for the blind listening test.
//!
//! This crate provides:
//! - Audio decoding via Symphonia into packed integer PCM (`SymphoniaDecoder`)
//! - Sample-rate decimation and bit-depth requantization (`convert`)
//!
//! # Example: Deriving a test pair
//!
//! ```rust,no_run
//! use blindtest_audio::{convert, SymphoniaDecoder};
//! use blindtest_core::{AudioDecoder, SampleRate, StreamSelector};
//! use std::path::Path;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut decoder = SymphoniaDecoder::new();
//! let original = decoder.decode(Path::new("/music/hires.flac"), StreamSelector::FirstAudio)?;
//!
//! // 192 kHz -> 48 kHz keeps every fourth frame
//! let lq = convert::resample(&original, SampleRate::DVD_QUALITY)?;
//! println!("{} frames -> {} frames", original.frames(), lq.frames());
//! # Ok(())
//! # }
//! ```

pub mod convert;
mod decoder;

pub use decoder::SymphoniaDecoder;
