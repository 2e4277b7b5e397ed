//! Desktop audio output for Blindtest using CPAL
//!
//! This crate provides `CpalDevice`, the `AudioDevice` implementation used by
//! desktop builds. It plays packed integer PCM at the buffer's native rate
//! and channel count by converting each block to `f32` on the audio thread.
//!
//! # Example
//!
//! ```no_run
//! use blindtest_audio::SymphoniaDecoder;
//! use blindtest_audio_desktop::CpalDevice;
//! use blindtest_core::{QualityFactor, Slot, TestType};
//! use blindtest_session::{PlaybackEngine, TestSession};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = TestSession::new(Box::new(SymphoniaDecoder::new()));
//! session.open("/music/hires.flac")?;
//! session.configure(TestType::BitDepth, QualityFactor(24), QualityFactor(8))?;
//! session.materialize()?;
//!
//! let mut engine = PlaybackEngine::new(Box::new(CpalDevice::new()));
//! engine.start(&session, Slot::First)?;
//! engine.toggle()?; // pause
//! engine.stop();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod error;
mod output;

pub use error::{AudioError, Result};
pub use output::CpalDevice;
