//! Blindtest Session
//!
//! Platform-agnostic test orchestration for the blind listening test.
//!
//! This crate provides:
//! - `TestSession`: open, decode, configure, materialize and judge one trial
//! - `PlaybackEngine`: start, toggle, stop, seek and report position for one slot
//! - `ResultLog`: the listener's answers, persisted as JSON lines
//! - `CancelToken`: cooperative cancellation for background materialization
//!
//! # Architecture
//!
//! `blindtest-session` only sees the `AudioDecoder` and `AudioDevice`
//! capability traits from `blindtest-core`. The desktop build plugs in
//! `SymphoniaDecoder` and a CPAL device; tests plug in the in-memory doubles
//! from `test_utils` (feature `test-utils`).
//!
//! # Example
//!
//! ```rust,no_run
//! use blindtest_audio::SymphoniaDecoder;
//! use blindtest_core::{QualityFactor, TestType};
//! use blindtest_session::TestSession;
//!
//! # fn example() -> blindtest_core::Result<()> {
//! let mut session = TestSession::new(Box::new(SymphoniaDecoder::new()));
//! session.open("/music/hires.flac")?;
//! session.configure(TestType::SamplingRate, QualityFactor(192_000), QualityFactor(48_000))?;
//! session.materialize()?;
//!
//! // ... play Slot::First and Slot::Second through a PlaybackEngine ...
//!
//! let correct = session.judge(true)?;
//! println!("{}", if correct { "Pass" } else { "Fail" });
//! # Ok(())
//! # }
//! ```

mod cancel;
mod playback;
mod results;
mod session;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use cancel::CancelToken;
pub use playback::{PlaybackEngine, PlaybackFeed, PlaybackState, DEFAULT_BUFFER_MS};
pub use results::ResultLog;
pub use session::{TestConfig, TestSession};
