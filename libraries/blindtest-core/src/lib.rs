//! Blindtest Core
//!
//! Platform-agnostic types, capability traits, and error handling for the
//! blind quality listening test.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `AudioStreamInfo`, `PcmBuffer`, `TestType`, `Slot`, `ResultRecord`
//! - **Capability Traits**: `AudioDecoder` (container -> PCM) and `AudioDevice` (pull-driven output)
//! - **Error Handling**: Unified `BlindTestError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use blindtest_core::{AudioStreamInfo, Rendition, Slot};
//!
//! let info = AudioStreamInfo::new(192_000, 24, 2);
//! assert!(info.supports_rate_test());
//!
//! // With HQ drawn into the second slot, the first slot plays LQ
//! assert_eq!(Rendition::for_slot(Slot::First, false), Rendition::Lq);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{BlindTestError, Result};
pub use traits::{
    AudioDecoder, AudioDevice, DeviceStream, PullCallback, StreamRequest, StreamSelector,
    StreamStatus,
};

pub use types::{
    normalize_bit_depth, AudioStreamInfo, Outcome, PcmBuffer, PcmFormat, QualityFactor, Rendition,
    ResultRecord, SampleRate, Slot, TestType, SUPPORTED_BIT_DEPTHS,
};
