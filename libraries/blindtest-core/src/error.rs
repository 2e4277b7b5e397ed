/// Core error types for Blindtest
use crate::types::{QualityFactor, TestType};
use thiserror::Error;

/// Result type alias using `BlindTestError`
pub type Result<T> = std::result::Result<T, BlindTestError>;

/// Core error type for Blindtest
///
/// Every failure is recoverable by the caller: nothing here is fatal to the
/// process, and operations that fail leave their target in its pre-call state.
#[derive(Error, Debug)]
pub enum BlindTestError {
    /// File missing, unreadable, or an unsupported container
    #[error("Failed to open {path}: {reason}")]
    OpenFailed { path: String, reason: String },

    /// Container opened but holds no audio track
    #[error("No audio stream in {0}")]
    NoAudioStream(String),

    /// Mid-stream decode error
    #[error("Decode failed: {0}")]
    DecodeFailed(String),

    /// HQ factor is not strictly better than LQ factor
    #[error("HQ factor {hq} is not strictly higher quality than LQ factor {lq}")]
    InvertedFactors { hq: QualityFactor, lq: QualityFactor },

    /// Conversion the converter cannot express (non-integer ratio, odd byte width)
    #[error("Unsupported conversion: {0}")]
    UnsupportedConversion(String),

    /// The loaded source is not eligible for the requested test
    #[error("{0} test is not available for this source")]
    TestUnavailable(TestType),

    /// Operation needs a step that has not run yet
    #[error("Not ready: {0}")]
    NotReady(String),

    /// Background work was cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// Audio device unavailable or format rejected
    #[error("Failed to open audio device: {0}")]
    DeviceOpenFailed(String),

    /// Runtime device failure (pause/resume)
    #[error("Audio device error: {0}")]
    DeviceError(String),

    /// A stream is already open for this session
    #[error("A playback stream is already open")]
    AlreadyOpen,

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl BlindTestError {
    /// Create an open failure
    pub fn open_failed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::OpenFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a no-audio-stream error
    pub fn no_audio_stream(path: impl Into<String>) -> Self {
        Self::NoAudioStream(path.into())
    }

    /// Create a decode failure
    pub fn decode_failed(msg: impl Into<String>) -> Self {
        Self::DecodeFailed(msg.into())
    }

    /// Create an unsupported conversion error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedConversion(msg.into())
    }

    /// Create a not-ready error
    pub fn not_ready(msg: impl Into<String>) -> Self {
        Self::NotReady(msg.into())
    }

    /// Create a device open failure
    pub fn device_open_failed(msg: impl Into<String>) -> Self {
        Self::DeviceOpenFailed(msg.into())
    }

    /// Create a runtime device error
    pub fn device(msg: impl Into<String>) -> Self {
        Self::DeviceError(msg.into())
    }
}
