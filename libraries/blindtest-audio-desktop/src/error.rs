/// Desktop audio output errors
use blindtest_core::BlindTestError;
use thiserror::Error;

/// Result type for desktop audio operations
pub type Result<T> = std::result::Result<T, AudioError>;

/// Audio errors
#[derive(Debug, Error)]
pub enum AudioError {
    /// No default output device
    #[error("Audio device not found")]
    DeviceNotFound,

    /// Device cannot play the requested layout
    #[error("Unsupported stream configuration: {0}")]
    UnsupportedConfig(String),

    /// Failed to build output stream
    #[error("Failed to build output stream: {0}")]
    StreamBuildError(String),

    /// Failed to play stream
    #[error("Failed to play stream: {0}")]
    PlayError(String),

    /// Failed to pause stream
    #[error("Failed to pause stream: {0}")]
    PauseError(String),

    /// The thread owning the stream is gone
    #[error("Audio thread error: {0}")]
    ThreadError(String),
}

impl From<cpal::BuildStreamError> for AudioError {
    fn from(err: cpal::BuildStreamError) -> Self {
        match err {
            cpal::BuildStreamError::StreamConfigNotSupported => {
                AudioError::UnsupportedConfig(err.to_string())
            }
            other => AudioError::StreamBuildError(other.to_string()),
        }
    }
}

impl From<cpal::PlayStreamError> for AudioError {
    fn from(err: cpal::PlayStreamError) -> Self {
        AudioError::PlayError(err.to_string())
    }
}

impl From<cpal::PauseStreamError> for AudioError {
    fn from(err: cpal::PauseStreamError) -> Self {
        AudioError::PauseError(err.to_string())
    }
}

impl From<cpal::SupportedStreamConfigsError> for AudioError {
    fn from(err: cpal::SupportedStreamConfigsError) -> Self {
        AudioError::UnsupportedConfig(err.to_string())
    }
}

impl From<AudioError> for BlindTestError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::PlayError(_) | AudioError::PauseError(_) | AudioError::ThreadError(_) => {
                BlindTestError::device(err.to_string())
            }
            AudioError::DeviceNotFound
            | AudioError::UnsupportedConfig(_)
            | AudioError::StreamBuildError(_) => BlindTestError::device_open_failed(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_errors_map_to_device_open_failed() {
        let e: BlindTestError = AudioError::DeviceNotFound.into();
        assert!(matches!(e, BlindTestError::DeviceOpenFailed(_)));

        let e: BlindTestError = AudioError::from(cpal::BuildStreamError::StreamConfigNotSupported).into();
        assert!(matches!(e, BlindTestError::DeviceOpenFailed(_)));
    }

    #[test]
    fn runtime_errors_map_to_device_error() {
        let e: BlindTestError = AudioError::PauseError("busy".into()).into();
        assert!(matches!(e, BlindTestError::DeviceError(_)));
    }
}
