/// Capability traits the engine is written against
///
/// One decoder and one device implementation are chosen at build time; the
/// session and playback engine only see these traits.
use crate::error::Result;
use crate::types::{AudioStreamInfo, PcmBuffer, PcmFormat};
use std::path::Path;

/// Which stream of a container to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamSelector {
    /// First track carrying audio
    #[default]
    FirstAudio,

    /// Track with a specific container id
    Track(u32),
}

/// Audio decoder trait
///
/// Implementers turn a media container into packed interleaved integer PCM
/// in the layout described by the returned `AudioStreamInfo`.
pub trait AudioDecoder: Send {
    /// Read stream metadata without decoding samples
    ///
    /// # Errors
    /// `OpenFailed` if the file cannot be opened or parsed, `NoAudioStream`
    /// if it has no audio track
    fn probe(&self, path: &Path) -> Result<AudioStreamInfo>;

    /// Open a file for chunked decoding, replacing any open stream
    fn open(&mut self, path: &Path, selector: StreamSelector) -> Result<AudioStreamInfo>;

    /// Decode the next chunk of packed PCM
    ///
    /// Returns `None` at end of stream.
    fn decode_next(&mut self) -> Result<Option<Vec<u8>>>;

    /// Release the open stream, if any
    fn close(&mut self);

    /// Decode an entire stream into memory
    ///
    /// On failure nothing is returned; the partially filled buffer is dropped.
    fn decode(&mut self, path: &Path, selector: StreamSelector) -> Result<PcmBuffer> {
        let info = self.open(path, selector)?;
        let mut buffer = PcmBuffer::new(info.format());

        loop {
            match self.decode_next() {
                Ok(Some(chunk)) => buffer.append(&chunk),
                Ok(None) => break,
                Err(e) => {
                    self.close();
                    return Err(e);
                }
            }
        }

        self.close();
        Ok(buffer)
    }
}

/// What the pull callback tells the device after filling a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// More data follows
    Continue,

    /// Source exhausted; the block was filled with silence
    Complete,
}

/// Real-time pull callback
///
/// Receives a block of bytes in the stream's `PcmFormat` to fill completely.
///
/// **CRITICAL**: runs on the audio backend's thread. No allocations, no locks,
/// no blocking I/O.
pub type PullCallback = Box<dyn FnMut(&mut [u8]) -> StreamStatus + Send + 'static>;

/// Parameters for opening a device stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRequest {
    /// Layout of the bytes the callback produces
    pub format: PcmFormat,

    /// Device buffer size in frames
    pub buffer_frames: u32,
}

impl StreamRequest {
    /// Request a buffer holding `buffer_ms` milliseconds of audio
    pub fn with_latency_ms(format: PcmFormat, buffer_ms: u32) -> Self {
        let frames = format.ms_to_frames(u64::from(buffer_ms)).max(1);
        Self {
            format,
            buffer_frames: u32::try_from(frames).unwrap_or(u32::MAX),
        }
    }
}

/// Audio output device capability
pub trait AudioDevice {
    /// Open a paused stream fed by `callback`
    ///
    /// # Errors
    /// `DeviceOpenFailed` if no device is available or the format is rejected
    fn open_stream(
        &mut self,
        request: StreamRequest,
        callback: PullCallback,
    ) -> Result<Box<dyn DeviceStream>>;
}

/// An open device stream
///
/// Dropping the stream closes it. Implementations must not return from drop
/// while a callback invocation is still running.
pub trait DeviceStream {
    /// Start or resume pulling from the callback
    fn play(&mut self) -> Result<()>;

    /// Stop pulling; the callback is not invoked until `play`
    fn pause(&mut self) -> Result<()>;
}
