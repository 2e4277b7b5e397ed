//! Test doubles for the decoder and device capabilities
//!
//! `MemoryDecoder` serves synthetic PCM from memory and `ManualDevice` lets a
//! test pull blocks from the playback callback by hand, so session and
//! playback logic can be exercised without files or sound hardware.

use blindtest_core::{
    AudioDecoder, AudioDevice, AudioStreamInfo, BlindTestError, DeviceStream, PcmBuffer, PcmFormat,
    PullCallback, Result, SampleRate, StreamRequest, StreamSelector, StreamStatus,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Deterministic test pattern: byte `i` of the stream is `i % 251`
pub fn ramp_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Decoder backed by in-memory buffers keyed by path
pub struct MemoryDecoder {
    sources: HashMap<PathBuf, PcmBuffer>,
    chunk_frames: usize,
    fail_after_chunks: Option<usize>,
    decodes: Arc<AtomicUsize>,
    current: Option<(PathBuf, usize, usize)>,
}

impl MemoryDecoder {
    /// Decoder with no sources
    pub fn new() -> Self {
        Self {
            sources: HashMap::new(),
            chunk_frames: 1_024,
            fail_after_chunks: None,
            decodes: Arc::new(AtomicUsize::new(0)),
            current: None,
        }
    }

    /// Serve `buffer` for `path`
    #[must_use]
    pub fn with_buffer(mut self, path: impl Into<PathBuf>, buffer: PcmBuffer) -> Self {
        self.sources.insert(path.into(), buffer);
        self
    }

    /// Serve `frames` frames of `ramp_bytes` for `path`
    #[must_use]
    pub fn with_ramp(
        self,
        path: impl Into<PathBuf>,
        sample_rate: u32,
        bit_depth: u8,
        channels: u8,
        frames: usize,
    ) -> Self {
        let format = PcmFormat::new(SampleRate::new(sample_rate), bit_depth, channels);
        let data = ramp_bytes(frames * format.bytes_per_frame());
        self.with_buffer(path, PcmBuffer::from_bytes(data, format))
    }

    /// Fail with `DecodeFailed` after serving `chunks` chunks
    #[must_use]
    pub fn failing_after(mut self, chunks: usize) -> Self {
        self.fail_after_chunks = Some(chunks);
        self
    }

    /// Counter of full decodes started, shared with the caller
    pub fn decode_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.decodes)
    }

    fn lookup(&self, path: &Path) -> Result<&PcmBuffer> {
        self.sources.get(path).ok_or_else(|| {
            BlindTestError::open_failed(path.display().to_string(), "no such source")
        })
    }
}

impl Default for MemoryDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn info_of(buffer: &PcmBuffer) -> AudioStreamInfo {
    let format = buffer.format();
    AudioStreamInfo::new(
        format.sample_rate.as_hz(),
        format.bit_depth,
        format.channels,
    )
}

impl AudioDecoder for MemoryDecoder {
    fn probe(&self, path: &Path) -> Result<AudioStreamInfo> {
        self.lookup(path).map(info_of)
    }

    fn open(&mut self, path: &Path, _selector: StreamSelector) -> Result<AudioStreamInfo> {
        let info = info_of(self.lookup(path)?);
        self.decodes.fetch_add(1, Ordering::SeqCst);
        self.current = Some((path.to_path_buf(), 0, 0));
        Ok(info)
    }

    fn decode_next(&mut self) -> Result<Option<Vec<u8>>> {
        let (path, offset, served) = self
            .current
            .clone()
            .ok_or_else(|| BlindTestError::not_ready("no stream open for decoding"))?;

        if self.fail_after_chunks.is_some_and(|limit| served >= limit) {
            return Err(BlindTestError::decode_failed("corrupt packet"));
        }

        let buffer = self.lookup(&path)?;
        let bytes = buffer.as_bytes();
        if offset >= bytes.len() {
            return Ok(None);
        }

        let end = (offset + self.chunk_frames * buffer.format().bytes_per_frame()).min(bytes.len());
        let chunk = bytes[offset..end].to_vec();
        self.current = Some((path, end, served + 1));
        Ok(Some(chunk))
    }

    fn close(&mut self) {
        self.current = None;
    }
}

#[derive(Default)]
struct DeviceState {
    callback: Option<PullCallback>,
    request: Option<StreamRequest>,
    playing: bool,
    fail_open: bool,
    streams_opened: usize,
}

/// Output device whose callback is driven by the test
///
/// Clones share state, so a test keeps one handle while the engine owns
/// another.
#[derive(Clone, Default)]
pub struct ManualDevice {
    shared: Arc<Mutex<DeviceState>>,
}

impl ManualDevice {
    /// Device that accepts every stream
    pub fn new() -> Self {
        Self::default()
    }

    /// Device that rejects every stream with `DeviceOpenFailed`
    pub fn unavailable() -> Self {
        let device = Self::default();
        device.state().fail_open = true;
        device
    }

    fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pull `frames` frames from the callback as a real backend would
    ///
    /// Returns `None` when no stream is open or the stream is paused.
    pub fn pull(&self, frames: usize) -> Option<(Vec<u8>, StreamStatus)> {
        let mut state = self.state();
        if !state.playing {
            return None;
        }
        let bytes_per_frame = state.request?.format.bytes_per_frame();
        let callback = state.callback.as_mut()?;

        let mut block = vec![0u8; frames * bytes_per_frame];
        let status = callback(&mut block);
        Some((block, status))
    }

    /// A stream is open (playing or paused)
    pub fn is_open(&self) -> bool {
        self.state().callback.is_some()
    }

    /// The open stream is pulling
    pub fn is_playing(&self) -> bool {
        self.state().playing
    }

    /// Request of the open stream
    pub fn request(&self) -> Option<StreamRequest> {
        self.state().request
    }

    /// Number of streams opened so far
    pub fn streams_opened(&self) -> usize {
        self.state().streams_opened
    }
}

impl AudioDevice for ManualDevice {
    fn open_stream(
        &mut self,
        request: StreamRequest,
        callback: PullCallback,
    ) -> Result<Box<dyn DeviceStream>> {
        let mut state = self.state();
        if state.fail_open {
            return Err(BlindTestError::device_open_failed("no output device available"));
        }

        state.callback = Some(callback);
        state.request = Some(request);
        state.playing = false;
        state.streams_opened += 1;

        Ok(Box::new(ManualStream {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct ManualStream {
    shared: Arc<Mutex<DeviceState>>,
}

impl ManualStream {
    fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DeviceStream for ManualStream {
    fn play(&mut self) -> Result<()> {
        self.state().playing = true;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.state().playing = false;
        Ok(())
    }
}

impl Drop for ManualStream {
    fn drop(&mut self) {
        let mut state = self.state();
        state.callback = None;
        state.request = None;
        state.playing = false;
    }
}
