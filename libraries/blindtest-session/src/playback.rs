//! Playback engine - plays one slot of a test session at a time
//!
//! The engine owns the device stream and a cursor into the playing buffer.
//! The buffer and its format are fixed for the life of a stream; only the
//! frame index is shared with the audio thread, as an atomic the callback
//! advances and `seek` overwrites.

use crate::session::TestSession;
use blindtest_core::{
    AudioDevice, BlindTestError, DeviceStream, PcmBuffer, PcmFormat, PullCallback, Rendition,
    Result, Slot, StreamRequest, StreamStatus,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default device buffer length
pub const DEFAULT_BUFFER_MS: u32 = 100;

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    /// No stream open
    Idle,

    /// Stream opened but not yet started
    Open,

    /// Device is pulling samples
    Running,

    /// Stream open, device not pulling
    Paused,

    /// Buffer played to the end; the stream stays open until `stop`
    Stopped,
}

/// Marks the frame index as played out
const FINISHED: u64 = 1 << 63;

/// Cursor state shared between the control thread and the audio callback
///
/// Position and completion live in one atomic word, so a `seek` racing the
/// callback's end-of-buffer check always wins: the callback can only mark
/// the exact index it observed as finished.
#[derive(Debug, Default)]
struct CursorShared {
    /// Next frame to deliver, with `FINISHED` set once the callback ran dry
    frame_index: AtomicU64,
}

impl CursorShared {
    fn load(&self) -> u64 {
        self.frame_index.load(Ordering::Acquire)
    }

    fn position(&self) -> u64 {
        self.load() & !FINISHED
    }

    fn is_finished(&self) -> bool {
        self.load() & FINISHED != 0
    }

    /// Move to `frame`, clearing completion
    fn seek(&self, frame: u64) {
        self.frame_index.store(frame & !FINISHED, Ordering::Release);
    }

    /// Advance from `observed` by `count` frames unless a seek got there first
    fn advance(&self, observed: u64, count: u64) {
        let _ = self.frame_index.compare_exchange(
            observed,
            observed + count,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Mark `observed` as played out; false if the index moved meanwhile
    fn mark_finished(&self, observed: u64) -> bool {
        observed & FINISHED != 0
            || self
                .frame_index
                .compare_exchange(
                    observed,
                    observed | FINISHED,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
    }
}

/// Pull side of a stream, moved into the device callback
///
/// Copies whole frames from the buffer into each block the device asks for
/// and pads whatever is left with silence. Never allocates or locks.
pub struct PlaybackFeed {
    buffer: Arc<PcmBuffer>,
    shared: Arc<CursorShared>,
    silence: u8,
}

impl PlaybackFeed {
    /// Fill `out` with the next frames
    pub fn fill(&self, out: &mut [u8]) -> StreamStatus {
        let bytes_per_frame = self.buffer.format().bytes_per_frame();
        let total = self.buffer.frames() as u64;
        let observed = self.shared.load();
        let start = observed & !FINISHED;
        let frames_left = total.saturating_sub(start);

        if frames_left == 0 || bytes_per_frame == 0 {
            out.fill(self.silence);
            self.shared.mark_finished(observed);
            return StreamStatus::Complete;
        }

        let count = (out.len() / bytes_per_frame).min(frames_left as usize);
        let len = count * bytes_per_frame;
        let offset = start as usize * bytes_per_frame;

        out[..len].copy_from_slice(&self.buffer.as_bytes()[offset..offset + len]);
        out[len..].fill(self.silence);

        // A seek that landed mid-callback wins over our advance
        self.shared.advance(observed, count as u64);
        StreamStatus::Continue
    }
}

/// Control side of a stream
struct PlaybackCursor {
    slot: Slot,
    rendition: Rendition,
    format: PcmFormat,
    total_frames: u64,
    shared: Arc<CursorShared>,
}

impl PlaybackCursor {
    fn position_frames(&self) -> u64 {
        self.shared.position().min(self.total_frames)
    }

    fn is_finished(&self) -> bool {
        self.shared.is_finished()
    }
}

/// Plays one slot of a `TestSession` through an `AudioDevice`
///
/// At most one stream is open at a time. The engine lives on the control
/// thread; only the `PlaybackFeed` crosses to the audio thread.
pub struct PlaybackEngine {
    device: Box<dyn AudioDevice>,
    buffer_ms: u32,
    state: PlaybackState,
    stream: Option<Box<dyn DeviceStream>>,
    cursor: Option<PlaybackCursor>,
}

impl PlaybackEngine {
    /// Create an idle engine with the default buffer length
    pub fn new(device: Box<dyn AudioDevice>) -> Self {
        Self::with_buffer_ms(device, DEFAULT_BUFFER_MS)
    }

    /// Create an idle engine requesting `buffer_ms` of device buffering
    pub fn with_buffer_ms(device: Box<dyn AudioDevice>, buffer_ms: u32) -> Self {
        Self {
            device,
            buffer_ms: buffer_ms.max(1),
            state: PlaybackState::Idle,
            stream: None,
            cursor: None,
        }
    }

    /// Open a stream on `slot`'s buffer and start it from frame 0
    ///
    /// # Errors
    /// - `AlreadyOpen` if a stream is open; call `stop` first
    /// - `NotReady` if the session has no non-empty buffer for `slot`
    /// - `DeviceOpenFailed` if the device refuses; the engine stays idle
    pub fn start(&mut self, session: &TestSession, slot: Slot) -> Result<()> {
        if self.stream.is_some() {
            return Err(BlindTestError::AlreadyOpen);
        }

        let rendition = session
            .rendition_for(slot)
            .ok_or_else(|| BlindTestError::not_ready("slots have not been assigned"))?;
        let buffer = session
            .buffer(rendition)
            .filter(|b| !b.is_empty())
            .ok_or_else(|| BlindTestError::not_ready(format!("no audio for slot {}", slot)))?;

        let format = buffer.format();
        let total_frames = buffer.frames() as u64;
        let shared = Arc::new(CursorShared::default());

        let feed = PlaybackFeed {
            buffer,
            shared: Arc::clone(&shared),
            silence: format.silence_byte(),
        };
        let callback: PullCallback = Box::new(move |out: &mut [u8]| feed.fill(out));

        let request = StreamRequest::with_latency_ms(format, self.buffer_ms);
        let mut stream = self
            .device
            .open_stream(request, callback)
            .map_err(into_open_failure)?;
        self.state = PlaybackState::Open;

        if let Err(e) = stream.play() {
            drop(stream);
            self.state = PlaybackState::Idle;
            return Err(into_open_failure(e));
        }

        info!(
            "Playing slot {} ({} Hz, {} bit, {} ch, {} frames)",
            slot,
            format.sample_rate.as_hz(),
            format.bit_depth,
            format.channels,
            total_frames
        );

        self.stream = Some(stream);
        self.cursor = Some(PlaybackCursor {
            slot,
            rendition,
            format,
            total_frames,
            shared,
        });
        self.state = PlaybackState::Running;
        Ok(())
    }

    /// Pause a running stream or resume a paused one
    ///
    /// No effect when idle or after the buffer has played out.
    pub fn toggle(&mut self) -> Result<()> {
        let state = self.state();
        let Some(stream) = self.stream.as_mut() else {
            return Ok(());
        };

        match state {
            PlaybackState::Running => {
                stream.pause()?;
                self.state = PlaybackState::Paused;
                debug!("Paused");
            }
            PlaybackState::Paused => {
                stream.play()?;
                self.state = PlaybackState::Running;
                debug!("Resumed");
            }
            PlaybackState::Idle | PlaybackState::Open | PlaybackState::Stopped => {}
        }
        Ok(())
    }

    /// Close the stream and return to idle
    ///
    /// Safe in every state. Once this returns no further callback runs.
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            debug!("Stream closed");
        }
        self.cursor = None;
        self.state = PlaybackState::Idle;
    }

    /// Move the cursor to `position_ms`
    ///
    /// Positions past the end are accepted; playback then completes with
    /// silence. No effect when idle.
    pub fn seek(&mut self, position_ms: u32) {
        let Some(cursor) = self.cursor.as_ref() else {
            warn!("Seek ignored: nothing is playing");
            return;
        };

        let frame = cursor.format.ms_to_frames(u64::from(position_ms));
        cursor.shared.seek(frame);
        debug!("Seek to {} ms (frame {})", position_ms, frame);
    }

    /// Current and total position in milliseconds, while running
    pub fn time_info(&self) -> Option<(u32, u32)> {
        if self.state() != PlaybackState::Running {
            return None;
        }
        let cursor = self.cursor.as_ref()?;

        let current = cursor.format.frames_to_ms(cursor.position_frames());
        let total = cursor.format.frames_to_ms(cursor.total_frames);
        Some((saturate_ms(current), saturate_ms(total)))
    }

    /// Current state, reporting `Stopped` once the buffer has played out
    pub fn state(&self) -> PlaybackState {
        match self.state {
            PlaybackState::Running | PlaybackState::Paused
                if self.cursor.as_ref().is_some_and(PlaybackCursor::is_finished) =>
            {
                PlaybackState::Stopped
            }
            state => state,
        }
    }

    /// A stream is open, in any state
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// The device is pulling from a buffer with frames left
    pub fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Running
    }

    /// Slot of the open stream
    pub fn active_slot(&self) -> Option<Slot> {
        self.cursor.as_ref().map(|c| c.slot)
    }

    /// Rendition behind the open stream
    ///
    /// Not for display to the listener during a blind trial.
    pub fn active_rendition(&self) -> Option<Rendition> {
        self.cursor.as_ref().map(|c| c.rendition)
    }

    /// Configured device buffer length
    pub fn buffer_ms(&self) -> u32 {
        self.buffer_ms
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn into_open_failure(e: BlindTestError) -> BlindTestError {
    match e {
        BlindTestError::DeviceOpenFailed(_) => e,
        other => BlindTestError::device_open_failed(other.to_string()),
    }
}

fn saturate_ms(ms: u64) -> u32 {
    u32::try_from(ms).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blindtest_core::SampleRate;

    fn feed_over(bytes: Vec<u8>, format: PcmFormat) -> (PlaybackFeed, Arc<CursorShared>) {
        let shared = Arc::new(CursorShared::default());
        let feed = PlaybackFeed {
            buffer: Arc::new(PcmBuffer::from_bytes(bytes, format)),
            shared: Arc::clone(&shared),
            silence: format.silence_byte(),
        };
        (feed, shared)
    }

    #[test]
    fn feed_copies_whole_frames_then_pads() {
        // Mono 16-bit, 3 frames
        let format = PcmFormat::new(SampleRate::DVD_QUALITY, 16, 1);
        let (feed, shared) = feed_over(vec![1, 2, 3, 4, 5, 6], format);

        let mut block = [0xAA; 4];
        assert_eq!(feed.fill(&mut block), StreamStatus::Continue);
        assert_eq!(block, [1, 2, 3, 4]);

        let mut block = [0xAA; 4];
        assert_eq!(feed.fill(&mut block), StreamStatus::Continue);
        assert_eq!(block, [5, 6, 0, 0]);
        assert_eq!(shared.position(), 3);

        let mut block = [0xAA; 4];
        assert_eq!(feed.fill(&mut block), StreamStatus::Complete);
        assert_eq!(block, [0, 0, 0, 0]);
        assert!(shared.is_finished());
        assert_eq!(shared.position(), 3);
    }

    #[test]
    fn feed_pads_8_bit_with_midpoint() {
        let format = PcmFormat::new(SampleRate::DVD_QUALITY, 8, 2);
        let (feed, _) = feed_over(vec![0x10, 0x20], format);

        let mut block = [0u8; 6];
        feed.fill(&mut block);
        assert_eq!(block, [0x10, 0x20, 0x80, 0x80, 0x80, 0x80]);
    }

    #[test]
    fn feed_past_end_completes_immediately() {
        let format = PcmFormat::new(SampleRate::DVD_QUALITY, 16, 1);
        let (feed, shared) = feed_over(vec![1, 2, 3, 4], format);
        shared.seek(1_000);

        let mut block = [0xAA; 4];
        assert_eq!(feed.fill(&mut block), StreamStatus::Complete);
        assert_eq!(block, [0; 4]);
    }

    #[test]
    fn feed_ignores_partial_trailing_frame_in_block() {
        // Stereo 24-bit (6 bytes/frame), block of 8 bytes holds one whole frame
        let format = PcmFormat::new(SampleRate::HIGH_RES_96, 24, 2);
        let (feed, shared) = feed_over((1u8..=12).collect(), format);

        let mut block = [0xAA; 8];
        feed.fill(&mut block);
        assert_eq!(block, [1, 2, 3, 4, 5, 6, 0, 0]);
        assert_eq!(shared.position(), 1);
    }

    #[test]
    fn seek_during_end_of_buffer_check_keeps_playing() {
        let format = PcmFormat::new(SampleRate::DVD_QUALITY, 16, 1);
        let (feed, shared) = feed_over(vec![1, 2, 3, 4], format);
        shared.seek(2);

        // The callback has read the end-of-buffer index when the seek lands
        let observed = shared.load();
        shared.seek(0);
        assert!(!shared.mark_finished(observed));
        assert!(!shared.is_finished());

        let mut block = [0xAA; 2];
        assert_eq!(feed.fill(&mut block), StreamStatus::Continue);
        assert_eq!(block, [1, 2]);
    }

    #[test]
    fn seek_clears_completion() {
        let format = PcmFormat::new(SampleRate::DVD_QUALITY, 16, 1);
        let (feed, shared) = feed_over(vec![1, 2], format);

        let mut block = [0u8; 2];
        feed.fill(&mut block);
        assert_eq!(feed.fill(&mut block), StreamStatus::Complete);
        assert!(shared.is_finished());

        shared.seek(0);
        assert!(!shared.is_finished());
        assert_eq!(feed.fill(&mut block), StreamStatus::Continue);
        assert_eq!(block, [1, 2]);
    }

    #[test]
    fn open_failure_is_normalised() {
        let e = into_open_failure(BlindTestError::device("busy"));
        assert!(matches!(e, BlindTestError::DeviceOpenFailed(_)));
    }
}
