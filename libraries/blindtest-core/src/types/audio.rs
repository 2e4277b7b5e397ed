/// Audio-related types
use serde::{Deserialize, Serialize};

/// Sample rate in Hz
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SampleRate(pub u32);

impl SampleRate {
    /// Common sample rates
    pub const CD_QUALITY: Self = Self(44_100);
    pub const DVD_QUALITY: Self = Self(48_000);
    pub const HIGH_RES_96: Self = Self(96_000);
    pub const HIGH_RES_192: Self = Self(192_000);

    /// Create a new sample rate
    #[must_use]
    pub fn new(hz: u32) -> Self {
        Self(hz)
    }

    /// Get the sample rate as Hz
    pub fn as_hz(&self) -> u32 {
        self.0
    }
}

/// Bit depths the engine can carry in a `PcmBuffer`
pub const SUPPORTED_BIT_DEPTHS: [u8; 4] = [8, 16, 24, 32];

/// Layout of interleaved integer PCM
///
/// 8-bit samples are unsigned (silence is `0x80`); wider samples are signed
/// little-endian, packed without padding (24-bit = 3 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PcmFormat {
    /// Sample rate
    pub sample_rate: SampleRate,

    /// Bits per sample (8, 16, 24 or 32)
    pub bit_depth: u8,

    /// Number of interleaved channels
    pub channels: u8,
}

impl PcmFormat {
    /// Create a new PCM format
    pub fn new(sample_rate: SampleRate, bit_depth: u8, channels: u8) -> Self {
        Self {
            sample_rate,
            bit_depth,
            channels,
        }
    }

    /// Bytes occupied by one sample of one channel
    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.bit_depth / 8)
    }

    /// Bytes occupied by one frame (one sample instant across all channels)
    pub fn bytes_per_frame(&self) -> usize {
        self.bytes_per_sample() * usize::from(self.channels)
    }

    /// Byte value that encodes silence in this format
    pub fn silence_byte(&self) -> u8 {
        if self.bit_depth == 8 {
            0x80
        } else {
            0x00
        }
    }

    /// Calculate the byte rate (bytes per second)
    pub fn byte_rate(&self) -> u64 {
        u64::from(self.sample_rate.as_hz()) * self.bytes_per_frame() as u64
    }

    /// Convert a position in milliseconds to a frame index
    pub fn ms_to_frames(&self, ms: u64) -> u64 {
        ms * u64::from(self.sample_rate.as_hz()) / 1000
    }

    /// Convert a frame index to a position in milliseconds
    pub fn frames_to_ms(&self, frames: u64) -> u64 {
        match self.sample_rate.as_hz() {
            0 => 0,
            hz => frames * 1000 / u64::from(hz),
        }
    }

    /// Whether the bit depth is one the engine supports
    pub fn is_valid(&self) -> bool {
        SUPPORTED_BIT_DEPTHS.contains(&self.bit_depth)
            && self.channels > 0
            && self.sample_rate.as_hz() > 0
    }
}

/// Stream metadata obtained by probing a file without decoding it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioStreamInfo {
    /// Sample rate in Hz
    pub sample_rate_hz: u32,

    /// Bits per sample, normalised to 8/16/24/32
    pub bit_depth: u8,

    /// Number of channels
    pub channel_count: u8,
}

impl AudioStreamInfo {
    /// Create a new stream info snapshot
    pub fn new(sample_rate_hz: u32, bit_depth: u8, channel_count: u8) -> Self {
        Self {
            sample_rate_hz,
            bit_depth,
            channel_count,
        }
    }

    /// PCM layout the decoder produces for this stream
    pub fn format(&self) -> PcmFormat {
        PcmFormat::new(
            SampleRate::new(self.sample_rate_hz),
            self.bit_depth,
            self.channel_count,
        )
    }

    /// A sampling rate test needs 24-bit material at 96 or 192 kHz
    pub fn supports_rate_test(&self) -> bool {
        self.bit_depth == 24 && matches!(self.sample_rate_hz, 96_000 | 192_000)
    }

    /// A bit depth test needs 24-bit material at any rate
    pub fn supports_depth_test(&self) -> bool {
        self.bit_depth == 24
    }
}

/// Round a declared bit depth up to the nearest supported container width
///
/// Decoders that do not declare a depth (lossy codecs) are treated as 16-bit.
pub fn normalize_bit_depth(bits: Option<u32>) -> u8 {
    match bits {
        None | Some(0) => 16,
        Some(b) if b <= 8 => 8,
        Some(b) if b <= 16 => 16,
        Some(b) if b <= 24 => 24,
        Some(_) => 32,
    }
}

/// Interleaved integer PCM held in memory
///
/// Filled by appending during decode, then read-only while a playback stream
/// references it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmBuffer {
    data: Vec<u8>,
    format: PcmFormat,
}

impl PcmBuffer {
    /// Create an empty buffer
    pub fn new(format: PcmFormat) -> Self {
        Self {
            data: Vec::new(),
            format,
        }
    }

    /// Create an empty buffer with room for `frames` frames
    pub fn with_capacity(frames: usize, format: PcmFormat) -> Self {
        Self {
            data: Vec::with_capacity(frames * format.bytes_per_frame()),
            format,
        }
    }

    /// Wrap already-packed bytes
    pub fn from_bytes(data: Vec<u8>, format: PcmFormat) -> Self {
        Self { data, format }
    }

    /// Append decoded bytes
    pub fn append(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Raw interleaved bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the buffer, returning its bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Layout of the samples
    pub fn format(&self) -> PcmFormat {
        self.format
    }

    /// Number of complete frames
    pub fn frames(&self) -> usize {
        match self.format.bytes_per_frame() {
            0 => 0,
            n => self.data.len() / n,
        }
    }

    /// Bytes of frame `index`, if present
    pub fn frame(&self, index: usize) -> Option<&[u8]> {
        let size = self.format.bytes_per_frame();
        let start = index.checked_mul(size)?;
        self.data.get(start..start.checked_add(size)?)
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Duration in milliseconds
    pub fn duration_ms(&self) -> u64 {
        self.format.frames_to_ms(self.frames() as u64)
    }
}
