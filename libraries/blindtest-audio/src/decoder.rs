/// Audio decoder implementation using Symphonia
use crate::convert::pack_i32_samples;
use blindtest_core::{
    normalize_bit_depth, AudioDecoder, AudioStreamInfo, BlindTestError, Result, StreamSelector,
};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Track};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

/// Audio decoder using Symphonia
///
/// Supports: WAV, FLAC, AIFF, MP3, OGG/Vorbis, AAC/ALAC in MP4
///
/// Output is packed interleaved integer PCM at the source's own rate,
/// channel count and (normalised) bit depth. Symphonia's native samples are
/// widened to full-scale `i32` and then truncated to the most-significant
/// bytes, so 24-bit material keeps exactly its 3 significant bytes.
pub struct SymphoniaDecoder {
    /// Streaming state (when a file is open)
    stream_state: Option<StreamState>,
}

/// Internal state for chunked decode
struct StreamState {
    /// Format reader (container parser)
    format: Box<dyn FormatReader>,
    /// Audio decoder
    decoder: Box<dyn Decoder>,
    /// Track ID
    track_id: u32,
    /// Output layout
    info: AudioStreamInfo,
    /// Interleaving scratch, grown on demand
    sample_buf: Option<SampleBuffer<i32>>,
    /// Chunk decoded early to discover the channel layout
    pending: Option<Vec<u8>>,
}

impl SymphoniaDecoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self { stream_state: None }
    }

    /// Check if a stream is currently open
    pub fn is_open(&self) -> bool {
        self.stream_state.is_some()
    }

    /// Check the file extension against the containers Symphonia is built with
    pub fn supports_format(path: &Path) -> bool {
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            matches!(
                ext.to_lowercase().as_str(),
                "wav" | "wave" | "flac" | "aif" | "aiff" | "mp3" | "ogg" | "m4a" | "mp4" | "aac"
            )
        } else {
            false
        }
    }

    /// Open the container and probe its format
    fn open_format(path: &Path) -> Result<Box<dyn FormatReader>> {
        let path_str = path.display().to_string();

        let file = std::fs::File::open(path)
            .map_err(|e| BlindTestError::open_failed(path_str.clone(), e.to_string()))?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create a hint to help the format registry guess the format
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| BlindTestError::open_failed(path_str, format!("Failed to probe file: {}", e)))?;

        Ok(probed.format)
    }

    /// Pick the track to decode
    fn select_track<'a>(tracks: &'a [Track], selector: StreamSelector) -> Option<&'a Track> {
        let is_audio = |t: &&Track| {
            t.codec_params.codec != CODEC_TYPE_NULL && t.codec_params.sample_rate.is_some()
        };

        match selector {
            StreamSelector::FirstAudio => tracks.iter().find(is_audio),
            StreamSelector::Track(id) => tracks.iter().filter(is_audio).find(|t| t.id == id),
        }
    }

    /// Build stream state for `path`, priming the decoder when the container
    /// does not declare its channel layout
    fn create_stream_state(path: &Path, selector: StreamSelector) -> Result<StreamState> {
        let path_str = path.display().to_string();
        let format = Self::open_format(path)?;

        let track = Self::select_track(format.tracks(), selector)
            .ok_or_else(|| BlindTestError::no_audio_stream(path_str.clone()))?;

        let track_id = track.id;
        let params: CodecParameters = track.codec_params.clone();

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| {
                BlindTestError::open_failed(path_str.clone(), format!("Failed to create decoder: {}", e))
            })?;

        let sample_rate = params
            .sample_rate
            .ok_or_else(|| BlindTestError::no_audio_stream(path_str.clone()))?;
        let bit_depth = normalize_bit_depth(params.bits_per_sample.or(params.bits_per_coded_sample));
        let declared_channels = params.channels.map(|c| c.count());

        let mut state = StreamState {
            format,
            decoder,
            track_id,
            info: AudioStreamInfo::new(sample_rate, bit_depth, 0),
            sample_buf: None,
            pending: None,
        };

        match declared_channels {
            Some(count) => {
                state.info.channel_count = channel_count_u8(count, &path_str)?;
            }
            None => {
                // Lossy codecs only reveal their layout once a packet is decoded
                let (count, chunk) = state.decode_packet(None)?.ok_or_else(|| {
                    BlindTestError::decode_failed(format!("{} contains no audio packets", path_str))
                })?;
                state.info.channel_count = channel_count_u8(count, &path_str)?;
                state.pending = Some(chunk);
            }
        }

        debug!(
            "Opened {} (track {}): {} Hz, {} bit, {} ch",
            path_str, track_id, state.info.sample_rate_hz, state.info.bit_depth, state.info.channel_count
        );

        Ok(state)
    }
}

fn channel_count_u8(count: usize, path: &str) -> Result<u8> {
    match u8::try_from(count) {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(BlindTestError::open_failed(
            path,
            format!("unsupported channel count {}", count),
        )),
    }
}

impl StreamState {
    /// Decode the next packet of our track into packed bytes
    ///
    /// `expected_channels` is checked against the decoded layout once known.
    /// Returns the decoded channel count with the chunk, or `None` at end of
    /// stream.
    fn decode_packet(&mut self, expected_channels: Option<usize>) -> Result<Option<(usize, Vec<u8>)>> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => {
                    return Err(BlindTestError::decode_failed(format!(
                        "Error reading packet: {}",
                        e
                    )));
                }
            };

            // Skip packets that are not for our track
            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = self
                .decoder
                .decode(&packet)
                .map_err(|e| BlindTestError::decode_failed(format!("Decode error: {}", e)))?;

            if decoded.frames() == 0 {
                continue;
            }

            let spec = *decoded.spec();
            let channels = spec.channels.count();
            if let Some(expected) = expected_channels {
                if channels != expected {
                    return Err(BlindTestError::decode_failed(format!(
                        "channel count changed mid-stream ({} -> {})",
                        expected, channels
                    )));
                }
            }

            let needed = decoded.capacity() * channels;
            if self.sample_buf.as_ref().is_some_and(|b| b.capacity() < needed) {
                self.sample_buf = None;
            }
            let sample_buf = self
                .sample_buf
                .get_or_insert_with(|| SampleBuffer::new(decoded.capacity() as u64, spec));
            sample_buf.copy_interleaved_ref(decoded);

            let mut chunk = Vec::new();
            pack_i32_samples(sample_buf.samples(), self.info.bit_depth, &mut chunk);
            return Ok(Some((channels, chunk)));
        }
    }
}

impl Default for SymphoniaDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioDecoder for SymphoniaDecoder {
    fn probe(&self, path: &Path) -> Result<AudioStreamInfo> {
        Self::create_stream_state(path, StreamSelector::FirstAudio).map(|state| state.info)
    }

    fn open(&mut self, path: &Path, selector: StreamSelector) -> Result<AudioStreamInfo> {
        // Close any existing stream
        self.stream_state = None;

        let state = Self::create_stream_state(path, selector)?;
        let info = state.info;
        self.stream_state = Some(state);
        Ok(info)
    }

    fn decode_next(&mut self) -> Result<Option<Vec<u8>>> {
        let state = self
            .stream_state
            .as_mut()
            .ok_or_else(|| BlindTestError::not_ready("no stream open for decoding"))?;

        if let Some(chunk) = state.pending.take() {
            return Ok(Some(chunk));
        }

        let expected = usize::from(state.info.channel_count);
        Ok(state.decode_packet(Some(expected))?.map(|(_, chunk)| chunk))
    }

    fn close(&mut self) {
        self.stream_state = None;
    }
}
