/// CPAL-based output device (stream owned by a dedicated audio thread)
use crate::error::{AudioError, Result};
use blindtest_audio::convert::bytes_to_f32;
use blindtest_core::{
    AudioDevice, BlindTestError, DeviceStream, PcmFormat, PullCallback, StreamRequest,
};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleFormat, Stream, StreamConfig, SupportedBufferSize};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

/// Commands sent to the audio thread
enum StreamCommand {
    /// Start or resume pulling
    Play(Sender<Result<()>>),
    /// Stop pulling
    Pause(Sender<Result<()>>),
    /// Drop the stream and exit
    Shutdown,
}

/// Output device backed by the host's default CPAL output
///
/// Streams are opened at the buffer's own sample rate and channel count; the
/// device is never asked to resample. Samples are handed to CPAL as `f32`.
///
/// **Architecture**: each stream gets a dedicated audio thread that owns the
/// CPAL `Stream`. The control side talks to it over channels, avoiding
/// Send/Sync issues with CPAL's Stream type across platforms.
#[derive(Debug, Default)]
pub struct CpalDevice {
    _private: (),
}

impl CpalDevice {
    /// Create a device handle; the output is looked up when a stream opens
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the default host has an output device
    pub fn is_available() -> bool {
        cpal::default_host().default_output_device().is_some()
    }
}

impl AudioDevice for CpalDevice {
    fn open_stream(
        &mut self,
        request: StreamRequest,
        callback: PullCallback,
    ) -> blindtest_core::Result<Box<dyn DeviceStream>> {
        let (command_tx, command_rx) = bounded::<StreamCommand>(8);
        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);

        let handle = thread::Builder::new()
            .name("blindtest-audio".to_string())
            .spawn(move || audio_thread_run(request, callback, &command_rx, &ready_tx))
            .map_err(|e| BlindTestError::device_open_failed(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(CpalStream {
                command_tx,
                audio_thread: Some(handle),
            })),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e.into())
            }
            Err(_) => {
                let _ = handle.join();
                Err(BlindTestError::device_open_failed(
                    "audio thread exited before the stream was built",
                ))
            }
        }
    }
}

/// Audio thread main loop
///
/// Builds the stream, reports the outcome on `ready_tx`, then serves
/// commands until shutdown. The stream is dropped on this thread.
fn audio_thread_run(
    request: StreamRequest,
    callback: PullCallback,
    command_rx: &Receiver<StreamCommand>,
    ready_tx: &Sender<Result<()>>,
) {
    let stream = match build_stream(request, callback) {
        Ok(stream) => {
            let _ = ready_tx.send(Ok(()));
            stream
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    while let Ok(command) = command_rx.recv() {
        match command {
            StreamCommand::Play(reply) => {
                let _ = reply.send(stream.play().map_err(AudioError::from));
            }
            StreamCommand::Pause(reply) => {
                let _ = reply.send(stream.pause().map_err(AudioError::from));
            }
            StreamCommand::Shutdown => break,
        }
    }

    drop(stream);
    debug!("Audio thread finished");
}

/// Open a paused f32 stream on the default output for `request`
fn build_stream(request: StreamRequest, mut callback: PullCallback) -> Result<Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(AudioError::DeviceNotFound)?;

    let format = request.format;
    let config = find_config(&device, request)?;

    // Scratch for one device buffer of packed samples, allocated here so the
    // callback never allocates
    let buffer_frames = match config.buffer_size {
        BufferSize::Fixed(n) => n,
        BufferSize::Default => request.buffer_frames,
    };
    let mut scratch = vec![format.silence_byte(); buffer_frames as usize * format.bytes_per_frame()];

    debug!(
        "Opening stream: {} Hz, {} ch, {} bit source, buffer {:?}",
        config.sample_rate, config.channels, format.bit_depth, config.buffer_size
    );

    let stream = device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            fill_f32(data, &mut scratch, format, &mut callback);
        },
        |err| error!("Audio stream error: {}", err),
        None,
    )?;

    // CPAL may start some backends immediately
    if let Err(e) = stream.pause() {
        warn!("Could not pause new stream: {}", e);
    }

    Ok(stream)
}

/// Find an f32 configuration matching the request's rate and channel count
fn find_config(device: &Device, request: StreamRequest) -> Result<StreamConfig> {
    let format = request.format;
    let channels = u16::from(format.channels);
    let rate = format.sample_rate.as_hz();

    let supported = device
        .supported_output_configs()?
        .filter(|c| c.channels() == channels && c.sample_format() == SampleFormat::F32)
        .find(|c| c.min_sample_rate() <= rate && rate <= c.max_sample_rate())
        .ok_or_else(|| {
            AudioError::UnsupportedConfig(format!(
                "no f32 output at {} Hz with {} channels",
                rate, channels
            ))
        })?;

    let buffer_size = match supported.buffer_size() {
        SupportedBufferSize::Range { min, max } => {
            BufferSize::Fixed(request.buffer_frames.clamp(*min, *max))
        }
        SupportedBufferSize::Unknown => BufferSize::Fixed(request.buffer_frames),
    };

    Ok(StreamConfig {
        channels,
        sample_rate: rate,
        buffer_size,
    })
}

/// Fill a CPAL block by pulling packed bytes through `scratch`
///
/// `scratch` holds whole frames, so every pull asks for whole frames.
fn fill_f32(out: &mut [f32], scratch: &mut [u8], format: PcmFormat, callback: &mut PullCallback) {
    let width = format.bytes_per_sample();
    let frame = format.bytes_per_frame();
    if width == 0 || frame == 0 || scratch.len() < frame {
        out.fill(0.0);
        return;
    }

    let chunk_samples = scratch.len() / frame * usize::from(format.channels);
    for chunk in out.chunks_mut(chunk_samples) {
        let bytes = &mut scratch[..chunk.len() * width];
        // Completion is observed through the playback cursor, not here
        let _ = callback(bytes);
        let written = bytes_to_f32(bytes, format.bit_depth, chunk);
        chunk[written..].fill(0.0);
    }
}

/// An open CPAL stream, controlled through its audio thread
struct CpalStream {
    command_tx: Sender<StreamCommand>,
    audio_thread: Option<JoinHandle<()>>,
}

impl CpalStream {
    fn request(&self, make: fn(Sender<Result<()>>) -> StreamCommand) -> Result<()> {
        let (reply_tx, reply_rx) = bounded(1);
        self.command_tx
            .send(make(reply_tx))
            .map_err(|e| AudioError::ThreadError(e.to_string()))?;
        reply_rx
            .recv()
            .map_err(|e| AudioError::ThreadError(e.to_string()))?
    }
}

impl DeviceStream for CpalStream {
    fn play(&mut self) -> blindtest_core::Result<()> {
        Ok(self.request(StreamCommand::Play)?)
    }

    fn pause(&mut self) -> blindtest_core::Result<()> {
        Ok(self.request(StreamCommand::Pause)?)
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        let _ = self.command_tx.send(StreamCommand::Shutdown);
        // Joining guarantees the stream, and with it the callback, is gone
        if let Some(handle) = self.audio_thread.take() {
            if handle.join().is_err() {
                error!("Audio thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blindtest_core::{SampleRate, StreamStatus};

    #[test]
    fn fill_pulls_whole_frames_in_scratch_sized_chunks() {
        // Stereo 16-bit, scratch holds 2 frames
        let format = PcmFormat::new(SampleRate::DVD_QUALITY, 16, 2);
        let mut scratch = vec![0u8; 2 * format.bytes_per_frame()];
        let (tx, rx) = bounded(16);

        let mut callback: PullCallback = Box::new(move |bytes: &mut [u8]| {
            let _ = tx.send(bytes.len());
            for pair in bytes.chunks_exact_mut(2) {
                pair.copy_from_slice(&0x4000i16.to_le_bytes());
            }
            StreamStatus::Continue
        });

        // 3 frames: one full chunk then a one-frame chunk
        let mut out = [0.0f32; 6];
        fill_f32(&mut out, &mut scratch, format, &mut callback);
        let pulls: Vec<usize> = rx.try_iter().collect();

        assert_eq!(pulls, vec![8, 4]);
        assert!(out.iter().all(|&s| (s - 0.5).abs() < f32::EPSILON));
    }

    #[test]
    fn fill_converts_8_bit_silence_to_zero() {
        let format = PcmFormat::new(SampleRate::DVD_QUALITY, 8, 1);
        let mut scratch = vec![0u8; 4];
        let mut callback: PullCallback = Box::new(|bytes: &mut [u8]| {
            bytes.fill(0x80);
            StreamStatus::Complete
        });

        let mut out = [1.0f32; 4];
        fill_f32(&mut out, &mut scratch, format, &mut callback);
        assert_eq!(out, [0.0; 4]);
    }
}
