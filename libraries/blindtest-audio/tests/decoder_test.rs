/// Integration tests for the Symphonia decoder adapter
///
/// Fixtures are synthesised with hound so the expected packed bytes are
/// known exactly.
use blindtest_audio::{convert, SymphoniaDecoder};
use blindtest_core::{AudioDecoder, BlindTestError, SampleRate, StreamSelector};
use std::path::{Path, PathBuf};

/// Write an integer PCM WAV whose samples are produced by `sample_at(frame, channel)`
fn write_wav(
    path: &Path,
    sample_rate: u32,
    bits: u16,
    channels: u16,
    frames: u32,
    sample_at: impl Fn(u32, u16) -> i32,
) {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: bits,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
    for frame in 0..frames {
        for ch in 0..channels {
            let value = sample_at(frame, ch);
            match bits {
                8 => writer.write_sample(value as i8).unwrap(),
                16 => writer.write_sample(value as i16).unwrap(),
                _ => writer.write_sample(value).unwrap(),
            }
        }
    }
    writer.finalize().unwrap();
}

/// Deterministic 24-bit ramp that exercises all three bytes
fn ramp_24(frame: u32, ch: u16) -> i32 {
    let raw = (frame.wrapping_mul(40_503) + u32::from(ch) * 7_919) & 0x00FF_FFFF;
    // sign-extend the 24-bit value
    ((raw << 8) as i32) >> 8
}

fn temp_wav(dir: &tempfile::TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}

#[test]
fn probe_reports_hi_res_stream_info() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_wav(&dir, "hires.wav");
    write_wav(&path, 192_000, 24, 2, 1_000, ramp_24);

    let info = SymphoniaDecoder::new().probe(&path).unwrap();
    assert_eq!(info.sample_rate_hz, 192_000);
    assert_eq!(info.bit_depth, 24);
    assert_eq!(info.channel_count, 2);
    assert!(info.supports_rate_test());
    assert!(info.supports_depth_test());
}

#[test]
fn probe_16_bit_source_offers_no_tests() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_wav(&dir, "cd.wav");
    write_wav(&path, 44_100, 16, 2, 100, |f, _| (f as i32) * 3);

    let info = SymphoniaDecoder::new().probe(&path).unwrap();
    assert_eq!(info.bit_depth, 16);
    assert!(!info.supports_rate_test());
    assert!(!info.supports_depth_test());
}

#[test]
fn decode_24_bit_is_byte_exact() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_wav(&dir, "exact24.wav");
    let frames = 2_500;
    write_wav(&path, 96_000, 24, 2, frames, ramp_24);

    let mut decoder = SymphoniaDecoder::new();
    let buffer = decoder.decode(&path, StreamSelector::FirstAudio).unwrap();

    assert_eq!(buffer.format().bit_depth, 24);
    assert_eq!(buffer.format().channels, 2);
    assert_eq!(buffer.frames(), frames as usize);

    let expected: Vec<u8> = (0..frames)
        .flat_map(|f| (0..2u16).map(move |ch| ramp_24(f, ch)))
        .flat_map(|s| {
            let b = s.to_le_bytes();
            [b[0], b[1], b[2]]
        })
        .collect();
    assert_eq!(buffer.as_bytes(), expected.as_slice());
    assert!(!decoder.is_open(), "decode closes the stream");
}

#[test]
fn decode_16_bit_keeps_native_layout() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_wav(&dir, "pcm16.wav");
    write_wav(&path, 48_000, 16, 1, 64, |f, _| (f as i32 - 32) * 1000);

    let buffer = SymphoniaDecoder::new()
        .decode(&path, StreamSelector::FirstAudio)
        .unwrap();

    let expected: Vec<u8> = (0..64)
        .flat_map(|f| ((f - 32) as i16 * 1000).to_le_bytes())
        .collect();
    assert_eq!(buffer.as_bytes(), expected.as_slice());
}

#[test]
fn decode_8_bit_is_unsigned() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_wav(&dir, "pcm8.wav");
    write_wav(&path, 8_000, 8, 1, 4, |f, _| [-128, -1, 0, 127][f as usize]);

    let buffer = SymphoniaDecoder::new()
        .decode(&path, StreamSelector::FirstAudio)
        .unwrap();
    assert_eq!(buffer.as_bytes(), &[0x00, 0x7F, 0x80, 0xFF]);
}

#[test]
fn streaming_chunks_match_whole_file_decode() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_wav(&dir, "chunks.wav");
    write_wav(&path, 96_000, 24, 2, 20_000, ramp_24);

    let whole = SymphoniaDecoder::new()
        .decode(&path, StreamSelector::FirstAudio)
        .unwrap();

    let mut decoder = SymphoniaDecoder::new();
    let info = decoder.open(&path, StreamSelector::FirstAudio).unwrap();
    assert_eq!(info.sample_rate_hz, 96_000);

    let mut joined = Vec::new();
    let mut chunks = 0;
    while let Some(chunk) = decoder.decode_next().unwrap() {
        joined.extend_from_slice(&chunk);
        chunks += 1;
    }
    decoder.close();

    assert!(chunks > 1, "a 20k frame file should arrive in several packets");
    assert_eq!(joined, whole.as_bytes());
}

#[test]
fn decimation_of_decoded_file_matches_source_frames() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_wav(&dir, "decimate.wav");
    let frames = 1_003;
    write_wav(&path, 192_000, 24, 2, frames, ramp_24);

    let original = SymphoniaDecoder::new()
        .decode(&path, StreamSelector::FirstAudio)
        .unwrap();
    let lq = convert::resample(&original, SampleRate::DVD_QUALITY).unwrap();

    assert_eq!(lq.frames(), (frames / 4) as usize);
    for i in 0..lq.frames() {
        assert_eq!(lq.frame(i), original.frame(i * 4));
    }
}

#[test]
fn garbage_file_is_open_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("not_audio.wav");
    std::fs::write(&path, b"this is not a riff header at all").unwrap();

    let result = SymphoniaDecoder::new().probe(&path);
    assert!(matches!(result, Err(BlindTestError::OpenFailed { .. })));
}

#[test]
fn missing_track_id_is_no_audio_stream() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_wav(&dir, "one_track.wav");
    write_wav(&path, 48_000, 24, 2, 10, ramp_24);

    let mut decoder = SymphoniaDecoder::new();
    let result = decoder.open(&path, StreamSelector::Track(99));
    assert!(matches!(result, Err(BlindTestError::NoAudioStream(_))));
    assert!(!decoder.is_open());
}

#[test]
fn open_reports_stream_layout_and_replaces_previous_stream() {
    let dir = tempfile::tempdir().unwrap();
    let stereo = temp_wav(&dir, "stereo.wav");
    let mono = temp_wav(&dir, "mono.wav");
    write_wav(&stereo, 96_000, 24, 2, 500, ramp_24);
    write_wav(&mono, 44_100, 16, 1, 500, |f, _| f as i32);

    let mut decoder = SymphoniaDecoder::new();
    let info = decoder.open(&stereo, StreamSelector::FirstAudio).unwrap();
    assert_eq!(
        (info.sample_rate_hz, info.bit_depth, info.channel_count),
        (96_000, 24, 2)
    );
    assert!(decoder.is_open());

    let info = decoder.open(&mono, StreamSelector::FirstAudio).unwrap();
    assert_eq!(
        (info.sample_rate_hz, info.bit_depth, info.channel_count),
        (44_100, 16, 1)
    );
    let first = decoder.decode_next().unwrap().unwrap();
    assert_eq!(&first[..4], &[0, 0, 1, 0]);

    decoder.close();
    assert!(!decoder.is_open());
}

#[test]
fn open_missing_file_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.wav");

    let mut decoder = SymphoniaDecoder::new();
    match decoder.open(&path, StreamSelector::FirstAudio) {
        Err(BlindTestError::OpenFailed { path: reported, .. }) => {
            assert!(reported.ends_with("absent.wav"));
        }
        other => panic!("expected OpenFailed, got {:?}", other.map(|_| ())),
    }
    assert!(!decoder.is_open());
}
