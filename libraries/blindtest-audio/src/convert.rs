//! PCM format conversion
//!
//! Pure functions that derive one `PcmBuffer` from another. Both quality
//! reductions are deliberately naive so that the degradation the listener
//! hears is exact and repeatable:
//!
//! - `resample` decimates by an integer step with no anti-aliasing filter
//! - `requantize` drops low-order bytes with no dither or rounding

use blindtest_core::{BlindTestError, PcmBuffer, PcmFormat, Result, SampleRate, SUPPORTED_BIT_DEPTHS};

/// Pack full-scale 32-bit samples into `bit_depth` wide little-endian samples
///
/// Keeps the most-significant bytes of each sample (truncation, never
/// rounding). 8-bit output is offset by `0x80` into unsigned form.
pub fn pack_i32_samples(samples: &[i32], bit_depth: u8, out: &mut Vec<u8>) {
    let keep = usize::from(bit_depth / 8).clamp(1, 4);
    out.reserve(samples.len() * keep);

    for sample in samples {
        let bytes = sample.to_le_bytes();
        if keep == 1 {
            out.push(bytes[3].wrapping_add(0x80));
        } else {
            out.extend_from_slice(&bytes[4 - keep..]);
        }
    }
}

/// Keep every `step`-th frame of interleaved bytes
///
/// Output holds `floor(frames / step)` frames; frame `i` is input frame
/// `i * step`, copied byte for byte.
pub fn decimate(src: &[u8], bytes_per_frame: usize, step: usize) -> Vec<u8> {
    if bytes_per_frame == 0 || step == 0 {
        return Vec::new();
    }

    let out_frames = src.len() / bytes_per_frame / step;
    let mut out = Vec::with_capacity(out_frames * bytes_per_frame);

    for frame in src
        .chunks_exact(bytes_per_frame)
        .step_by(step)
        .take(out_frames)
    {
        out.extend_from_slice(frame);
    }

    out
}

/// Down-sample `src` to `dst_rate` by integer decimation
///
/// # Errors
/// `UnsupportedConversion` unless `dst_rate` divides the source rate evenly
/// and is not higher than it
pub fn resample(src: &PcmBuffer, dst_rate: SampleRate) -> Result<PcmBuffer> {
    let format = src.format();
    let src_hz = format.sample_rate.as_hz();
    let dst_hz = dst_rate.as_hz();

    if dst_hz == 0 || dst_hz > src_hz || src_hz % dst_hz != 0 {
        return Err(BlindTestError::unsupported(format!(
            "cannot decimate {} Hz to {} Hz by an integer step",
            src_hz, dst_hz
        )));
    }

    let step = (src_hz / dst_hz) as usize;
    let data = decimate(src.as_bytes(), format.bytes_per_frame(), step);

    Ok(PcmBuffer::from_bytes(
        data,
        PcmFormat::new(dst_rate, format.bit_depth, format.channels),
    ))
}

/// Reduce interleaved samples from `src_bits` to `dst_bits`
///
/// Each `src_bits/8`-byte sample keeps its `dst_bits/8` most-significant
/// bytes. A signed source reduced to 8 bits is offset by `0x80`.
pub fn requantize_bytes(src: &[u8], src_bits: u8, dst_bits: u8) -> Vec<u8> {
    let src_width = usize::from(src_bits / 8);
    let dst_width = usize::from(dst_bits / 8);

    if src_width == 0 || dst_width == 0 || dst_width > src_width {
        return Vec::new();
    }
    if src_width == dst_width {
        return src.to_vec();
    }

    let mut out = Vec::with_capacity(src.len() / src_width * dst_width);
    for sample in src.chunks_exact(src_width) {
        let high = &sample[src_width - dst_width..];
        if dst_width == 1 {
            out.push(high[0].wrapping_add(0x80));
        } else {
            out.extend_from_slice(high);
        }
    }

    out
}

/// Reduce the bit depth of `src` to `dst_bits`
///
/// # Errors
/// `UnsupportedConversion` if `dst_bits` is not a supported depth or is wider
/// than the source
pub fn requantize(src: &PcmBuffer, dst_bits: u8) -> Result<PcmBuffer> {
    let format = src.format();

    if !SUPPORTED_BIT_DEPTHS.contains(&dst_bits) || !SUPPORTED_BIT_DEPTHS.contains(&format.bit_depth) {
        return Err(BlindTestError::unsupported(format!(
            "bit depths must be one of {:?} (got {} -> {})",
            SUPPORTED_BIT_DEPTHS, format.bit_depth, dst_bits
        )));
    }
    if dst_bits > format.bit_depth {
        return Err(BlindTestError::unsupported(format!(
            "cannot widen {}-bit samples to {} bits",
            format.bit_depth, dst_bits
        )));
    }

    let data = requantize_bytes(src.as_bytes(), format.bit_depth, dst_bits);

    Ok(PcmBuffer::from_bytes(
        data,
        PcmFormat::new(format.sample_rate, dst_bits, format.channels),
    ))
}

/// Decode one packed sample to `f32` in `[-1.0, 1.0)`
///
/// Uses symmetric scaling (divide by 2^(N-1)).
#[inline]
pub fn sample_to_f32(sample: &[u8]) -> f32 {
    match sample.len() {
        1 => (f32::from(sample[0]) - 128.0) / 128.0,
        n @ 2..=4 => {
            let mut word = [0u8; 4];
            word[4 - n..].copy_from_slice(sample);
            i32::from_le_bytes(word) as f32 / 2_147_483_648.0
        }
        _ => 0.0,
    }
}

/// Convert packed samples into an `f32` slice
///
/// Writes `min(out.len(), src.len() / width)` samples and returns the count.
/// Does not allocate, so it is safe to call from an audio callback.
pub fn bytes_to_f32(src: &[u8], bit_depth: u8, out: &mut [f32]) -> usize {
    let width = usize::from(bit_depth / 8);
    if width == 0 {
        return 0;
    }

    let mut written = 0;
    for (dst, sample) in out.iter_mut().zip(src.chunks_exact(width)) {
        *dst = sample_to_f32(sample);
        written += 1;
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(bytes: Vec<u8>, rate: u32, bits: u8, channels: u8) -> PcmBuffer {
        PcmBuffer::from_bytes(bytes, PcmFormat::new(SampleRate::new(rate), bits, channels))
    }

    #[test]
    fn pack_keeps_three_most_significant_bytes() {
        let mut out = Vec::new();
        pack_i32_samples(&[0x1234_5678, -1], 24, &mut out);
        assert_eq!(out, vec![0x56, 0x34, 0x12, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn pack_to_8_bit_is_unsigned() {
        let mut out = Vec::new();
        pack_i32_samples(&[0, i32::MIN, i32::MAX], 8, &mut out);
        assert_eq!(out, vec![0x80, 0x00, 0xFF]);
    }

    #[test]
    fn decimate_192k_to_48k_keeps_every_fourth_frame() {
        // Mono 16-bit, frames numbered 0..10
        let src: Vec<u8> = (0u8..10).flat_map(|i| [i, 0]).collect();
        let out = resample(&buffer(src, 192_000, 16, 1), SampleRate::new(48_000)).unwrap();

        assert_eq!(out.frames(), 2);
        assert_eq!(out.as_bytes(), &[0, 0, 4, 0]);
        assert_eq!(out.format().sample_rate.as_hz(), 48_000);
    }

    #[test]
    fn decimate_copies_all_channels() {
        // Stereo 24-bit, 4 frames with distinct bytes
        let src: Vec<u8> = (0u8..24).collect();
        let out = resample(&buffer(src, 96_000, 24, 2), SampleRate::new(48_000)).unwrap();
        assert_eq!(out.as_bytes(), &[0, 1, 2, 3, 4, 5, 12, 13, 14, 15, 16, 17]);
    }

    #[test]
    fn resample_to_same_rate_is_identity() {
        let src = buffer(vec![1, 2, 3, 4, 5, 6], 96_000, 24, 2);
        let out = resample(&src, SampleRate::new(96_000)).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn resample_rejects_non_integer_ratio() {
        let src = buffer(vec![0; 60], 96_000, 24, 2);
        assert!(matches!(
            resample(&src, SampleRate::CD_QUALITY),
            Err(BlindTestError::UnsupportedConversion(_))
        ));
        assert!(resample(&src, SampleRate::new(0)).is_err());
        assert!(resample(&src, SampleRate::HIGH_RES_192).is_err());
    }

    #[test]
    fn requantize_24_to_8_takes_top_byte_plus_offset() {
        let src = buffer(vec![0x11, 0x22, 0x7F, 0xAA, 0xBB, 0x80], 48_000, 24, 2);
        let out = requantize(&src, 8).unwrap();
        assert_eq!(out.as_bytes(), &[0xFF, 0x00]);
        assert_eq!(out.format().bit_depth, 8);
    }

    #[test]
    fn requantize_24_to_16_drops_low_byte() {
        let src = buffer(vec![0x11, 0x22, 0x33, 0x44, 0x55, 0x66], 48_000, 24, 1);
        let out = requantize(&src, 16).unwrap();
        assert_eq!(out.as_bytes(), &[0x22, 0x33, 0x55, 0x66]);
    }

    #[test]
    fn requantize_rejects_widening_and_odd_widths() {
        let src = buffer(vec![0; 12], 48_000, 16, 2);
        assert!(requantize(&src, 24).is_err());
        assert!(requantize(&src, 12).is_err());
    }

    #[test]
    fn requantize_same_depth_is_identity() {
        let src = buffer(vec![9, 8, 7, 6, 5, 4], 48_000, 24, 2);
        assert_eq!(requantize(&src, 24).unwrap(), src);
    }

    #[test]
    fn float_conversion_is_symmetric() {
        assert_eq!(sample_to_f32(&[0x80]), 0.0);
        assert_eq!(sample_to_f32(&[0x00]), -1.0);
        assert_eq!(sample_to_f32(&[0x00, 0x80]), -1.0);
        assert_eq!(sample_to_f32(&[0x00, 0x00, 0x40]), 0.5);

        let mut out = [1.0f32; 3];
        let written = bytes_to_f32(&[0x00, 0x00, 0x00, 0x00], 16, &mut out);
        assert_eq!(written, 2);
        assert_eq!(out, [0.0, 0.0, 1.0]);
    }
}
