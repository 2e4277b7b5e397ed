//! Property-based tests for the format converter
//!
//! These tests use proptest to verify the decimation and requantization
//! invariants across many random buffers.

use blindtest_audio::convert::{requantize, resample};
use blindtest_core::{PcmBuffer, PcmFormat, SampleRate};
use proptest::prelude::*;

// Helper: random buffer of whole frames in the given layout
fn pcm_strategy(bits: u8, channels: u8) -> impl Strategy<Value = Vec<u8>> {
    let frame = usize::from(bits / 8) * usize::from(channels);
    (0usize..400).prop_flat_map(move |frames| prop::collection::vec(any::<u8>(), frames * frame))
}

proptest! {
    /// Property: decimation keeps floor(frames / step) frames, each copied byte-exactly
    #[test]
    fn decimation_keeps_every_step_frame(
        dst_hz in prop::sample::select(vec![8_000u32, 16_000, 24_000, 32_000, 48_000, 96_000]),
        step in 1u32..=8,
        channels in 1u8..=6,
        bits in prop::sample::select(vec![8u8, 16, 24, 32]),
        seed in any::<u64>(),
    ) {
        let src_hz = dst_hz * step;
        let format = PcmFormat::new(SampleRate::new(src_hz), bits, channels);
        let frames = (seed % 500) as usize;
        let bytes: Vec<u8> = (0..frames * format.bytes_per_frame())
            .map(|i| (i as u64).wrapping_mul(seed | 1).to_le_bytes()[0])
            .collect();
        let src = PcmBuffer::from_bytes(bytes, format);

        let dst = resample(&src, SampleRate::new(dst_hz)).unwrap();

        prop_assert_eq!(dst.frames(), frames / step as usize);
        prop_assert_eq!(dst.format().sample_rate.as_hz(), dst_hz);
        for i in 0..dst.frames() {
            prop_assert_eq!(dst.frame(i), src.frame(i * step as usize));
        }
    }

    /// Property: requantizing shrinks the byte length by dst/src width
    #[test]
    fn requantize_length_scales_with_width(
        data in pcm_strategy(24, 2),
        dst_bits in prop::sample::select(vec![8u8, 16, 24]),
    ) {
        let src = PcmBuffer::from_bytes(data, PcmFormat::new(SampleRate::HIGH_RES_96, 24, 2));
        let dst = requantize(&src, dst_bits).unwrap();

        prop_assert_eq!(dst.len(), src.len() * usize::from(dst_bits / 8) / 3);
        prop_assert_eq!(dst.frames(), src.frames());
    }

    /// Property: 8-bit output is the top source byte shifted into unsigned range
    #[test]
    fn requantize_to_8_bit_offsets_top_byte(
        src_bits in prop::sample::select(vec![16u8, 24, 32]),
        seed in prop::collection::vec(any::<u8>(), 0..1200),
    ) {
        let width = usize::from(src_bits / 8);
        let whole = seed.len() / width * width;
        let data = seed[..whole].to_vec();
        let src = PcmBuffer::from_bytes(data, PcmFormat::new(SampleRate::DVD_QUALITY, src_bits, 1));

        let dst = requantize(&src, 8).unwrap();

        prop_assert_eq!(dst.len(), whole / width);
        for (out, sample) in dst.as_bytes().iter().zip(src.as_bytes().chunks_exact(width)) {
            prop_assert_eq!(*out, sample[width - 1].wrapping_add(0x80));
        }
    }

    /// Property: conversions are pure - the same input always yields the same output
    #[test]
    fn conversions_are_deterministic(data in pcm_strategy(24, 2)) {
        let src = PcmBuffer::from_bytes(data, PcmFormat::new(SampleRate::HIGH_RES_192, 24, 2));

        prop_assert_eq!(
            resample(&src, SampleRate::DVD_QUALITY).unwrap(),
            resample(&src, SampleRate::DVD_QUALITY).unwrap()
        );
        prop_assert_eq!(requantize(&src, 8).unwrap(), requantize(&src, 8).unwrap());
    }
}

#[test]
fn scenario_depth_test_lq_is_a_third_of_original() {
    let data: Vec<u8> = (0u8..=255).cycle().take(6 * 1000).collect();
    let original = PcmBuffer::from_bytes(data, PcmFormat::new(SampleRate::DVD_QUALITY, 24, 2));

    let lq = requantize(&original, 8).unwrap();

    assert_eq!(lq.len(), original.len() / 3);
    for (i, byte) in lq.as_bytes().iter().enumerate() {
        assert_eq!(*byte, original.as_bytes()[i * 3 + 2].wrapping_add(0x80));
    }
}
