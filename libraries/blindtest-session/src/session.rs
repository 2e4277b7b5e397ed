//! Test session - one source file, one blind trial
//!
//! Owns the decoded original, the HQ/LQ renditions derived from it, and the
//! coin flip that hides which slot holds which rendition.

use crate::cancel::CancelToken;
use blindtest_audio::convert;
use blindtest_core::{
    AudioDecoder, AudioStreamInfo, BlindTestError, PcmBuffer, QualityFactor, Rendition, Result,
    ResultRecord, SampleRate, Slot, StreamSelector, TestType, SUPPORTED_BIT_DEPTHS,
};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Test parameters chosen by the listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestConfig {
    /// Which quality parameter differs between HQ and LQ
    pub test_type: TestType,

    /// Target factor of the HQ rendition
    pub hq_factor: QualityFactor,

    /// Target factor of the LQ rendition
    pub lq_factor: QualityFactor,
}

/// State for one blind test against one source file
///
/// Lifecycle: `open` a file, optionally `read` it, `configure` the test,
/// `materialize` the renditions, play slots through a `PlaybackEngine`, then
/// `judge` the listener's answer. Every operation that fails leaves the
/// session exactly as it was before the call.
///
/// The session is `Send`, so a controller may move it to a worker thread for
/// `materialize_with` and take it back afterwards.
pub struct TestSession {
    decoder: Box<dyn AudioDecoder>,
    rng: Box<dyn RngCore + Send>,

    path: Option<PathBuf>,
    info: Option<AudioStreamInfo>,
    original: Option<Arc<PcmBuffer>>,
    config: Option<TestConfig>,

    /// Converted buffers keyed by the factor they were rendered at
    renditions: HashMap<(TestType, QualityFactor), Arc<PcmBuffer>>,
    hq: Option<Arc<PcmBuffer>>,
    lq: Option<Arc<PcmBuffer>>,

    /// Drawn once at the first successful materialize, then frozen
    first_slot_is_hq: Option<bool>,
}

impl TestSession {
    /// Create a session seeded from the system clock
    pub fn new(decoder: Box<dyn AudioDecoder>) -> Self {
        Self::with_seed(decoder, time_seed())
    }

    /// Create a session with a reproducible coin flip
    pub fn with_seed(decoder: Box<dyn AudioDecoder>, seed: u64) -> Self {
        Self::with_rng(decoder, Box::new(StdRng::seed_from_u64(seed)))
    }

    /// Create a session drawing its coin flip from `rng`
    pub fn with_rng(decoder: Box<dyn AudioDecoder>, rng: Box<dyn RngCore + Send>) -> Self {
        Self {
            decoder,
            rng,
            path: None,
            info: None,
            original: None,
            config: None,
            renditions: HashMap::new(),
            hq: None,
            lq: None,
            first_slot_is_hq: None,
        }
    }

    // ===== Source =====

    /// Probe `path` and make it the session's source
    ///
    /// Starts a fresh trial: buffers, configuration and the slot assignment
    /// of any previous file are discarded.
    ///
    /// # Errors
    /// `OpenFailed` or `NoAudioStream` from the decoder
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let info = self.decoder.probe(path)?;

        info!(
            "Opened {}: {} Hz, {} bit, {} ch",
            path.display(),
            info.sample_rate_hz,
            info.bit_depth,
            info.channel_count
        );

        self.path = Some(path.to_path_buf());
        self.info = Some(info);
        self.original = None;
        self.config = None;
        self.renditions.clear();
        self.hq = None;
        self.lq = None;
        self.first_slot_is_hq = None;
        Ok(())
    }

    /// Decode the whole source into memory
    ///
    /// A no-op when the original is already decoded.
    pub fn read(&mut self) -> Result<()> {
        self.read_with(&CancelToken::new())
    }

    /// Decode the whole source, checking `cancel` between chunks
    pub fn read_with(&mut self, cancel: &CancelToken) -> Result<()> {
        if self.original.is_none() {
            let original = self.decode_source(cancel)?;
            self.original = Some(Arc::new(original));
        }
        Ok(())
    }

    fn decode_source(&mut self, cancel: &CancelToken) -> Result<PcmBuffer> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| BlindTestError::not_ready("no file opened"))?;

        let info = self.decoder.open(&path, StreamSelector::FirstAudio)?;
        let mut buffer = PcmBuffer::new(info.format());

        let outcome = loop {
            if cancel.is_cancelled() {
                break Err(BlindTestError::Cancelled);
            }
            match self.decoder.decode_next() {
                Ok(Some(chunk)) => buffer.append(&chunk),
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.decoder.close();
        outcome?;

        debug!(
            "Decoded {}: {} frames ({} ms)",
            path.display(),
            buffer.frames(),
            buffer.duration_ms()
        );
        Ok(buffer)
    }

    // ===== Configuration =====

    /// Choose the test and its two quality factors
    ///
    /// Validation only; no conversion happens until `materialize`. Changing
    /// the configuration drops the current HQ/LQ pair but keeps the slot
    /// assignment.
    ///
    /// # Errors
    /// - `InvertedFactors` unless `hq_factor > lq_factor`
    /// - `NotReady` if no file is open
    /// - `TestUnavailable` if the source is not eligible for `test_type`
    /// - `UnsupportedConversion` if a factor cannot be derived from the source
    pub fn configure(
        &mut self,
        test_type: TestType,
        hq_factor: QualityFactor,
        lq_factor: QualityFactor,
    ) -> Result<()> {
        if hq_factor <= lq_factor {
            return Err(BlindTestError::InvertedFactors {
                hq: hq_factor,
                lq: lq_factor,
            });
        }

        let info = self
            .info
            .ok_or_else(|| BlindTestError::not_ready("no file opened"))?;

        let available = match test_type {
            TestType::SamplingRate => info.supports_rate_test(),
            TestType::BitDepth => info.supports_depth_test(),
        };
        if !available {
            return Err(BlindTestError::TestUnavailable(test_type));
        }

        check_factor(&info, test_type, hq_factor)?;
        check_factor(&info, test_type, lq_factor)?;

        let config = TestConfig {
            test_type,
            hq_factor,
            lq_factor,
        };
        if self.config != Some(config) {
            self.hq = None;
            self.lq = None;
        }
        self.config = Some(config);

        info!(
            "Configured {} test: HQ {} {unit}, LQ {} {unit}",
            test_type,
            hq_factor,
            lq_factor,
            unit = test_type.unit()
        );
        Ok(())
    }

    // ===== Materialization =====

    /// Decode (if needed) and derive the HQ/LQ pair
    ///
    /// The first success draws the slot assignment; later calls reuse it.
    pub fn materialize(&mut self) -> Result<()> {
        self.materialize_with(&CancelToken::new())
    }

    /// `materialize`, checking `cancel` between decode chunks and conversions
    ///
    /// # Errors
    /// `NotReady` before `configure`, `Cancelled`, or any decode/conversion
    /// error. Nothing is committed unless both renditions are produced.
    pub fn materialize_with(&mut self, cancel: &CancelToken) -> Result<()> {
        let config = self
            .config
            .ok_or_else(|| BlindTestError::not_ready("test is not configured"))?;

        let original = match &self.original {
            Some(original) => Arc::clone(original),
            None => Arc::new(self.decode_source(cancel)?),
        };

        let hq = self.render(&original, config.test_type, config.hq_factor, cancel)?;
        let lq = self.render(&original, config.test_type, config.lq_factor, cancel)?;

        self.renditions
            .insert((config.test_type, config.hq_factor), Arc::clone(&hq));
        self.renditions
            .insert((config.test_type, config.lq_factor), Arc::clone(&lq));
        self.original = Some(original);
        self.hq = Some(hq);
        self.lq = Some(lq);

        let rng = &mut self.rng;
        let first_slot_is_hq = *self.first_slot_is_hq.get_or_insert_with(|| rng.gen_bool(0.5));

        // The assignment stays out of info-level logs so the listener stays blind
        debug!(
            "Materialized; first slot holds {:?}",
            Rendition::for_slot(Slot::First, first_slot_is_hq)
        );
        info!(
            "Test ready: {} {} vs {}",
            config.test_type, config.hq_factor, config.lq_factor
        );
        Ok(())
    }

    /// Look up or compute the buffer for one factor
    fn render(
        &self,
        original: &Arc<PcmBuffer>,
        test_type: TestType,
        factor: QualityFactor,
        cancel: &CancelToken,
    ) -> Result<Arc<PcmBuffer>> {
        if let Some(cached) = self.renditions.get(&(test_type, factor)) {
            return Ok(Arc::clone(cached));
        }
        if cancel.is_cancelled() {
            return Err(BlindTestError::Cancelled);
        }

        let format = original.format();
        let buffer = match test_type {
            TestType::SamplingRate if factor.value() == format.sample_rate.as_hz() => {
                return Ok(Arc::clone(original));
            }
            TestType::BitDepth if factor.value() == u32::from(format.bit_depth) => {
                return Ok(Arc::clone(original));
            }
            TestType::SamplingRate => convert::resample(original, SampleRate::new(factor.value()))?,
            TestType::BitDepth => convert::requantize(original, depth_of(factor)?)?,
        };

        debug!(
            "Rendered {} {}: {} frames",
            test_type,
            factor,
            buffer.frames()
        );
        Ok(Arc::new(buffer))
    }

    // ===== Judgement =====

    /// Whether the listener picked the HQ slot
    ///
    /// `picked_first` is true when the listener chose slot 1 as better.
    ///
    /// # Errors
    /// `NotReady` before the slot assignment is drawn
    pub fn judge(&self, picked_first: bool) -> Result<bool> {
        let first_slot_is_hq = self
            .first_slot_is_hq
            .ok_or_else(|| BlindTestError::not_ready("slots have not been assigned"))?;
        Ok(picked_first == first_slot_is_hq)
    }

    /// Build the log row for the listener's answer
    pub fn result_record(&self, chosen: Slot, memo: impl Into<String>) -> Result<ResultRecord> {
        let config = self
            .config
            .ok_or_else(|| BlindTestError::not_ready("test is not configured"))?;
        let better_slot = self
            .better_slot()
            .ok_or_else(|| BlindTestError::not_ready("slots have not been assigned"))?;

        let filename = self
            .path
            .as_deref()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(ResultRecord {
            filename,
            test_type: config.test_type,
            hq_factor: config.hq_factor,
            lq_factor: config.lq_factor,
            better_slot,
            chosen_slot: chosen,
            memo: memo.into(),
        })
    }

    // ===== Queries =====

    /// True iff a sampling rate test is configured
    pub fn is_rate_test(&self) -> bool {
        self.config
            .is_some_and(|c| c.test_type == TestType::SamplingRate)
    }

    /// Whether the open source is eligible for a sampling rate test
    pub fn supports_rate_test(&self) -> bool {
        self.info.is_some_and(|i| i.supports_rate_test())
    }

    /// Whether the open source is eligible for a bit depth test
    pub fn supports_depth_test(&self) -> bool {
        self.info.is_some_and(|i| i.supports_depth_test())
    }

    /// Probed stream metadata
    pub fn info(&self) -> Option<AudioStreamInfo> {
        self.info
    }

    /// Path of the open source
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Current test configuration
    pub fn config(&self) -> Option<TestConfig> {
        self.config
    }

    /// The decoded source, once read
    pub fn original(&self) -> Option<Arc<PcmBuffer>> {
        self.original.clone()
    }

    /// Slot holding the HQ rendition, once assigned
    pub fn better_slot(&self) -> Option<Slot> {
        self.first_slot_is_hq.map(Slot::from_first)
    }

    /// Which rendition plays in `slot`, once assigned
    pub fn rendition_for(&self, slot: Slot) -> Option<Rendition> {
        self.first_slot_is_hq
            .map(|first| Rendition::for_slot(slot, first))
    }

    /// Buffer of one rendition
    pub fn buffer(&self, rendition: Rendition) -> Option<Arc<PcmBuffer>> {
        match rendition {
            Rendition::Hq => self.hq.clone(),
            Rendition::Lq => self.lq.clone(),
        }
    }

    /// Buffer playing in `slot`
    pub fn buffer_for(&self, slot: Slot) -> Option<Arc<PcmBuffer>> {
        self.rendition_for(slot).and_then(|r| self.buffer(r))
    }

    /// Both renditions exist and the slots are assigned
    pub fn is_ready(&self) -> bool {
        self.hq.is_some() && self.lq.is_some() && self.first_slot_is_hq.is_some()
    }
}

/// Reject factors the converter cannot derive from this source
fn check_factor(info: &AudioStreamInfo, test_type: TestType, factor: QualityFactor) -> Result<()> {
    match test_type {
        TestType::SamplingRate => {
            let src = info.sample_rate_hz;
            let hz = factor.value();
            if hz == 0 || hz > src || src % hz != 0 {
                return Err(BlindTestError::unsupported(format!(
                    "{} Hz is not an integer divisor of the {} Hz source",
                    hz, src
                )));
            }
        }
        TestType::BitDepth => {
            let bits = depth_of(factor)?;
            if bits > info.bit_depth {
                return Err(BlindTestError::unsupported(format!(
                    "{}-bit is wider than the {}-bit source",
                    bits, info.bit_depth
                )));
            }
        }
    }
    Ok(())
}

fn depth_of(factor: QualityFactor) -> Result<u8> {
    u8::try_from(factor.value())
        .ok()
        .filter(|bits| SUPPORTED_BIT_DEPTHS.contains(bits))
        .ok_or_else(|| {
            BlindTestError::unsupported(format!(
                "bit depth must be one of {:?}, got {}",
                SUPPORTED_BIT_DEPTHS, factor
            ))
        })
}

fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}
