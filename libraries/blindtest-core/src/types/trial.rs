/// Listening test types
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which quality parameter a test degrades
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestType {
    /// HQ/LQ differ in sample rate (decimation)
    SamplingRate,

    /// HQ/LQ differ in bit depth (requantization)
    BitDepth,
}

impl TestType {
    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::SamplingRate => "Sampling Rate",
            Self::BitDepth => "Bit Depth",
        }
    }

    /// Unit of the quality factor for this test
    pub fn unit(&self) -> &'static str {
        match self {
            Self::SamplingRate => "Hz",
            Self::BitDepth => "bits",
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for TestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rate" | "sampling_rate" | "samplingrate" | "sample_rate" => Ok(Self::SamplingRate),
            "depth" | "bit_depth" | "bitdepth" => Ok(Self::BitDepth),
            other => Err(format!("unknown test type: {other}")),
        }
    }
}

/// Target parameter of a conversion
///
/// A sample rate in Hz for a sampling rate test, or a bit depth for a bit
/// depth test. Larger always means higher quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QualityFactor(pub u32);

impl QualityFactor {
    /// Create a new quality factor
    #[must_use]
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// Raw value
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for QualityFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Playback position offered to the listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    First,
    Second,
}

impl Slot {
    /// Map the listener's "picked first" answer to a slot
    pub fn from_first(first: bool) -> Self {
        if first {
            Self::First
        } else {
            Self::Second
        }
    }

    /// Whether this is the first slot
    pub fn is_first(&self) -> bool {
        matches!(self, Self::First)
    }

    /// The other slot
    #[must_use]
    pub fn other(&self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => f.pad("1"),
            Self::Second => f.pad("2"),
        }
    }
}

/// Which quality variant a buffer holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rendition {
    Hq,
    Lq,
}

impl Rendition {
    /// Resolve a slot given the session's coin flip
    pub fn for_slot(slot: Slot, first_slot_is_hq: bool) -> Self {
        if slot.is_first() == first_slot_is_hq {
            Self::Hq
        } else {
            Self::Lq
        }
    }
}

/// Pass/fail of one listening trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Pass,
    Fail,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => f.pad("Pass"),
            Self::Fail => f.pad("Fail"),
        }
    }
}

/// One row of the result log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// File name (without directories)
    pub filename: String,

    /// Test that was run
    pub test_type: TestType,

    /// HQ factor
    pub hq_factor: QualityFactor,

    /// LQ factor
    pub lq_factor: QualityFactor,

    /// Slot that objectively held the HQ rendition
    pub better_slot: Slot,

    /// Slot the listener chose as higher quality
    pub chosen_slot: Slot,

    /// Free-text note
    #[serde(default)]
    pub memo: String,
}

impl ResultRecord {
    /// Whether the listener identified the HQ rendition
    pub fn is_correct(&self) -> bool {
        self.better_slot == self.chosen_slot
    }

    /// Pass/fail for display
    pub fn outcome(&self) -> Outcome {
        if self.is_correct() {
            Outcome::Pass
        } else {
            Outcome::Fail
        }
    }
}
