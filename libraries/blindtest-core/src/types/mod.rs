mod audio;
mod trial;

pub use audio::{
    normalize_bit_depth, AudioStreamInfo, PcmBuffer, PcmFormat, SampleRate, SUPPORTED_BIT_DEPTHS,
};
pub use trial::{Outcome, QualityFactor, Rendition, ResultRecord, Slot, TestType};
