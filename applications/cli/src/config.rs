/// CLI configuration
use crate::error::{CliError, Result};
use blindtest_core::{AudioStreamInfo, QualityFactor, TestType};
use blindtest_session::DEFAULT_BUFFER_MS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file read from the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "blindtest.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CliConfig {
    #[serde(default)]
    pub test: TestSettings,

    #[serde(default)]
    pub playback: PlaybackSettings,

    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub results: ResultsSettings,
}

/// Default quality factors per test
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TestSettings {
    /// HQ sample rate; `None` plays the source rate
    #[serde(default)]
    pub rate_hq: Option<u32>,

    #[serde(default = "default_rate_lq")]
    pub rate_lq: u32,

    #[serde(default = "default_depth_hq")]
    pub depth_hq: u32,

    #[serde(default = "default_depth_lq")]
    pub depth_lq: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaybackSettings {
    /// Device buffer length in milliseconds
    #[serde(default = "default_buffer_ms")]
    pub buffer_ms: u32,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SessionSettings {
    /// Fixed seed for the slot assignment; absent means time-derived
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResultsSettings {
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
}

impl TestSettings {
    /// HQ and LQ factors for `test_type` on a source described by `info`
    pub fn factors(&self, test_type: TestType, info: &AudioStreamInfo) -> (QualityFactor, QualityFactor) {
        match test_type {
            TestType::SamplingRate => (
                QualityFactor(self.rate_hq.unwrap_or(info.sample_rate_hz)),
                QualityFactor(self.rate_lq),
            ),
            TestType::BitDepth => (QualityFactor(self.depth_hq), QualityFactor(self.depth_lq)),
        }
    }
}

impl CliConfig {
    /// Load configuration from file and environment
    ///
    /// `path` must exist when given; otherwise `blindtest.toml` is read if
    /// present. Environment variables prefixed `BLINDTEST_` override the file,
    /// with `__` between section and key (`BLINDTEST_PLAYBACK__BUFFER_MS`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path).required(true));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("BLINDTEST")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.playback.buffer_ms == 0 {
            return Err(CliError::Config(
                "playback.buffer_ms must be greater than zero".to_string(),
            ));
        }

        if let Some(rate_hq) = self.test.rate_hq {
            if rate_hq <= self.test.rate_lq {
                return Err(CliError::Config(format!(
                    "test.rate_hq ({}) must be higher than test.rate_lq ({})",
                    rate_hq, self.test.rate_lq
                )));
            }
        }

        if self.test.depth_hq <= self.test.depth_lq {
            return Err(CliError::Config(format!(
                "test.depth_hq ({}) must be higher than test.depth_lq ({})",
                self.test.depth_hq, self.test.depth_lq
            )));
        }

        Ok(())
    }
}

// Default values
fn default_rate_lq() -> u32 {
    48_000
}

fn default_depth_hq() -> u32 {
    24
}

fn default_depth_lq() -> u32 {
    8
}

fn default_buffer_ms() -> u32 {
    DEFAULT_BUFFER_MS
}

fn default_log_path() -> PathBuf {
    PathBuf::from("blindtest-results.jsonl")
}

impl Default for TestSettings {
    fn default() -> Self {
        Self {
            rate_hq: None,
            rate_lq: default_rate_lq(),
            depth_hq: default_depth_hq(),
            depth_lq: default_depth_lq(),
        }
    }
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            buffer_ms: default_buffer_ms(),
        }
    }
}

impl Default for ResultsSettings {
    fn default() -> Self {
        Self {
            log_path: default_log_path(),
        }
    }
}
