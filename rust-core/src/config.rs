//! Engine configuration
//!
//! Plain struct with serde support so it can live in a TOML file. Missing
//! keys fall back to the defaults, and [`EngineConfig::validate`] rejects
//! anything the engine cannot run with before a single buffer is allocated.

use crate::audio::DownmixPolicy;
use crate::bands::{BandAggregation, BandCurve, MagnitudeScale};
use crate::error::ConfigError;
use crate::spectrum::WindowType;
use crate::FREQ_BANDS;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Smallest supported frame length
pub const MIN_FRAME_LENGTH: usize = 32;

/// Largest supported frame length
pub const MAX_FRAME_LENGTH: usize = 65536;

/// Full engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample rate of the inbound stream in Hz
    pub sample_rate: f32,

    /// FFT frame length in samples (power of two)
    pub frame_length: usize,

    /// Number of output bands
    pub band_count: usize,

    /// Frequency-to-band curve
    pub curve: BandCurve,

    /// Lowest frequency covered by the bands
    pub min_frequency_hz: f32,

    /// Highest frequency covered by the bands. Bands above Nyquist stay at 0.
    pub max_frequency_hz: f32,

    /// Window applied before the FFT
    pub window: WindowType,

    /// How a band's bins are combined
    pub aggregation: BandAggregation,

    /// Output scale
    pub scale: MagnitudeScale,

    /// Level that maps to 0.0 in decibel scale
    pub db_floor: f32,

    /// Linear gain applied before scaling
    pub gain: f32,

    /// Smoothing coefficient when a band rises, in (0, 1]
    pub attack: f32,

    /// Smoothing coefficient when a band falls, in (0, 1]
    pub release: f32,

    /// Channel count of the inbound stream
    pub channels: usize,

    /// How channels are folded to mono
    pub downmix: DownmixPolicy,

    /// Ring buffer capacity in mono samples
    pub ring_capacity: usize,

    /// Processing period of the background worker
    pub update_interval_ms: u64,

    /// Skip cycles that would re-analyse an unchanged frame
    pub skip_repeated_frames: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            frame_length: 4096,
            band_count: FREQ_BANDS,
            curve: BandCurve::Logarithmic,
            min_frequency_hz: 20.0,
            max_frequency_hz: 20000.0,
            window: WindowType::Hann,
            aggregation: BandAggregation::Mean,
            scale: MagnitudeScale::Decibel,
            db_floor: -80.0,
            gain: 1.0,
            attack: 0.85,
            release: 0.12,
            channels: 1,
            downmix: DownmixPolicy::Average,
            ring_capacity: 16384,
            update_interval_ms: 16,
            skip_repeated_frames: false,
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check every option, failing on the first invalid one
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.frame_length.is_power_of_two() {
            return Err(ConfigError::FrameLengthNotPowerOfTwo(self.frame_length));
        }
        if !(MIN_FRAME_LENGTH..=MAX_FRAME_LENGTH).contains(&self.frame_length) {
            return Err(ConfigError::FrameLengthOutOfRange {
                actual: self.frame_length,
                min: MIN_FRAME_LENGTH,
                max: MAX_FRAME_LENGTH,
            });
        }
        if self.frame_length > self.ring_capacity {
            return Err(ConfigError::RingTooSmall {
                frame_length: self.frame_length,
                ring_capacity: self.ring_capacity,
            });
        }
        if self.band_count == 0 {
            return Err(ConfigError::ZeroBandCount);
        }
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(ConfigError::InvalidSampleRate(self.sample_rate));
        }
        if self.channels == 0 {
            return Err(ConfigError::ZeroChannels);
        }

        let (min_hz, max_hz) = (self.min_frequency_hz, self.max_frequency_hz);
        if !min_hz.is_finite() || !max_hz.is_finite() || min_hz < 0.0 || max_hz <= min_hz {
            return Err(ConfigError::InvalidFrequencyRange { min_hz, max_hz });
        }
        if self.curve == BandCurve::Logarithmic && min_hz <= 0.0 {
            return Err(ConfigError::LogCurveFromZero);
        }

        check_coefficient("attack", self.attack)?;
        check_coefficient("release", self.release)?;

        if !self.db_floor.is_finite() || self.db_floor >= 0.0 {
            return Err(ConfigError::InvalidDbFloor(self.db_floor));
        }
        if !self.gain.is_finite() || self.gain <= 0.0 {
            return Err(ConfigError::InvalidGain(self.gain));
        }
        if self.update_interval_ms == 0 {
            return Err(ConfigError::ZeroUpdateInterval);
        }

        Ok(())
    }

    /// Check that `next` keeps the inbound layout of `self`
    ///
    /// Ring capacity, channel count and downmix policy belong to the sample
    /// writer handed out at construction and cannot change afterwards.
    pub fn check_same_input(&self, next: &EngineConfig) -> Result<(), ConfigError> {
        if self.ring_capacity != next.ring_capacity {
            return Err(ConfigError::InputLayoutChanged("ring_capacity"));
        }
        if self.channels != next.channels {
            return Err(ConfigError::InputLayoutChanged("channels"));
        }
        if self.downmix != next.downmix {
            return Err(ConfigError::InputLayoutChanged("downmix"));
        }
        Ok(())
    }

    /// Worker period
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    /// Worker updates per second
    pub fn update_rate_hz(&self) -> f32 {
        1000.0 / self.update_interval_ms.max(1) as f32
    }

    /// Width of one FFT bin in Hz
    pub fn bin_width_hz(&self) -> f32 {
        self.sample_rate / self.frame_length as f32
    }
}

fn check_coefficient(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::CoefficientOutOfRange { name, value })
    }
}
