//! Error types for the band engine
//!
//! Configuration problems fail fast at construction. Everything that can go
//! wrong per cycle is either recoverable (skip the cycle) or clamped.

use thiserror::Error;

#[cfg(feature = "capture")]
use crate::audio::input::AudioError;

/// Invalid engine configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("frame length must be a power of two, got {0}")]
    FrameLengthNotPowerOfTwo(usize),

    #[error("frame length {actual} is outside the supported range {min}..={max}")]
    FrameLengthOutOfRange { actual: usize, min: usize, max: usize },

    #[error("frame length {frame_length} does not fit in a ring buffer of {ring_capacity} samples")]
    RingTooSmall { frame_length: usize, ring_capacity: usize },

    #[error("band count must be greater than zero")]
    ZeroBandCount,

    #[error("sample rate must be finite and positive, got {0}")]
    InvalidSampleRate(f32),

    #[error("channel count must be at least 1")]
    ZeroChannels,

    #[error("frequency range {min_hz} Hz..{max_hz} Hz is empty or negative")]
    InvalidFrequencyRange { min_hz: f32, max_hz: f32 },

    #[error("logarithmic band curve needs a minimum frequency above 0 Hz")]
    LogCurveFromZero,

    #[error("{name} coefficient must lie in (0, 1], got {value}")]
    CoefficientOutOfRange { name: &'static str, value: f32 },

    #[error("decibel floor must be negative, got {0} dB")]
    InvalidDbFloor(f32),

    #[error("gain must be finite and positive, got {0}")]
    InvalidGain(f32),

    #[error("update interval must be at least 1 ms")]
    ZeroUpdateInterval,

    #[error("{0} is fixed for the lifetime of the engine and cannot be reconfigured")]
    InputLayoutChanged(&'static str),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure inside the frequency-domain transform
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("FFT failed: {0}")]
    Fft(#[from] realfft::FftError),

    #[error("transform expected {expected} values, got {actual}")]
    Length { expected: usize, actual: usize },
}

/// Top-level engine error
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("output buffer holds {actual} slots, engine publishes {expected} bands")]
    OutputLength { expected: usize, actual: usize },

    #[error("failed to spawn processing thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("processing thread panicked")]
    WorkerPanicked,

    #[error("the processing thread owns the pipeline; stop the engine before ticking it manually")]
    Running,

    #[error("processing pipeline was lost after a worker failure")]
    PipelineLost,

    #[cfg(feature = "capture")]
    #[error("audio capture failed: {0}")]
    Audio(#[from] AudioError),
}
