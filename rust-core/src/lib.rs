//! Bandscope - Real-Time Frequency Band Engine
//!
//! Turns a live audio stream into a fixed-size array of smoothed band
//! magnitudes for visualisers: lock-free ring buffer, windowed FFT,
//! fractional bin-to-band mapping, attack/release smoothing and a tear-free
//! snapshot any thread can read.

// Suppress PyO3 non-local impl warnings (harmless macro-generated code)
#![cfg_attr(feature = "python", allow(non_local_definitions))]

pub mod audio;
pub mod bands;
pub mod config;
pub mod engine;
pub mod error;
pub mod spectrum;

#[cfg(feature = "python")]
mod python_bindings;

/// Default number of output bands
pub const FREQ_BANDS: usize = 1280;

pub use audio::{AudioRingBuffer, DownmixPolicy, NotReady, SampleWriter};
pub use bands::{BandAggregation, BandCurve, BandMappingTable, MagnitudeScale};
pub use config::EngineConfig;
pub use engine::{BandEngine, BandReader, CycleOutcome, StatsSnapshot};
pub use error::{ConfigError, EngineError, TransformError};
pub use spectrum::{SpectrumAnalyzer, WindowType};
