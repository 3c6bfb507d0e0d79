//! Spectral analysis with FFT

pub mod analysis;
pub mod fft;
pub mod windowing;

pub use analysis::SpectrumAnalyzer;
pub use fft::{ComplexFftEngine, FftEngine, Transform};
pub use windowing::WindowType;
