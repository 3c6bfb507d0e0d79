//! Windowing functions for spectral analysis
//!
//! Applied to each frame before the FFT to reduce spectral leakage

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Window function types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowType {
    /// Hann window: w[n] = 0.5 - 0.5*cos(2πn/(M-1))
    /// Sidelobe attenuation: ~31 dB, falls off quickly
    #[default]
    Hann,

    /// Hamming window: w[n] = 0.54 - 0.46*cos(2πn/(M-1))
    /// Sidelobe attenuation: ~43 dB
    Hamming,

    /// Blackman window: w[n] = 0.42 - 0.5*cos(2πn/(M-1)) + 0.08*cos(4πn/(M-1))
    /// Widest mainlobe, sidelobe attenuation: ~58 dB
    Blackman,

    /// Rectangular window (no windowing)
    Rectangular,
}

/// Generate window coefficients
///
/// # Arguments
/// * `window_type` - Type of window function
/// * `length` - Number of samples (M)
///
/// # Returns
/// Vector of window coefficients w[n] for n = 0..M-1
pub fn generate_window(window_type: WindowType, length: usize) -> Vec<f32> {
    if length < 2 {
        return vec![1.0; length];
    }

    let denom = (length - 1) as f64;

    (0..length)
        .map(|n| {
            let angle = 2.0 * PI * n as f64 / denom;
            let w = match window_type {
                WindowType::Hann => 0.5 - 0.5 * angle.cos(),
                WindowType::Hamming => 0.54 - 0.46 * angle.cos(),
                WindowType::Blackman => 0.42 - 0.5 * angle.cos() + 0.08 * (2.0 * angle).cos(),
                WindowType::Rectangular => 1.0,
            };
            w as f32
        })
        .collect()
}

/// Apply window into a separate buffer
///
/// `output` must be at least as long as `signal`; `window` must match `signal`.
pub fn apply_window_into(signal: &[f32], window: &[f32], output: &mut [f32]) {
    for ((out, &s), &w) in output.iter_mut().zip(signal).zip(window) {
        *out = s * w;
    }
}

/// Amplitude normalisation for a window
///
/// A sine of amplitude A lands in the FFT with peak magnitude A·Σw/2, so
/// multiplying bin magnitudes by `2/Σw` reads amplitudes directly.
pub fn amplitude_correction(window: &[f32]) -> f32 {
    let sum: f64 = window.iter().map(|&w| w as f64).sum();
    if sum > 0.0 {
        (2.0 / sum) as f32
    } else {
        0.0
    }
}
