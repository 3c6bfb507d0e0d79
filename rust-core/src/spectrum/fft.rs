//! Frequency-domain transforms
//!
//! The pipeline only talks to the [`Transform`] trait. [`FftEngine`] is the
//! real-input FFT used in production; [`ComplexFftEngine`] runs a full complex
//! FFT and exists as an independent implementation of the same contract.

use crate::error::TransformError;
use num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Real signal in, bin magnitudes out
pub trait Transform: Send {
    /// Number of input samples per call
    fn frame_length(&self) -> usize;

    /// Number of output bins (frame_length/2 + 1)
    fn num_bins(&self) -> usize {
        self.frame_length() / 2 + 1
    }

    /// Compute |X[k]| for k = 0..=frame_length/2
    ///
    /// `input` is used as scratch and holds garbage afterwards.
    fn magnitudes(&mut self, input: &mut [f32], output: &mut [f32]) -> Result<(), TransformError>;
}

fn check_len(expected: usize, actual: usize) -> Result<(), TransformError> {
    if expected == actual {
        Ok(())
    } else {
        Err(TransformError::Length { expected, actual })
    }
}

/// FFT engine for real-valued signals
pub struct FftEngine {
    /// FFT size (number of samples)
    fft_size: usize,

    /// Real FFT processor
    r2c: Arc<dyn RealToComplex<f32>>,

    /// Reusable output buffer (complex spectrum)
    output_buffer: Vec<Complex<f32>>,

    /// Reusable scratch space
    scratch: Vec<Complex<f32>>,
}

impl FftEngine {
    /// Create new FFT engine
    ///
    /// # Arguments
    /// * `fft_size` - FFT size (number of samples)
    pub fn new(fft_size: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let r2c = planner.plan_fft_forward(fft_size);

        let output_buffer = r2c.make_output_vec();
        let scratch = r2c.make_scratch_vec();

        Self {
            fft_size,
            r2c,
            output_buffer,
            scratch,
        }
    }
}

impl Transform for FftEngine {
    fn frame_length(&self) -> usize {
        self.fft_size
    }

    fn magnitudes(&mut self, input: &mut [f32], output: &mut [f32]) -> Result<(), TransformError> {
        check_len(self.fft_size, input.len())?;
        check_len(self.output_buffer.len(), output.len())?;

        self.r2c
            .process_with_scratch(input, &mut self.output_buffer, &mut self.scratch)?;

        for (out, c) in output.iter_mut().zip(&self.output_buffer) {
            *out = c.norm();
        }
        Ok(())
    }
}

/// Full complex FFT over a real signal (imaginary parts zero)
///
/// Twice the work of [`FftEngine`]; useful as a cross-check.
pub struct ComplexFftEngine {
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl ComplexFftEngine {
    pub fn new(fft_size: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Self {
            fft_size,
            fft,
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch,
        }
    }
}

impl Transform for ComplexFftEngine {
    fn frame_length(&self) -> usize {
        self.fft_size
    }

    fn magnitudes(&mut self, input: &mut [f32], output: &mut [f32]) -> Result<(), TransformError> {
        check_len(self.fft_size, input.len())?;
        check_len(self.num_bins(), output.len())?;

        for (c, &x) in self.buffer.iter_mut().zip(input.iter()) {
            *c = Complex::new(x, 0.0);
        }
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        for (out, c) in output.iter_mut().zip(&self.buffer) {
            *out = c.norm();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn magnitudes(engine: &mut dyn Transform, signal: &[f32]) -> Vec<f32> {
        let mut input = signal.to_vec();
        let mut output = vec![0.0; engine.num_bins()];
        engine.magnitudes(&mut input, &mut output).unwrap();
        output
    }

    #[test]
    fn test_fft_dc_signal() {
        let mut fft = FftEngine::new(1024);

        let spectrum = magnitudes(&mut fft, &vec![1.0; 1024]);

        // DC bin carries everything
        assert!((spectrum[0] - 1024.0).abs() < 1e-2);
        assert!(spectrum[10] < 1e-2);
    }

    #[test]
    fn test_fft_sine_wave() {
        let mut fft = FftEngine::new(1024);

        // Exactly bin 64
        let signal: Vec<f32> = (0..1024)
            .map(|n| (2.0 * PI * 64.0 * n as f32 / 1024.0).sin())
            .collect();

        let spectrum = magnitudes(&mut fft, &signal);

        let (peak_bin, &peak_mag) = spectrum
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
            .unwrap();

        assert_eq!(peak_bin, 64);
        // Peak magnitude is N/2 for a unit sine
        assert!((peak_mag - 512.0).abs() < 1.0);
    }

    #[test]
    fn test_real_and_complex_engines_agree() {
        let mut real = FftEngine::new(256);
        let mut complex = ComplexFftEngine::new(256);

        let signal: Vec<f32> = (0..256)
            .map(|n| (0.3 * n as f32).sin() + 0.25 * (1.7 * n as f32).cos())
            .collect();

        let a = magnitudes(&mut real, &signal);
        let b = magnitudes(&mut complex, &signal);

        assert_eq!(a.len(), 129);
        assert_eq!(b.len(), 129);
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-3, "{} vs {}", x, y);
        }
    }

    #[test]
    fn test_length_mismatch_is_an_error() {
        let mut fft = FftEngine::new(64);
        let mut input = vec![0.0; 32];
        let mut output = vec![0.0; 33];

        let err = fft.magnitudes(&mut input, &mut output).unwrap_err();
        assert!(matches!(err, TransformError::Length { expected: 64, actual: 32 }));
    }
}
