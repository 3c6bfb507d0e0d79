//! Windowing & transform stage
//!
//! Combines a window with a [`Transform`] and turns one frame into an
//! amplitude-normalised magnitude spectrum without allocating.

use super::fft::{FftEngine, Transform};
use super::windowing::{amplitude_correction, apply_window_into, generate_window, WindowType};
use crate::error::TransformError;

/// Real-time spectrum analyzer
pub struct SpectrumAnalyzer {
    transform: Box<dyn Transform>,
    window_type: WindowType,
    window: Vec<f32>,

    /// Windowed copy of the frame handed to the transform
    windowed: Vec<f32>,

    /// 2/Σw, so a full-scale sine reads ~1.0
    correction: f32,
}

impl SpectrumAnalyzer {
    /// Create an analyzer backed by the real FFT
    pub fn new(frame_length: usize, window_type: WindowType) -> Self {
        Self::with_transform(Box::new(FftEngine::new(frame_length)), window_type)
    }

    /// Create an analyzer around any transform implementation
    pub fn with_transform(transform: Box<dyn Transform>, window_type: WindowType) -> Self {
        let frame_length = transform.frame_length();
        let window = generate_window(window_type, frame_length);
        let correction = amplitude_correction(&window);

        Self {
            transform,
            window_type,
            window,
            windowed: vec![0.0; frame_length],
            correction,
        }
    }

    /// Analyze one frame into `spectrum`
    ///
    /// # Arguments
    /// * `frame` - Exactly `frame_length` samples
    /// * `spectrum` - Exactly `num_bins` slots, receives amplitude per bin
    pub fn analyze(&mut self, frame: &[f32], spectrum: &mut [f32]) -> Result<(), TransformError> {
        if frame.len() != self.windowed.len() {
            return Err(TransformError::Length {
                expected: self.windowed.len(),
                actual: frame.len(),
            });
        }

        apply_window_into(frame, &self.window, &mut self.windowed);
        self.transform.magnitudes(&mut self.windowed, spectrum)?;

        for s in spectrum.iter_mut() {
            *s *= self.correction;
        }
        Ok(())
    }

    /// Frequency of a bin in Hz
    pub fn bin_frequency(&self, bin: usize, sample_rate: f32) -> f32 {
        bin as f32 * sample_rate / self.frame_length() as f32
    }

    pub fn frame_length(&self) -> usize {
        self.transform.frame_length()
    }

    /// Get number of frequency bins
    pub fn num_bins(&self) -> usize {
        self.transform.num_bins()
    }

    pub fn window_type(&self) -> WindowType {
        self.window_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::fft::ComplexFftEngine;
    use std::f32::consts::PI;

    fn sine(freq_hz: f32, amplitude: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|n| amplitude * (2.0 * PI * freq_hz * n as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_analyzer_basic() {
        let mut analyzer = SpectrumAnalyzer::new(1024, WindowType::Hann);
        let mut spectrum = vec![0.0; analyzer.num_bins()];

        // 1 kHz sine at 48 kHz
        let signal = sine(1000.0, 1.0, 48000.0, 1024);
        analyzer.analyze(&signal, &mut spectrum).unwrap();

        assert_eq!(spectrum.len(), 513);

        let (peak_idx, _) = spectrum
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
            .unwrap();

        let peak_freq = analyzer.bin_frequency(peak_idx, 48000.0);
        assert!((peak_freq - 1000.0).abs() < 50.0);
    }

    #[test]
    fn test_amplitude_normalisation() {
        let mut analyzer = SpectrumAnalyzer::new(2048, WindowType::Hann);
        let mut spectrum = vec![0.0; analyzer.num_bins()];

        // Bin-centred tone (bin 100) at half scale
        let signal = sine(100.0 * 48000.0 / 2048.0, 0.5, 48000.0, 2048);
        analyzer.analyze(&signal, &mut spectrum).unwrap();

        assert!((spectrum[100] - 0.5).abs() < 0.01, "got {}", spectrum[100]);
    }

    #[test]
    fn test_silence_is_zero() {
        let mut analyzer = SpectrumAnalyzer::new(256, WindowType::Blackman);
        let mut spectrum = vec![1.0; analyzer.num_bins()];

        analyzer.analyze(&vec![0.0; 256], &mut spectrum).unwrap();
        assert!(spectrum.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_transform_is_swappable() {
        let mut real = SpectrumAnalyzer::new(512, WindowType::Hamming);
        let mut complex =
            SpectrumAnalyzer::with_transform(Box::new(ComplexFftEngine::new(512)), WindowType::Hamming);

        let signal = sine(3000.0, 0.8, 44100.0, 512);
        let mut a = vec![0.0; 257];
        let mut b = vec![0.0; 257];
        real.analyze(&signal, &mut a).unwrap();
        complex.analyze(&signal, &mut b).unwrap();

        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-4);
        }
    }

    #[test]
    fn test_wrong_frame_length() {
        let mut analyzer = SpectrumAnalyzer::new(256, WindowType::Hann);
        let mut spectrum = vec![0.0; 129];
        assert!(analyzer.analyze(&[0.0; 100], &mut spectrum).is_err());
    }
}
