//! Band mapping table
//!
//! Maps FFT bins onto a fixed number of bands. Each bin is treated as the
//! interval [k - 0.5, k + 0.5) in bin units, and a band takes every bin it
//! overlaps, weighted by the length of the overlap. Bands narrower than a
//! bin therefore still get a (fractional) share instead of coming out empty.

use serde::{Deserialize, Serialize};

/// Frequency-to-band curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandCurve {
    /// Equal width in Hz
    Linear,

    /// Equal width in octaves (constant ratio between band edges)
    #[default]
    Logarithmic,
}

impl BandCurve {
    /// Frequency at position `t` in [0, 1] along the curve
    fn frequency_at(self, t: f64, min_hz: f64, max_hz: f64) -> f64 {
        match self {
            BandCurve::Linear => min_hz + (max_hz - min_hz) * t,
            BandCurve::Logarithmic => min_hz * (max_hz / min_hz).powf(t),
        }
    }
}

/// Immutable bin-to-band mapping
///
/// Stored as a flat list of (bin, weight) entries indexed by per-band offsets.
#[derive(Debug, Clone)]
pub struct BandMappingTable {
    /// `offsets[b]..offsets[b + 1]` are the entries of band b
    offsets: Vec<usize>,

    bins: Vec<u32>,

    /// Overlap in bin units, in (0, 1]
    weights: Vec<f32>,

    /// Band edges in Hz, band_count + 1 values
    edges_hz: Vec<f32>,

    num_bins: usize,
    bin_width_hz: f32,
}

impl BandMappingTable {
    /// Build the table
    ///
    /// # Arguments
    /// * `sample_rate` - Sample rate in Hz
    /// * `frame_length` - FFT size in samples
    /// * `band_count` - Number of output bands
    /// * `curve` - Band spacing
    /// * `min_hz`, `max_hz` - Frequency range covered by the bands
    pub fn build(
        sample_rate: f32,
        frame_length: usize,
        band_count: usize,
        curve: BandCurve,
        min_hz: f32,
        max_hz: f32,
    ) -> Self {
        let num_bins = frame_length / 2 + 1;
        let bin_width = sample_rate as f64 / frame_length as f64;
        let (min_hz64, max_hz64) = (min_hz as f64, max_hz as f64);

        let edges: Vec<f64> = (0..=band_count)
            .map(|i| curve.frequency_at(i as f64 / band_count as f64, min_hz64, max_hz64))
            .collect();

        let mut offsets = Vec::with_capacity(band_count + 1);
        let mut bins = Vec::new();
        let mut weights = Vec::new();
        offsets.push(0);

        // Bins cover [-0.5, num_bins - 0.5) in bin units
        let last_edge = num_bins as f64 - 0.5;

        for band in 0..band_count {
            let lo = (edges[band] / bin_width).max(-0.5);
            let hi = (edges[band + 1] / bin_width).min(last_edge);

            if hi > lo {
                let first = (lo + 0.5).floor().max(0.0) as usize;
                let last = ((hi + 0.5).ceil() as usize).min(num_bins);

                for k in first..last {
                    let overlap = hi.min(k as f64 + 0.5) - lo.max(k as f64 - 0.5);
                    if overlap > 0.0 {
                        bins.push(k as u32);
                        weights.push(overlap as f32);
                    }
                }
            }

            offsets.push(bins.len());
        }

        Self {
            offsets,
            bins,
            weights,
            edges_hz: edges.into_iter().map(|e| e as f32).collect(),
            num_bins,
            bin_width_hz: bin_width as f32,
        }
    }

    /// Bins of a band with their weights
    pub fn band_bins(&self, band: usize) -> impl Iterator<Item = (usize, f32)> + '_ {
        let range = self.offsets[band]..self.offsets[band + 1];
        self.bins[range.clone()]
            .iter()
            .zip(&self.weights[range])
            .map(|(&bin, &w)| (bin as usize, w))
    }

    /// Sum of the weights of a band (0.0 for empty bands)
    pub fn band_weight(&self, band: usize) -> f32 {
        self.weights[self.offsets[band]..self.offsets[band + 1]]
            .iter()
            .sum()
    }

    /// Lower and upper edge of a band in Hz
    pub fn band_range_hz(&self, band: usize) -> (f32, f32) {
        (self.edges_hz[band], self.edges_hz[band + 1])
    }

    /// Band whose range contains `hz`
    pub fn band_for_frequency(&self, hz: f32) -> Option<usize> {
        let band_count = self.band_count();
        if band_count == 0
            || !hz.is_finite()
            || hz < self.edges_hz[0]
            || hz > self.edges_hz[band_count]
        {
            return None;
        }

        // First edge strictly above hz marks the end of our band
        let upper = self.edges_hz.partition_point(|&edge| edge <= hz);
        Some(upper.saturating_sub(1).min(band_count - 1))
    }

    /// Number of bands that received no bins
    pub fn empty_bands(&self) -> usize {
        self.offsets.windows(2).filter(|w| w[0] == w[1]).count()
    }

    pub fn band_count(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Number of FFT bins the table expects
    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    pub fn bin_width_hz(&self) -> f32 {
        self.bin_width_hz
    }

    /// Total (bin, weight) entries
    pub fn entry_count(&self) -> usize {
        self.bins.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_bands_partition_bins() {
        // 1024-point FFT at 1024 Hz: exactly 1 Hz per bin
        let table = BandMappingTable::build(1024.0, 1024, 8, BandCurve::Linear, 0.0, 512.0);

        assert_eq!(table.band_count(), 8);
        assert_eq!(table.num_bins(), 513);
        assert_eq!(table.empty_bands(), 0);

        // Each band spans 64 Hz = 64 bins worth of weight
        assert!((table.band_weight(0) - 64.0).abs() < 1e-4);
        assert!((table.band_weight(3) - 64.0).abs() < 1e-4);

        // Boundary bin 64 is shared half/half between bands 0 and 1
        let last_of_0: Vec<_> = table.band_bins(0).collect();
        let first_of_1: Vec<_> = table.band_bins(1).collect();
        assert_eq!(last_of_0.last().unwrap().0, 64);
        assert!((last_of_0.last().unwrap().1 - 0.5).abs() < 1e-6);
        assert_eq!(first_of_1[0].0, 64);
        assert!((first_of_1[0].1 - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_total_weight_is_conserved() {
        let table = BandMappingTable::build(48000.0, 2048, 100, BandCurve::Linear, 0.0, 24000.0);

        let total: f32 = (0..100).map(|b| table.band_weight(b)).sum();
        // Whole spectrum from DC to Nyquist is 1024 bins wide
        assert!((total - 1024.0).abs() < 1e-2, "total {}", total);
    }

    #[test]
    fn test_narrow_log_bands_get_fractional_bins() {
        let table =
            BandMappingTable::build(48000.0, 4096, 1280, BandCurve::Logarithmic, 20.0, 20000.0);

        assert_eq!(table.band_count(), 1280);
        assert_eq!(table.empty_bands(), 0);

        // Lowest band is far narrower than one bin but still maps to one
        let bins: Vec<_> = table.band_bins(0).collect();
        assert!(!bins.is_empty());
        assert!(bins.iter().all(|&(_, w)| w > 0.0 && w < 1.0));
    }

    #[test]
    fn test_log_edges_have_constant_ratio() {
        let table = BandMappingTable::build(48000.0, 1024, 10, BandCurve::Logarithmic, 20.0, 20480.0);

        for band in 0..10 {
            let (lo, hi) = table.band_range_hz(band);
            assert!((hi / lo - 2.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_bands_above_nyquist_are_empty() {
        // Nyquist is 8 kHz, upper half of the range has nothing to map
        let table = BandMappingTable::build(16000.0, 512, 16, BandCurve::Linear, 0.0, 16000.0);

        assert_eq!(table.empty_bands(), 7);
        assert_eq!(table.band_bins(15).count(), 0);
        assert_eq!(table.band_weight(15), 0.0);
    }

    #[test]
    fn test_band_for_frequency() {
        let table = BandMappingTable::build(48000.0, 1024, 10, BandCurve::Linear, 0.0, 1000.0);

        assert_eq!(table.band_for_frequency(0.0), Some(0));
        assert_eq!(table.band_for_frequency(150.0), Some(1));
        assert_eq!(table.band_for_frequency(999.0), Some(9));
        assert_eq!(table.band_for_frequency(1000.0), Some(9));
        assert_eq!(table.band_for_frequency(1500.0), None);
    }

    #[test]
    fn test_band_for_frequency_rejects_non_finite() {
        let table = BandMappingTable::build(48000.0, 1024, 10, BandCurve::Linear, 0.0, 1000.0);

        assert_eq!(table.band_for_frequency(f32::NAN), None);
        assert_eq!(table.band_for_frequency(f32::INFINITY), None);
        assert_eq!(table.band_for_frequency(f32::NEG_INFINITY), None);
    }
}
