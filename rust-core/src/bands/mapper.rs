//! Band mapper: spectrum in, raw band array out
//!
//! Stateless. The same spectrum always produces the same bands.

use super::mapping::BandMappingTable;
use serde::{Deserialize, Serialize};

/// Smallest magnitude fed to log10
const MIN_MAGNITUDE: f32 = 1e-10;

/// How the bins of one band are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandAggregation {
    /// Weighted average of the band's bins
    #[default]
    Mean,

    /// Weighted sum of the band's bins
    Sum,
}

/// Perceptual scale applied after aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MagnitudeScale {
    /// Amplitude as is (times gain)
    Linear,

    /// 20·log10, mapped from [db_floor, 0] dB onto [0, 1]
    #[default]
    Decibel,
}

/// Clamp anything that is not a finite, non-negative number to 0.0
#[inline]
pub fn sanitize(value: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Aggregates spectrum bins into bands
#[derive(Debug, Clone)]
pub struct BandMapper {
    table: BandMappingTable,
    aggregation: BandAggregation,
    scale: MagnitudeScale,
    db_floor: f32,
    gain: f32,
}

impl BandMapper {
    /// Create a mapper
    ///
    /// # Arguments
    /// * `table` - Bin-to-band mapping
    /// * `aggregation` - Mean or sum over each band's bins
    /// * `scale` - Linear or normalised decibel output
    /// * `db_floor` - Level (negative dB) that maps to 0.0 in decibel scale
    /// * `gain` - Linear gain applied before scaling
    pub fn new(
        table: BandMappingTable,
        aggregation: BandAggregation,
        scale: MagnitudeScale,
        db_floor: f32,
        gain: f32,
    ) -> Self {
        Self {
            table,
            aggregation,
            scale,
            db_floor,
            gain,
        }
    }

    /// Map a magnitude spectrum onto bands
    ///
    /// Bins missing from `spectrum` count as silence. Every output value is
    /// finite and non-negative; empty bands are 0.0.
    pub fn map(&self, spectrum: &[f32], bands: &mut [f32]) {
        for (band, out) in bands.iter_mut().enumerate().take(self.table.band_count()) {
            let mut acc = 0.0f32;
            let mut total_weight = 0.0f32;

            for (bin, weight) in self.table.band_bins(band) {
                acc += weight * spectrum.get(bin).copied().unwrap_or(0.0);
                total_weight += weight;
            }

            let magnitude = match self.aggregation {
                _ if total_weight <= 0.0 => 0.0,
                BandAggregation::Mean => acc / total_weight,
                BandAggregation::Sum => acc,
            };

            *out = sanitize(self.scale_value(magnitude));
        }

        let mapped = self.table.band_count().min(bands.len());
        bands[mapped..].fill(0.0);
    }

    #[inline]
    fn scale_value(&self, magnitude: f32) -> f32 {
        let amplitude = sanitize(magnitude) * self.gain;

        match self.scale {
            MagnitudeScale::Linear => amplitude,
            MagnitudeScale::Decibel => {
                let db = 20.0 * amplitude.max(MIN_MAGNITUDE).log10();
                ((db - self.db_floor) / -self.db_floor).clamp(0.0, 1.0)
            }
        }
    }

    pub fn table(&self) -> &BandMappingTable {
        &self.table
    }

    pub fn band_count(&self) -> usize {
        self.table.band_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bands::mapping::BandCurve;

    /// 16 bins at 1 Hz each, 4 linear bands of 4 Hz
    fn small_table() -> BandMappingTable {
        BandMappingTable::build(32.0, 32, 4, BandCurve::Linear, 0.0, 16.0)
    }

    #[test]
    fn test_mean_of_flat_spectrum() {
        let mapper = BandMapper::new(
            small_table(),
            BandAggregation::Mean,
            MagnitudeScale::Linear,
            -60.0,
            1.0,
        );

        let spectrum = vec![0.5; 17];
        let mut bands = vec![0.0; 4];
        mapper.map(&spectrum, &mut bands);

        for b in bands {
            assert!((b - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_sum_scales_with_width() {
        let mapper = BandMapper::new(
            small_table(),
            BandAggregation::Sum,
            MagnitudeScale::Linear,
            -60.0,
            1.0,
        );

        let spectrum = vec![1.0; 17];
        let mut bands = vec![0.0; 4];
        mapper.map(&spectrum, &mut bands);

        // Each band covers 4 bins worth of weight
        for b in bands {
            assert!((b - 4.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_decibel_scale() {
        let mapper = BandMapper::new(
            small_table(),
            BandAggregation::Mean,
            MagnitudeScale::Decibel,
            -60.0,
            1.0,
        );

        let mut spectrum = vec![0.0; 17];
        // Band 1 at full scale, band 2 at -30 dB
        spectrum[4..8].fill(1.0);
        spectrum[8..12].fill(10f32.powf(-1.5));

        let mut bands = vec![0.0; 4];
        mapper.map(&spectrum, &mut bands);

        // Band 0 only sees half of the shared boundary bin 4
        assert!(bands[0] > 0.0 && bands[0] < bands[1]);
        assert!(bands[1] > 0.9);
        assert!(bands[2] > 0.3 && bands[2] < 0.7);
        assert_eq!(bands[3], 0.0);
    }

    #[test]
    fn test_gain_is_applied() {
        let mapper = BandMapper::new(
            small_table(),
            BandAggregation::Mean,
            MagnitudeScale::Linear,
            -60.0,
            4.0,
        );

        let mut bands = vec![0.0; 4];
        mapper.map(&vec![0.25; 17], &mut bands);
        assert!((bands[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_non_finite_bins_are_clamped() {
        let mapper = BandMapper::new(
            small_table(),
            BandAggregation::Mean,
            MagnitudeScale::Linear,
            -60.0,
            1.0,
        );

        let mut spectrum = vec![0.1; 17];
        spectrum[1] = f32::NAN;
        spectrum[6] = f32::INFINITY;
        spectrum[10] = -3.0;

        let mut bands = vec![0.0; 4];
        mapper.map(&spectrum, &mut bands);

        assert!(bands.iter().all(|b| b.is_finite() && *b >= 0.0));
        assert_eq!(bands[0], 0.0);
        assert_eq!(bands[1], 0.0);
    }

    #[test]
    fn test_empty_bands_are_zero() {
        // Range reaches twice Nyquist, upper half of the bands has no bins
        let table = BandMappingTable::build(32.0, 32, 4, BandCurve::Linear, 0.0, 32.0);
        let mapper = BandMapper::new(table, BandAggregation::Mean, MagnitudeScale::Linear, -60.0, 1.0);

        let mut bands = vec![7.0; 4];
        mapper.map(&vec![1.0; 17], &mut bands);

        assert!(bands[0] > 0.0);
        assert_eq!(bands[3], 0.0);
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let mapper = BandMapper::new(
            BandMappingTable::build(48000.0, 1024, 64, BandCurve::Logarithmic, 30.0, 16000.0),
            BandAggregation::Mean,
            MagnitudeScale::Decibel,
            -90.0,
            1.0,
        );

        let spectrum: Vec<f32> = (0..513).map(|i| ((i * 37 % 101) as f32) / 100.0).collect();
        let mut a = vec![0.0; 64];
        let mut b = vec![0.0; 64];
        mapper.map(&spectrum, &mut a);
        mapper.map(&spectrum, &mut b);

        assert_eq!(a, b);
    }
}
