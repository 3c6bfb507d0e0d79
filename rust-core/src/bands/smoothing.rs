//! Attack/release smoothing per band
//!
//! First-order IIR: `new = prev + c * (raw - prev)`, with `c = attack` on the
//! way up and `c = release` on the way down. Stable for any c in (0, 1].

use super::mapper::sanitize;

/// Convert a time constant into a per-update coefficient
///
/// # Arguments
/// * `time_ms` - Time to cover ~63% of a step
/// * `update_rate_hz` - How often `smooth` is called
pub fn coefficient_from_time(time_ms: f32, update_rate_hz: f32) -> f32 {
    let updates = (time_ms / 1000.0) * update_rate_hz;
    if updates <= 0.0 || !updates.is_finite() {
        return 1.0;
    }
    (1.0 - (-1.0 / updates).exp()).clamp(f32::MIN_POSITIVE, 1.0)
}

/// One smoothing step for a single band
#[inline]
pub fn smooth_value(prev: f32, raw: f32, attack: f32, release: f32) -> f32 {
    let raw = sanitize(raw);
    let coeff = if raw > prev { attack } else { release };
    sanitize(prev + coeff * (raw - prev))
}

/// Smooth a whole band array against the previous one
///
/// Pure form of [`BandSmoother::smooth`]; writes into `out`.
pub fn smooth_bands(raw: &[f32], previous: &[f32], attack: f32, release: f32, out: &mut [f32]) {
    for ((o, &r), &p) in out.iter_mut().zip(raw).zip(previous) {
        *o = smooth_value(p, r, attack, release);
    }
}

/// Holds the previous smoothed band array
#[derive(Debug, Clone)]
pub struct BandSmoother {
    attack: f32,
    release: f32,
    state: Vec<f32>,
}

impl BandSmoother {
    /// Create a smoother with all bands at zero
    pub fn new(band_count: usize, attack: f32, release: f32) -> Self {
        Self {
            attack,
            release,
            state: vec![0.0; band_count],
        }
    }

    /// Advance one cycle and copy the new state into `out`
    pub fn smooth(&mut self, raw: &[f32], out: &mut [f32]) {
        for (prev, &r) in self.state.iter_mut().zip(raw) {
            *prev = smooth_value(*prev, r, self.attack, self.release);
        }

        let n = out.len().min(self.state.len());
        out[..n].copy_from_slice(&self.state[..n]);
    }

    /// Reset every band to zero
    pub fn reset(&mut self) {
        self.state.fill(0.0);
    }

    /// Current smoothed values
    pub fn state(&self) -> &[f32] {
        &self.state
    }

    pub fn attack(&self) -> f32 {
        self.attack
    }

    pub fn release(&self) -> f32 {
        self.release
    }
}
