//! Filters: a lightweight one-pole, a DC blocker, and a TPT low-pass.
//!
//! Goals
//! - `no_std`-friendly, allocation free
//! - Stable under heavy cutoff modulation
//! - Clear APIs and predictable parameterization
//!
//! Contents
//! - `OnePoleLP` : "RC-style" one-pole low-pass (cheap smoother/slew)
//! - `DcBlock`   : one-pole high-pass specialized for DC removal
//! - `SvfLp`     : low-pass tap of a TPT (topology-preserving) state-variable
//!   filter; this is the voice's modulated filter stage, chosen over the
//!   one-pole because it stays well-behaved while the cutoff moves every
//!   control block.
//!
//! Notes
//! - `OnePoleLP` uses the inexpensive `y += a * (x - y)` form with
//!   `a = 1 - exp(-2π fc / sr)`. Not bilinear-matched; great for slewing
//!   control signals and gentle damping inside feedback loops.
//! - `SvfLp` uses `g = tan(π fc / sr)` with damping `R = 1/(2Q)`.

use crate::dsp::{kill_denormals, one_pole_coeff_hz, tpt_g};

/// One-pole low-pass `y += a * (x - y)`.
#[derive(Copy, Clone, Debug)]
pub struct OnePoleLP {
    a: f32,
    y: f32,
    sr: f32,
    fc: f32,
}

impl OnePoleLP {
    /// Create a low-pass with cutoff `cut_hz` and sample rate `sr`.
    #[inline]
    pub fn new(cut_hz: f32, sr: f32) -> Self {
        let mut s = Self {
            a: 0.0,
            y: 0.0,
            sr: sr.max(1.0),
            fc: cut_hz.max(0.0),
        };
        s.update_coeffs();
        s
    }

    #[inline]
    pub fn set_sample_rate(&mut self, sr: f32) {
        self.sr = sr.max(1.0);
        self.update_coeffs();
    }

    #[inline]
    pub fn set_cutoff_hz(&mut self, cut_hz: f32) {
        self.fc = cut_hz.max(0.0);
        self.update_coeffs();
    }

    /// Drop the state back to quiescence without touching the coefficient.
    #[inline]
    pub fn clear(&mut self) { self.y = 0.0; }

    #[inline]
    fn update_coeffs(&mut self) {
        self.a = 1.0 - one_pole_coeff_hz(self.fc, self.sr);
    }

    /// Process one sample.
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        self.y += self.a * (x - self.y);
        self.y = kill_denormals(self.y);
        self.y
    }

    #[inline] pub fn value(&self) -> f32 { self.y }
}

/// DC blocker: `y[n] = x[n] - x[n-1] + a * y[n-1]` with `a = exp(-2π fc / sr)`.
///
/// Recommended cutoff: 10–25 Hz. Keeps long-running drones centred before
/// they hit a device buffer.
#[derive(Copy, Clone, Debug)]
pub struct DcBlock {
    a: f32,
    x1: f32,
    y1: f32,
    sr: f32,
    fc: f32,
}

impl DcBlock {
    #[inline]
    pub fn new(cut_hz: f32, sr: f32) -> Self {
        let mut s = Self { a: 0.0, x1: 0.0, y1: 0.0, sr: sr.max(1.0), fc: cut_hz.max(0.0) };
        s.update_coeffs();
        s
    }

    #[inline]
    pub fn set_sample_rate(&mut self, sr: f32) {
        self.sr = sr.max(1.0);
        self.update_coeffs();
    }

    #[inline]
    pub fn clear(&mut self) {
        self.x1 = 0.0;
        self.y1 = 0.0;
    }

    #[inline]
    fn update_coeffs(&mut self) {
        self.a = one_pole_coeff_hz(self.fc, self.sr);
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let y = x - self.x1 + self.a * self.y1;
        self.x1 = x;
        self.y1 = kill_denormals(y);
        self.y1
    }
}

/// Low-pass tap of a TPT state-variable filter (Zavalishin formulation).
///
/// Internals:
/// - `g = tan(π fc / sr)`
/// - `R = 1 / (2Q)`
///
/// The cutoff setter only recomputes `g`; the engine calls it at control-block
/// rate while the state integrates every sample, which is exactly the use the
/// TPT structure tolerates well.
#[derive(Copy, Clone, Debug)]
pub struct SvfLp {
    sr: f32,
    cut: f32,
    // derived
    g: f32,
    r: f32,
    // states
    ic1eq: f32,
    ic2eq: f32,
}

impl SvfLp {
    #[inline]
    pub fn new(cut_hz: f32, q: f32, sr: f32) -> Self {
        let mut s = Self {
            sr: sr.max(1.0),
            cut: cut_hz.max(0.0),
            g: 0.0,
            r: 1.0 / (2.0 * q.max(1e-4)),
            ic1eq: 0.0,
            ic2eq: 0.0,
        };
        s.recalc_g();
        s
    }

    #[inline]
    pub fn set_sample_rate(&mut self, sr: f32) {
        self.sr = sr.max(1.0);
        self.recalc_g();
    }

    #[inline]
    pub fn set_cutoff_hz(&mut self, cut_hz: f32) {
        self.cut = cut_hz.max(0.0);
        self.recalc_g();
    }

    #[inline]
    pub fn set_q(&mut self, q: f32) {
        self.r = 1.0 / (2.0 * q.max(1e-4));
    }

    /// Zero the integrator states (e.g. after a sample-rate change).
    #[inline]
    pub fn clear(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }

    #[inline]
    fn recalc_g(&mut self) {
        self.g = tpt_g(self.cut, self.sr);
    }

    /// Process one sample, returning the low-pass output.
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        // v0 = x - r*ic1eq - ic2eq; v1 = g*v0 + ic1eq; v2 = g*v1 + ic2eq
        let denom = 1.0 + self.g * (self.g + 2.0 * self.r);
        let v0 = (x - (2.0 * self.r + self.g) * self.ic1eq - self.ic2eq) / denom;
        let v1 = self.g * v0 + self.ic1eq;
        let v2 = self.g * v1 + self.ic2eq;

        self.ic1eq = kill_denormals(self.g * v0 + v1);
        self.ic2eq = kill_denormals(self.g * v1 + v2);

        v2
    }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_pole_lp_moves_towards_input() {
        let sr = 48000.0;
        let mut lp = OnePoleLP::new(1000.0, sr);
        let mut y = 0.0;
        for _ in 0..(sr as usize) {
            y = lp.process(1.0);
        }
        assert!(y > 0.9, "y={}", y);
    }

    #[test]
    fn dc_block_removes_offset() {
        let sr = 48000.0;
        let mut dc = DcBlock::new(20.0, sr);
        let mut y = 0.0;
        for _ in 0..(sr as usize) {
            y = dc.process(1.0);
        }
        assert!(y.abs() < 1e-2, "y={}", y);
    }

    #[test]
    fn svf_lp_settles_on_dc() {
        let sr = 48000.0;
        let mut svf = SvfLp::new(1000.0, 0.707, sr);
        let mut y = 0.0;
        for _ in 0..(sr as usize) {
            y = svf.process(1.0);
        }
        // Unity DC gain for the low-pass tap.
        assert!((y - 1.0).abs() < 1e-3, "y={}", y);
    }

    #[test]
    fn svf_lp_stable_under_modulation() {
        let sr = 48000.0;
        let mut svf = SvfLp::new(400.0, 0.6, sr);
        let mut peak: f32 = 0.0;
        for i in 0..(sr as usize) {
            if i % 32 == 0 {
                // sweep the cutoff hard, the way the voice modulates it
                let cut = 100.0 + 4000.0 * (0.5 + 0.5 * ((i as f32) * 0.001).sin());
                svf.set_cutoff_hz(cut);
            }
            let x = if i % 97 == 0 { 1.0 } else { 0.0 };
            let y = svf.process(x);
            peak = peak.max(y.abs());
        }
        assert!(peak < 4.0, "peak={}", peak);
    }
}
