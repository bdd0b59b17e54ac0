//! Generic DSP utilities and math helpers.
//!
//! Design goals:
//! - `no_std` ready (guarded by the crate feature `no-std`)
//! - Math backend selection that works in both `std` and `no_std` contexts
//! - Optional `fast-math` approximations for hot paths
//! - Clean, side-effect free helpers that are easy to test
//!
//! Conventions:
//! - All functions are `#[inline]` where useful to help the optimizer.
//! - Phases are radians unless a function name says otherwise.

#![allow(clippy::excessive_precision)]

use core::f32::consts::PI;

use cfg_if::cfg_if;

// ----------------------------- Math backend selection -----------------------------

cfg_if! {
    // micromath preferred if explicitly requested (works in no_std)
    if #[cfg(feature = "micromath")] {
        use micromath::F32Ext as _;
        #[inline] fn m_sin(x: f32) -> f32 { x.sin() }
        #[inline] fn m_cos(x: f32) -> f32 { x.cos() }
        #[inline] fn m_exp(x: f32) -> f32 { x.exp() }
        #[inline] fn m_ln(x: f32) -> f32 { x.ln() }
        #[inline] fn m_tanh(x: f32) -> f32 { x.tanh() }
        #[inline] fn m_tan(x: f32) -> f32 { (x.sin()) / (x.cos()) }
        #[inline] fn m_sqrt(x: f32) -> f32 { x.sqrt() }
        #[inline] pub(crate) fn m_round(x: f32) -> f32 { x.round() }
    // libm (C math) in no_std
    } else if #[cfg(feature = "no-std")] {
        #[inline] fn m_sin(x: f32) -> f32 { libm::sinf(x) }
        #[inline] fn m_cos(x: f32) -> f32 { libm::cosf(x) }
        #[inline] fn m_exp(x: f32) -> f32 { libm::expf(x) }
        #[inline] fn m_ln(x: f32) -> f32 { libm::logf(x) }
        #[inline] fn m_tanh(x: f32) -> f32 { libm::tanhf(x) }
        #[inline] fn m_tan(x: f32) -> f32 { libm::tanf(x) }
        #[inline] fn m_sqrt(x: f32) -> f32 { libm::sqrtf(x) }
        #[inline] pub(crate) fn m_round(x: f32) -> f32 { libm::roundf(x) }
    // std backend
    } else {
        #[inline] fn m_sin(x: f32) -> f32 { x.sin() }
        #[inline] fn m_cos(x: f32) -> f32 { x.cos() }
        #[inline] fn m_exp(x: f32) -> f32 { x.exp() }
        #[inline] fn m_ln(x: f32) -> f32 { x.ln() }
        #[inline] fn m_tanh(x: f32) -> f32 { x.tanh() }
        #[inline] fn m_tan(x: f32) -> f32 { x.tan() }
        #[inline] fn m_sqrt(x: f32) -> f32 { x.sqrt() }
        #[inline] pub(crate) fn m_round(x: f32) -> f32 { x.round() }
    }
}

// --------------------------------- Constants -------------------------------------

/// 2π (commonly useful)
pub const TAU: f32 = 2.0 * PI;

/// A very small epsilon used in denormal handling and safe divisions.
pub const EPS_SMALL: f32 = 1.0e-20;

// --------------------------------- Utilities -------------------------------------

/// Reduce a radian phase to [-π, π].
#[inline]
pub fn reduce_phase(p: f32) -> f32 {
    let k = m_round(p * (1.0 / TAU));
    p - k * TAU
}

/// Keep an accumulating radian phase bounded. Call between blocks, not per
/// sample; the result stays within one cycle of zero.
#[inline]
pub fn wrap_phase(p: f32) -> f32 {
    if p > TAU || p < -TAU { reduce_phase(p) } else { p }
}

/// Kill denormal/subnormal values. Returns 0.0 if |x| < EPS_SMALL.
#[inline]
pub fn kill_denormals(x: f32) -> f32 {
    if x.abs() < EPS_SMALL { 0.0 } else { x }
}

// --------------------------------- dB / linear -----------------------------------

/// Convert dB to linear gain: lin = 10^(db/20).
#[inline]
pub fn db_to_lin(db: f32) -> f32 {
    if db <= -120.0 { 0.0 } else { m_exp(0.11512925464970229_f32 * db) } // ln(10)/20
}

/// Convert linear gain to dB: db = 20*log10(lin).
#[inline]
pub fn lin_to_db(lin: f32) -> f32 {
    if lin <= EPS_SMALL { -120.0 }
    else { 8.685889638065036553_f32 * m_ln(lin) } // 20/ln(10)
}

// --------------------------------- Pitch -----------------------------------------

/// Detune in cents to a frequency ratio: ratio = 2^(cents/1200).
#[inline]
pub fn cents_to_ratio(cents: f32) -> f32 {
    m_exp(core::f32::consts::LN_2 * (cents * (1.0 / 1200.0)))
}

// --------------------------------- Fast trig -------------------------------------

/// Fast sine with range reduction into [-π, π] and a 5th-order odd polynomial.
/// Max abs error ~1e-3 when `fast-math` is enabled; falls back to exact otherwise.
#[inline]
pub fn fast_sin(x: f32) -> f32 {
    cfg_if! {
        if #[cfg(feature = "fast-math")] {
            let xr = reduce_phase(x);
            let x2 = xr * xr;
            xr * (0.999_979_313_3 + x2 * (-0.166_624_432_0 + x2 * 0.008_308_978_98))
        } else {
            m_sin(x)
        }
    }
}

#[inline]
pub fn fast_cos(x: f32) -> f32 {
    cfg_if! {
        if #[cfg(feature = "fast-math")] {
            fast_sin(x + PI * 0.5)
        } else {
            m_cos(x)
        }
    }
}

// --------------------------------- Nonlinearities --------------------------------

/// Soft clip via tanh. If `fast-math` is enabled, uses a stable rational
/// approximation: `tanh(x) ≈ x * (27 + x^2) / (27 + 9 x^2)`.
/// Smooth, monotonic, clamps towards ±1.
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    #[cfg(feature = "fast-math")]
    {
        // The rational form only stays inside ±1 for |x| <= 3; past that it
        // grows like x/9 again, so pin the result.
        let x2 = x * x;
        let num = x * (27.0 + x2);
        let den = 27.0 + 9.0 * x2;
        return (num / den).clamp(-1.0, 1.0);
    }
    #[allow(unreachable_code)]
    m_tanh(x)
}

/// Drive + soft saturation: `tanh(drive * x)` (or fast approx).
#[inline]
pub fn saturate(x: f32, drive: f32) -> f32 {
    soft_clip(x * drive)
}

// --------------------------------- Exponentials / smoothing ----------------------

/// One-pole smoothing coefficient for a time constant `t_ms` (milliseconds).
///
/// The discrete one-pole form: `y[n] += (1 - a) * (x[n] - y[n])`
/// where `a = exp(-1/(tau * sr))` for a first-order lag with time constant `tau`.
/// `t_ms` is the time to reach ~63% (1 - 1/e) of a step; ~99% lands near
/// `4.6 * t_ms`.
#[inline]
pub fn one_pole_coeff_ms(t_ms: f32, sr: f32) -> f32 {
    if t_ms <= 0.0 { return 0.0; }
    let tau = t_ms * 0.001;
    m_exp(-1.0 / (tau * sr))
}

/// Convert cutoff in Hz to a one-pole coefficient, `exp(-2π fc / sr)`.
/// Same `y += (1-a)(x - y)` form; a lightweight "RC" style discretization.
#[inline]
pub fn one_pole_coeff_hz(cut_hz: f32, sr: f32) -> f32 {
    let fc = cut_hz.max(0.0).min(0.499 * sr);
    m_exp(-TAU * fc / sr)
}

/// TPT `g = tan(π fc / sr)` helper for state-variable filters.
#[inline]
pub fn tpt_g(cut_hz: f32, sr: f32) -> f32 {
    let x = PI * (cut_hz / sr);
    cfg_if! {
        if #[cfg(feature = "fast-math")] {
            let s = fast_sin(x);
            let c = fast_cos(x);
            s / c
        } else {
            m_tan(x)
        }
    }
}

// --------------------------------- Simple meters ---------------------------------

/// Running RMS meter (windowed via exponential smoothing). Call once per sample.
///
/// `alpha` is the smoothing factor in [0,1]; a good choice is
/// `alpha = one_pole_coeff_ms(50.0, sr)`.
#[derive(Copy, Clone, Debug)]
pub struct Rms {
    pub alpha: f32,
    state: f32,
}
impl Rms {
    #[inline]
    pub fn new(alpha: f32) -> Self { Self { alpha, state: 0.0 } }

    #[inline]
    pub fn reset(&mut self) { self.state = 0.0; }

    #[inline]
    pub fn tick(&mut self, x: f32) -> f32 {
        let x2 = x * x;
        self.state += (1.0 - self.alpha) * (x2 - self.state);
        m_sqrt(self.state)
    }
}

// --------------------------------- Tests (std only) ------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_lin_roundtrip() {
        for db in [-60.0, -20.0, -6.0, 0.0, 6.0, 12.0, 24.0] {
            let lin = db_to_lin(db);
            let back = lin_to_db(lin);
            assert!((db - back).abs() < 0.1, "db={}, back={}", db, back);
        }
    }

    #[test]
    fn soft_clip_is_bounded() {
        for x in [-50.0, -10.0, -2.0, -1.0, 0.0, 1.0, 2.0, 10.0, 50.0] {
            let y = soft_clip(x);
            assert!(y <= 1.0 + 1e-4 && y >= -1.0 - 1e-4, "x={} y={}", x, y);
        }
    }

    #[test]
    fn cents_ratio_octave() {
        assert!((cents_to_ratio(1200.0) - 2.0).abs() < 1e-4);
        assert!((cents_to_ratio(-1200.0) - 0.5).abs() < 1e-4);
        assert!((cents_to_ratio(0.0) - 1.0).abs() < 1e-7);
    }

    #[test]
    fn reduce_phase_stays_in_cycle() {
        for p in [0.0f32, 1.0, -1.0, 10.0, -10.0, 1000.0, -1000.0] {
            let r = reduce_phase(p);
            assert!((-PI - 1e-3..=PI + 1e-3).contains(&r), "p={} r={}", p, r);
        }
    }

    #[test]
    fn rms_decreases_to_zero() {
        let mut rms = Rms::new(one_pole_coeff_ms(10.0, 48000.0));
        let mut v = 1.0;
        for _ in 0..10000 {
            v = rms.tick(0.0);
        }
        assert!(v < 1e-3);
    }
}
