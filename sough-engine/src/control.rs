//! Control-rate modulation sources.
//!
//! These tick once per control block (32 samples), not per sample; the rates
//! involved are fractions of a hertz, so control-rate resolution is far below
//! anything audible. Both are allocation-free and cheap enough for the audio
//! thread.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use sough_core::dsp::TAU;
use sough_core::filters::OnePoleLP;

/// Free-running sine LFO. Phase lives in [0, 1).
#[derive(Copy, Clone, Debug)]
pub struct Lfo {
    phase01: f32,
    rate_hz: f32,
}

impl Lfo {
    #[inline]
    pub fn sine(rate_hz: f32) -> Self {
        Self { phase01: 0.0, rate_hz: rate_hz.max(0.0) }
    }

    #[inline]
    pub fn reset_phase(&mut self) {
        self.phase01 = 0.0;
    }

    /// Value in [-1, 1] at the current phase, then advance by `samples`
    /// samples at rate `sr`.
    #[inline]
    pub fn tick_block(&mut self, samples: usize, sr: f32) -> f32 {
        let v = (TAU * self.phase01).sin();
        self.phase01 = (self.phase01 + self.rate_hz * samples as f32 / sr).fract();
        v
    }
}

/// Slow random wander for the companion-voice detune.
///
/// Every `period_s` seconds a new target is drawn uniformly from
/// ±`span_cents`, and the output slews toward it through a one-pole running
/// at control rate. The RNG is a `SmallRng` with a caller-supplied seed;
/// the engine passes a fixed seed so two instances built alike produce
/// identical streams.
#[derive(Clone, Debug)]
pub struct DetuneDrift {
    span_cents: f32,
    period_s: f32,
    t: f32,
    target: f32,
    slew: OnePoleLP,
    rng: SmallRng,
}

impl DetuneDrift {
    /// `control_rate` is ticks per second, i.e. `sr / CONTROL_INTERVAL`.
    pub fn new(span_cents: f32, period_s: f32, slew_hz: f32, control_rate: f32, seed: u64) -> Self {
        let mut s = Self {
            span_cents: span_cents.max(0.0),
            period_s: period_s.max(0.1),
            t: 0.0,
            target: 0.0,
            slew: OnePoleLP::new(slew_hz.max(0.01), control_rate),
            rng: SmallRng::seed_from_u64(seed),
        };
        s.pick_target();
        s
    }

    #[inline]
    fn pick_target(&mut self) {
        self.target = self.rng.gen_range(-1.0f32..1.0) * self.span_cents;
        self.t = 0.0;
    }

    /// Re-derive the slew for a new control rate and return to quiescence.
    pub fn reset(&mut self, control_rate: f32) {
        self.slew.set_sample_rate(control_rate);
        self.slew.clear();
        self.t = 0.0;
    }

    /// One control tick covering `dt_s` seconds; returns the slewed wander
    /// in cents.
    #[inline]
    pub fn tick(&mut self, dt_s: f32) -> f32 {
        self.t += dt_s;
        if self.t >= self.period_s {
            self.pick_target();
        }
        self.slew.process(self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lfo_spans_full_cycle() {
        let sr = 48000.0;
        let mut lfo = Lfo::sine(1.0);
        let mut min = f32::MAX;
        let mut max = f32::MIN;
        // one second in 32-sample blocks = one full cycle
        for _ in 0..1500 {
            let v = lfo.tick_block(32, sr);
            min = min.min(v);
            max = max.max(v);
            assert!(v.abs() <= 1.0 + 1e-6);
        }
        assert!(max > 0.9 && min < -0.9, "min={} max={}", min, max);
    }

    #[test]
    fn drift_stays_within_span() {
        let mut drift = DetuneDrift::new(2.5, 0.5, 0.5, 1500.0, 42);
        for _ in 0..20_000 {
            let c = drift.tick(1.0 / 1500.0);
            assert!(c.abs() <= 2.5 + 1e-3, "c={}", c);
        }
    }

    #[test]
    fn drift_is_deterministic_for_a_seed() {
        let mut a = DetuneDrift::new(2.5, 1.0, 0.5, 1500.0, 7);
        let mut b = DetuneDrift::new(2.5, 1.0, 0.5, 1500.0, 7);
        for _ in 0..5000 {
            assert_eq!(a.tick(1.0 / 1500.0), b.tick(1.0 / 1500.0));
        }
    }

    #[test]
    fn drift_actually_moves() {
        let mut drift = DetuneDrift::new(2.5, 0.25, 1.0, 1500.0, 3);
        let mut seen = Vec::new();
        for _ in 0..30_000 {
            seen.push(drift.tick(1.0 / 1500.0));
        }
        let spread = seen.iter().cloned().fold(f32::MIN, f32::max)
            - seen.iter().cloned().fold(f32::MAX, f32::min);
        assert!(spread > 0.5, "spread={}", spread);
    }
}
