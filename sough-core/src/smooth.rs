//! Parameter smoothing.
//!
//! Live parameter changes arrive between render calls; applying them
//! instantly puts a step into the audio and the step is audible as a click.
//! `SmoothedParam` holds a target/current pair and walks `current` toward
//! `target` one sample at a time with a first-order lag, so every control the
//! engine exposes can be automated without discontinuities.
//!
//! Guarantees:
//! - `current` moves monotonically toward `target` and never overshoots
//!   (each step covers a fraction `1 - a` of the remaining gap, `a` in [0,1)).
//! - Once within a tiny epsilon of the target it snaps exactly, after which
//!   `tick` is a pass-through.

use crate::dsp::one_pole_coeff_ms;

/// Snap threshold, relative to the target magnitude.
const SNAP_EPS: f32 = 1.0e-6;

/// A one-pole smoothed parameter: setters write `target`, the audio loop
/// calls [`tick`](Self::tick) once per sample and reads the result.
#[derive(Copy, Clone, Debug)]
pub struct SmoothedParam {
    current: f32,
    target: f32,
    a: f32,    // lag coefficient, exp(-1/(tau*sr))
    t_ms: f32, // kept so a sample-rate change can re-derive `a`
}

impl SmoothedParam {
    /// Start settled at `value` with a lag time constant of `t_ms`
    /// milliseconds (the ~63% time; ~99% of a step lands near `4.6 * t_ms`).
    #[inline]
    pub fn new(value: f32, t_ms: f32, sr: f32) -> Self {
        Self {
            current: value,
            target: value,
            a: one_pole_coeff_ms(t_ms, sr),
            t_ms,
        }
    }

    /// Store a new target. O(1), no audio-state side effects.
    #[inline]
    pub fn set_target(&mut self, v: f32) {
        self.target = v;
    }

    /// Re-derive the lag coefficient for a new sample rate. Current value and
    /// target are preserved.
    #[inline]
    pub fn set_sample_rate(&mut self, sr: f32) {
        self.a = one_pole_coeff_ms(self.t_ms, sr);
    }

    /// Jump to the target immediately (initialization, scene resets).
    #[inline]
    pub fn snap(&mut self) {
        self.current = self.target;
    }

    /// Advance one sample toward the target and return the new current value.
    #[inline]
    pub fn tick(&mut self) -> f32 {
        if self.current != self.target {
            let next = self.current + (self.target - self.current) * (1.0 - self.a);
            // Snap on epsilon, and also when the step is smaller than one ulp
            // of `current` and the add can no longer move it.
            if next == self.current
                || (self.target - next).abs() <= SNAP_EPS * (1.0 + self.target.abs())
            {
                self.current = self.target;
            } else {
                self.current = next;
            }
        }
        self.current
    }

    #[inline] pub fn current(&self) -> f32 { self.current }
    #[inline] pub fn target(&self) -> f32 { self.target }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converges_monotonically_without_overshoot() {
        let sr = 48000.0;
        let mut p = SmoothedParam::new(0.0, 20.0, sr);
        p.set_target(1.0);
        let mut prev = 0.0;
        for _ in 0..(sr as usize) {
            let v = p.tick();
            assert!(v >= prev, "not monotone: {} < {}", v, prev);
            assert!(v <= 1.0, "overshoot: {}", v);
            prev = v;
        }
        assert_eq!(prev, 1.0, "should have snapped to target");
    }

    #[test]
    fn falling_edge_is_monotone_too() {
        let sr = 44100.0;
        let mut p = SmoothedParam::new(0.8, 30.0, sr);
        p.set_target(0.0);
        let mut prev = 0.8;
        for _ in 0..(sr as usize) {
            let v = p.tick();
            assert!(v <= prev && v >= 0.0, "v={} prev={}", v, prev);
            prev = v;
        }
        assert_eq!(prev, 0.0);
    }

    #[test]
    fn settled_param_is_pass_through() {
        let mut p = SmoothedParam::new(0.5, 30.0, 48000.0);
        for _ in 0..16 {
            assert_eq!(p.tick(), 0.5);
        }
    }

    #[test]
    fn reaches_99_percent_within_five_time_constants() {
        let sr = 48000.0;
        let t_ms = 30.0;
        let mut p = SmoothedParam::new(0.0, t_ms, sr);
        p.set_target(1.0);
        let n = (5.0 * t_ms * 0.001 * sr) as usize;
        let mut v = 0.0;
        for _ in 0..n {
            v = p.tick();
        }
        assert!(v > 0.99, "v={}", v);
    }

    #[test]
    fn reaches_target_when_steps_fall_below_float_resolution() {
        // Close to a target near 1.0 the per-sample step shrinks under one
        // ulp of `current`; the add stalls and only the snap can finish.
        let mut p = SmoothedParam::new(0.9999, 20.0, 48000.0);
        p.set_target(1.0);
        let mut v = 0.0;
        for _ in 0..48_000 {
            v = p.tick();
        }
        assert_eq!(v, 1.0);
    }

    #[test]
    fn zero_time_constant_is_immediate() {
        let mut p = SmoothedParam::new(0.0, 0.0, 48000.0);
        p.set_target(0.7);
        assert_eq!(p.tick(), 0.7);
    }
}
